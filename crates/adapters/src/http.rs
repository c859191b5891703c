// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the orchestration service.
//!
//! Routes, relative to `server_url`:
//!
//! | Call | Route |
//! |------|-------|
//! | create session | `POST   /_apis/distributedtask/pools/{pool}/sessions` |
//! | delete session | `DELETE /_apis/distributedtask/pools/{pool}/sessions/{session}` |
//! | get message | `GET    /_apis/distributedtask/pools/{pool}/messages?sessionId=&lastMessageId=` |
//! | delete message | `DELETE /_apis/distributedtask/pools/{pool}/messages/{id}?sessionId=` |
//! | lease update | `PATCH  /_apis/distributedtask/pools/{pool}/jobrequests/{request}?lockToken=` |
//! | console lines | `POST   /_apis/distributedtask/plans/{plan}/timelines/{timeline}/records/{record}/feed` |
//! | create log | `POST   /_apis/distributedtask/plans/{plan}/logs` |
//! | append log | `POST   /_apis/distributedtask/plans/{plan}/logs/{log}` |
//! | timeline | `PATCH  /_apis/distributedtask/plans/{plan}/timelines/{timeline}/records` |
//! | task bundle | `GET    /_apis/distributedtask/tasks/{task}/{version}` |

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use relay_core::{
    JobRequestUpdate, LockToken, LogReference, PlanId, QueueMessage, RecordId, SessionId,
    TaskInstance, TimelineId, TimelineRecord,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::lease::{LeaseClient, LeaseError};
use crate::queue::{QueueClient, QueueError, SessionRequest};
use crate::tasks::{TaskStore, TaskStoreError};
use crate::telemetry::{TelemetryClient, TelemetryError};

/// Default request timeout; long polls are answered well within it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(100);

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub server_url: String,
    pub pool_id: u64,
    /// Bearer token; requests are anonymous without one.
    pub token: Option<String>,
    pub timeout: Duration,
}

impl HttpConfig {
    pub fn new(server_url: impl Into<String>, pool_id: u64) -> Self {
        Self {
            server_url: server_url.into(),
            pool_id,
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }
}

/// Client for the pool-scoped APIs (queue, lease, tasks).
#[derive(Clone)]
pub struct HttpServiceClient {
    client: Client,
    base: String,
    pool_id: u64,
    token: Option<String>,
}

impl HttpServiceClient {
    pub fn new(config: HttpConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base: config.server_url.trim_end_matches('/').to_string(),
            pool_id: config.pool_id,
            token: config.token,
        }
    }

    /// A telemetry client for one job's plan and timeline.
    ///
    /// `token` overrides the agent token (jobs carry their own).
    pub fn telemetry(
        &self,
        plan_id: PlanId,
        timeline_id: TimelineId,
        token: Option<String>,
    ) -> HttpTelemetryClient {
        let mut http = self.clone();
        if token.is_some() {
            http.token = token;
        }
        HttpTelemetryClient {
            http,
            plan_id,
            timeline_id,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/_apis/distributedtask/{}", self.base, path)
    }

    fn pool_url(&self, path: &str) -> String {
        self.url(&format!("pools/{}/{}", self.pool_id, path))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, reqwest::Error> {
        self.authorize(builder).send().await
    }
}

/// `true` when a transport error was a connection reset by the peer.
fn is_connection_reset(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(err);
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionReset {
                return true;
            }
        }
        source = e.source();
    }
    false
}

fn queue_transport(err: reqwest::Error) -> QueueError {
    if is_connection_reset(&err) {
        QueueError::ConnectionReset
    } else {
        QueueError::Transport(err.to_string())
    }
}

async fn queue_status(response: Response) -> QueueError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED => QueueError::Unauthorized,
        StatusCode::BAD_REQUEST => QueueError::BadRequest(body),
        StatusCode::CONFLICT => QueueError::Conflict(body),
        _ => QueueError::Status {
            status: status.as_u16(),
            body,
        },
    }
}

async fn telemetry_status(response: Response) -> TelemetryError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    TelemetryError::Status { status, body }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    session_id: SessionId,
}

#[async_trait]
impl QueueClient for HttpServiceClient {
    async fn create_session(&self, request: &SessionRequest) -> Result<SessionId, QueueError> {
        let response = self
            .send(self.client.post(self.pool_url("sessions")).json(request))
            .await
            .map_err(queue_transport)?;
        if !response.status().is_success() {
            return Err(queue_status(response).await);
        }
        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| QueueError::Decode(e.to_string()))?;
        Ok(session.session_id)
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<(), QueueError> {
        let url = self.pool_url(&format!("sessions/{}", session_id));
        let response = self
            .send(self.client.delete(url))
            .await
            .map_err(queue_transport)?;
        if !response.status().is_success() {
            return Err(queue_status(response).await);
        }
        Ok(())
    }

    async fn get_message(
        &self,
        session_id: &SessionId,
        last_message_id: Option<u64>,
    ) -> Result<Option<QueueMessage>, QueueError> {
        let mut query = vec![("sessionId", session_id.to_string())];
        if let Some(id) = last_message_id {
            query.push(("lastMessageId", id.to_string()));
        }
        let response = self
            .send(self.client.get(self.pool_url("messages")).query(&query))
            .await
            .map_err(queue_transport)?;
        let status = response.status();
        if status == StatusCode::ACCEPTED || status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(queue_status(response).await);
        }
        let message = response
            .json()
            .await
            .map_err(|e| QueueError::Decode(e.to_string()))?;
        Ok(Some(message))
    }

    async fn delete_message(&self, session_id: &SessionId, message_id: u64) -> Result<(), QueueError> {
        let url = self.pool_url(&format!("messages/{}", message_id));
        let response = self
            .send(
                self.client
                    .delete(url)
                    .query(&[("sessionId", session_id.as_str())]),
            )
            .await
            .map_err(queue_transport)?;
        if !response.status().is_success() {
            return Err(queue_status(response).await);
        }
        Ok(())
    }
}

#[async_trait]
impl LeaseClient for HttpServiceClient {
    async fn update_job_request(
        &self,
        pool_id: u64,
        lock_token: &LockToken,
        update: &JobRequestUpdate,
    ) -> Result<(), LeaseError> {
        let url = self.url(&format!(
            "pools/{}/jobrequests/{}",
            pool_id, update.request_id
        ));
        let response = self
            .send(
                self.client
                    .patch(url)
                    .query(&[("lockToken", lock_token.as_str())])
                    .json(update),
            )
            .await
            .map_err(|e| LeaseError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(LeaseError::from_status(status.as_u16(), &body))
    }
}

#[derive(Deserialize)]
struct TaskBundle {
    files: BTreeMap<String, String>,
}

#[async_trait]
impl TaskStore for HttpServiceClient {
    async fn download(&self, task: &TaskInstance, dest: &Path) -> Result<(), TaskStoreError> {
        let url = self.url(&format!("tasks/{}/{}", task.id, task.version));
        let response = self
            .send(self.client.get(url))
            .await
            .map_err(|e| TaskStoreError::Transport(e.to_string()))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(TaskStoreError::NotFound {
                name: task.name.clone(),
                version: task.version.clone(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TaskStoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bundle: TaskBundle = response
            .json()
            .await
            .map_err(|e| TaskStoreError::Decode(e.to_string()))?;

        tokio::fs::create_dir_all(dest).await?;
        for (name, content) in bundle.files {
            let relative = Path::new(&name);
            if relative.is_absolute()
                || relative
                    .components()
                    .any(|c| matches!(c, std::path::Component::ParentDir))
            {
                return Err(TaskStoreError::Decode(format!(
                    "file escapes task directory: {}",
                    name
                )));
            }
            let path = dest.join(relative);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, content).await?;
        }
        Ok(())
    }
}

/// Client for one job's telemetry.
#[derive(Clone)]
pub struct HttpTelemetryClient {
    http: HttpServiceClient,
    plan_id: PlanId,
    timeline_id: TimelineId,
}

#[derive(Serialize)]
struct Batch<'a, T> {
    value: &'a [T],
    count: usize,
}

#[derive(Serialize)]
struct CreateLogRequest<'a> {
    path: &'a str,
}

impl HttpTelemetryClient {
    fn plan_url(&self, path: &str) -> String {
        self.http.url(&format!("plans/{}/{}", self.plan_id, path))
    }
}

#[async_trait]
impl TelemetryClient for HttpTelemetryClient {
    async fn post_console_lines(
        &self,
        record_id: &RecordId,
        lines: &[String],
    ) -> Result<(), TelemetryError> {
        let url = self.plan_url(&format!(
            "timelines/{}/records/{}/feed",
            self.timeline_id, record_id
        ));
        let body = Batch {
            value: lines,
            count: lines.len(),
        };
        let response = self
            .http
            .send(self.http.client.post(url).json(&body))
            .await
            .map_err(|e| TelemetryError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(telemetry_status(response).await);
        }
        Ok(())
    }

    async fn create_log(&self, path: &str) -> Result<LogReference, TelemetryError> {
        let response = self
            .http
            .send(
                self.http
                    .client
                    .post(self.plan_url("logs"))
                    .json(&CreateLogRequest { path }),
            )
            .await
            .map_err(|e| TelemetryError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(telemetry_status(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| TelemetryError::Decode(e.to_string()))
    }

    async fn append_log_page(&self, log_id: u64, content: Vec<u8>) -> Result<(), TelemetryError> {
        let url = self.plan_url(&format!("logs/{}", log_id));
        let response = self
            .http
            .send(
                self.http
                    .client
                    .post(url)
                    .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                    .body(content),
            )
            .await
            .map_err(|e| TelemetryError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(telemetry_status(response).await);
        }
        Ok(())
    }

    async fn update_timeline_records(
        &self,
        records: &[TimelineRecord],
    ) -> Result<(), TelemetryError> {
        let url = self.plan_url(&format!("timelines/{}/records", self.timeline_id));
        let body = Batch {
            value: records,
            count: records.len(),
        };
        let response = self
            .http
            .send(self.http.client.patch(url).json(&body))
            .await
            .map_err(|e| TelemetryError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(telemetry_status(response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
