// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job payloads and job-request leases.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mask::Masker;
use crate::timeline::{RecordId, TaskResult};
use crate::vars::Variables;

crate::define_id! {
    /// Server-issued token proving ownership of a job request.
    pub struct LockToken;
}

crate::define_id! {
    /// Identifies an orchestration plan.
    pub struct PlanId;
}

crate::define_id! {
    /// Identifies the timeline the job's records live on.
    pub struct TimelineId;
}

crate::define_id! {
    /// Identifies a task definition (independent of version).
    pub struct TaskId;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanReference {
    pub plan_id: PlanId,
    #[serde(default)]
    pub plan_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineReference {
    pub id: TimelineId,
}

/// One task invocation within a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInstance {
    pub id: TaskId,
    /// Timeline record id of this invocation.
    pub instance_id: RecordId,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
}

impl TaskInstance {
    /// Name shown on the timeline.
    pub fn title(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointAuthorization {
    pub scheme: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// A service the job may talk to (source repository, the collection itself).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpoint {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<EndpointAuthorization>,
}

impl ServiceEndpoint {
    /// OAuth access token carried by the endpoint, if any.
    pub fn access_token(&self) -> Option<&str> {
        self.authorization
            .as_ref()
            .and_then(|auth| auth.parameters.get("AccessToken"))
            .map(String::as_str)
    }
}

/// Per-job settings for a built-in plugin, keyed by option id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOption {
    pub id: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEnvironment {
    #[serde(default)]
    pub variables: Variables,
    /// Names of variables whose values are secret.
    #[serde(default)]
    pub secret_variables: Vec<String>,
    #[serde(default)]
    pub endpoints: Vec<ServiceEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_connection: Option<ServiceEndpoint>,
    #[serde(default)]
    pub options: BTreeMap<String, JobOption>,
}

/// Immutable description of one job, as delivered by the work queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    /// Timeline record id of the job itself.
    pub job_id: RecordId,
    pub job_name: String,
    pub request_id: u64,
    pub lock_token: LockToken,
    pub plan: PlanReference,
    pub timeline: TimelineReference,
    #[serde(default)]
    pub tasks: Vec<TaskInstance>,
    #[serde(default)]
    pub environment: JobEnvironment,
}

impl JobPayload {
    /// The lease this payload was granted under.
    pub fn lease(&self, pool_id: u64) -> JobLease {
        JobLease {
            request_id: self.request_id,
            lock_token: self.lock_token.clone(),
            pool_id,
            expires_at: None,
        }
    }

    /// Access token for calls made on behalf of the job.
    pub fn access_token(&self) -> Option<&str> {
        self.environment
            .system_connection
            .as_ref()
            .and_then(ServiceEndpoint::access_token)
    }

    /// Build a masker covering every secret the payload carries.
    pub fn masker(&self) -> Masker {
        let masker = Masker::new();
        for name in &self.environment.secret_variables {
            if let Some(value) = self.environment.variables.get(name) {
                masker.add(value);
            }
        }
        let endpoints = self
            .environment
            .endpoints
            .iter()
            .chain(self.environment.system_connection.iter());
        for endpoint in endpoints {
            if let Some(auth) = &endpoint.authorization {
                for (key, value) in &auth.parameters {
                    if key.eq_ignore_ascii_case("password") || key.eq_ignore_ascii_case("accesstoken") {
                        masker.add(value.clone());
                    }
                }
            }
        }
        masker
    }
}

/// The server-granted right to run one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobLease {
    pub request_id: u64,
    pub lock_token: LockToken,
    pub pool_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Body of a lease update. Without `finish_time`/`result` it is a renewal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequestUpdate {
    pub request_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
}

impl JobRequestUpdate {
    pub fn renewal(request_id: u64) -> Self {
        Self {
            request_id,
            finish_time: None,
            result: None,
        }
    }

    pub fn finished(request_id: u64, finish_time: DateTime<Utc>, result: TaskResult) -> Self {
        Self {
            request_id,
            finish_time: Some(finish_time),
            result: Some(result),
        }
    }

    pub fn is_renewal(&self) -> bool {
        self.result.is_none() && self.finish_time.is_none()
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
