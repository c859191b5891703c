// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker side of the host/worker pipe: runs one job in-process.
//!
//! The job arrives on stdin. Lease updates leave on stdout for the host to
//! forward, and the host may answer with `Abandoned` at any time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_adapters::{LeaseClient, LeaseError, TaskHandler, TaskStore, TelemetryClient};
use relay_core::{
    HostMessage, JobPayload, JobRequestUpdate, LockToken, UuidIdGen, WorkerConfig, WorkerMessage,
};
use relay_engine::{
    run_job, Abandonment, Completion, ExecutionContext, FeedbackChannel, FeedbackConfig,
    JobCompletion, JobOrchestrator, JobState,
};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::wire::{self, WireError};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("host closed the pipe before sending a job")]
    NoJob,

    #[error("expected a job message, got {0:?}")]
    UnexpectedMessage(WorkerMessage),

    #[error("pipe error: {0}")]
    Wire(#[from] WireError),
}

/// Read the job the host sends first.
pub async fn read_job<R>(reader: &mut R) -> Result<(WorkerConfig, JobPayload), WorkerError>
where
    R: AsyncBufRead + Unpin,
{
    match wire::read_message::<_, WorkerMessage>(reader).await? {
        Some(WorkerMessage::Job { config, payload }) => Ok((config, *payload)),
        Some(other) => Err(WorkerError::UnexpectedMessage(other)),
        None => Err(WorkerError::NoJob),
    }
}

/// Lease client that hands updates to the host instead of the server.
///
/// Delivery is fire-and-forget; the host reports abandonment separately.
#[derive(Clone)]
pub struct RelayLeaseClient {
    tx: mpsc::UnboundedSender<HostMessage>,
}

#[async_trait]
impl LeaseClient for RelayLeaseClient {
    async fn update_job_request(
        &self,
        pool_id: u64,
        lock_token: &LockToken,
        update: &JobRequestUpdate,
    ) -> Result<(), LeaseError> {
        self.tx
            .send(HostMessage::UpdateJobRequest {
                pool_id,
                lock_token: lock_token.clone(),
                job_request: update.clone(),
            })
            .map_err(|_| LeaseError::Transport("host pipe closed".to_string()))
    }
}

/// Serializes host-bound messages onto the worker's stdout.
pub struct HostPipe {
    tx: mpsc::UnboundedSender<HostMessage>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl HostPipe {
    pub fn start<W>(mut writer: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<HostMessage>();
        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = rx.recv() => match message {
                        Some(message) => {
                            if let Err(e) = wire::write_message(&mut writer, &message).await {
                                warn!(error = %e, "failed to write to host");
                            }
                        }
                        None => break,
                    },
                    _ = &mut shutdown_rx => {
                        rx.close();
                        while let Some(message) = rx.recv().await {
                            if let Err(e) = wire::write_message(&mut writer, &message).await {
                                warn!(error = %e, "failed to write to host");
                            }
                        }
                        break;
                    }
                }
            }
            debug!("host pipe closed");
        });
        Self { tx, shutdown, task }
    }

    pub fn client(&self) -> RelayLeaseClient {
        RelayLeaseClient {
            tx: self.tx.clone(),
        }
    }

    /// Write whatever is queued, then stop. Later updates fail with
    /// `Transport`.
    pub async fn close(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "host pipe task failed");
        }
    }
}

/// Raise `abandonment` when the host says so. Returns when the host closes
/// the pipe.
pub async fn watch_host<R>(mut reader: R, abandonment: Abandonment)
where
    R: AsyncBufRead + Unpin,
{
    loop {
        match wire::read_message::<_, WorkerMessage>(&mut reader).await {
            Ok(Some(WorkerMessage::Abandoned)) => {
                if abandonment.signal() {
                    info!("host reported the job abandoned");
                }
            }
            Ok(Some(other)) => warn!(message = ?other, "unexpected message from host"),
            Ok(None) => {
                debug!("host closed stdin");
                return;
            }
            Err(e) => {
                warn!(error = %e, "failed to read from host");
                return;
            }
        }
    }
}

/// Collaborators a job needs besides the host pipe.
pub struct WorkerServices<S, H> {
    pub telemetry: Arc<dyn TelemetryClient>,
    pub store: S,
    pub handler: H,
}

/// Run one job end to end and complete it exactly once.
pub async fn run_job_worker<R, W, S, H>(
    config: WorkerConfig,
    payload: JobPayload,
    reader: R,
    writer: W,
    services: WorkerServices<S, H>,
) -> Completion
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
    S: TaskStore,
    H: TaskHandler,
{
    let pipe = HostPipe::start(writer);
    let masker = payload.masker();
    let feedback = Arc::new(FeedbackChannel::new(
        payload.job_id.clone(),
        services.telemetry,
        Arc::new(pipe.client()),
        payload.lease(config.pool_id),
        masker.clone(),
        FeedbackConfig {
            max_issues: config.max_issues,
            ..FeedbackConfig::default()
        },
    ));
    let state = Arc::new(JobState::new(
        payload.job_id.clone(),
        payload.job_name.clone(),
        config.agent_name.clone(),
        config.work_folder.clone(),
        payload.environment.variables.clone(),
        masker,
    ));
    let ctx = ExecutionContext::job(state, Arc::clone(&feedback));
    let watcher = tokio::spawn(watch_host(reader, feedback.abandonment().clone()));

    let completion = Arc::new(JobCompletion::new(
        Arc::clone(&feedback),
        Duration::from_secs(config.drain_timeout_secs),
    ));
    info!(request_id = payload.request_id, job = %payload.job_name, "job started");
    let orchestrator = JobOrchestrator::new(
        payload,
        config,
        services.store,
        services.handler,
        UuidIdGen,
    );
    let outcome = run_job(orchestrator, &ctx, completion).await;
    info!(?outcome, "job done");

    watcher.abort();
    pipe.close().await;
    outcome
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
