// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runs each job in a child worker process and relays its lease updates.
//!
//! The worker has no credentials of its own for the lease. It sends every
//! update to the host over stdout, and the host forwards it to the server.
//! If the server answers that the job was abandoned, the host writes one
//! `Abandoned` message to the worker's stdin.

use std::path::PathBuf;
use std::process::Stdio;

use relay_adapters::LeaseClient;
use relay_core::{HostMessage, JobPayload, WorkerConfig, WorkerMessage};
use relay_engine::CompletionGuard;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::wire::{self, WireError};

/// Errors launching or talking to a worker
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to start worker {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("worker pipe error: {0}")]
    Wire(#[from] WireError),

    #[error("worker {0} was not captured")]
    MissingPipe(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What happened while relaying one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayReport {
    /// Updates the server accepted.
    pub updates: usize,
    /// The server reported the job abandoned and the worker was told.
    pub abandoned: bool,
    /// A final result reached the server.
    pub completed: bool,
    pub exit_code: Option<i32>,
}

/// Launches one worker per job and waits for it.
pub struct WorkerSupervisor<L> {
    lease: L,
    worker_path: PathBuf,
    worker_config: WorkerConfig,
}

impl<L: LeaseClient> WorkerSupervisor<L> {
    pub fn new(lease: L, worker_path: PathBuf, worker_config: WorkerConfig) -> Self {
        Self {
            lease,
            worker_path,
            worker_config,
        }
    }

    /// Run `payload` to completion in a fresh worker.
    pub async fn run_job(&self, payload: JobPayload) -> Result<RelayReport, SupervisorError> {
        let request_id = payload.request_id;
        let mut child = Command::new(&self.worker_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                path: self.worker_path.clone(),
                source,
            })?;
        info!(request_id, pid = ?child.id(), "worker started");

        let mut stdin = child.stdin.take().ok_or(SupervisorError::MissingPipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(SupervisorError::MissingPipe("stdout"))?;
        let mut reader = BufReader::new(stdout);

        let job = WorkerMessage::Job {
            config: self.worker_config.clone(),
            payload: Box::new(payload),
        };
        let relayed = relay(&self.lease, &mut reader, &mut stdin, &job).await;
        drop(stdin);

        let status = child.wait().await?;
        let mut report = relayed?;
        report.exit_code = status.code();
        info!(request_id, ?status, "worker exited");
        Ok(report)
    }
}

/// Send `job` to a worker, then forward its updates until it closes stdout.
///
/// Once the server has abandoned the job, later updates are dropped.
pub async fn relay<L, R, W>(
    lease: &L,
    reader: &mut R,
    writer: &mut W,
    job: &WorkerMessage,
) -> Result<RelayReport, SupervisorError>
where
    L: LeaseClient,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    wire::write_message(writer, job).await?;

    let finished = CompletionGuard::new();
    let mut report = RelayReport::default();
    while let Some(message) = wire::read_message::<_, HostMessage>(reader).await? {
        let HostMessage::UpdateJobRequest {
            pool_id,
            lock_token,
            job_request,
        } = message;
        if report.abandoned {
            debug!(request_id = job_request.request_id, "job abandoned, dropping lease update");
            continue;
        }
        let is_final = !job_request.is_renewal();
        match lease
            .update_job_request(pool_id, &lock_token, &job_request)
            .await
        {
            Ok(()) => {
                report.updates += 1;
                if is_final && finished.claim() {
                    report.completed = true;
                }
                debug!(request_id = job_request.request_id, is_final, "lease update relayed");
            }
            Err(e) if e.is_abandoned() => {
                if !finished.claim() {
                    debug!(request_id = job_request.request_id, "job already completed, ignoring abandonment");
                    continue;
                }
                warn!(request_id = job_request.request_id, error = %e, "job abandoned, notifying worker");
                report.abandoned = true;
                if let Err(e) = wire::write_message(writer, &WorkerMessage::Abandoned).await {
                    warn!(error = %e, "failed to notify worker of abandonment");
                }
            }
            Err(e) => warn!(request_id = job_request.request_id, error = %e, "lease update failed"),
        }
    }
    Ok(report)
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
