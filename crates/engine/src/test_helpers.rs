// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for the engine crate.

use std::sync::Arc;
use std::time::Duration;

use relay_adapters::{FakeLeaseClient, FakeTelemetryClient};
use relay_core::{JobLease, LockToken, Masker, RecordId, TimelineRecord, Variables};
use tempfile::TempDir;

use crate::context::{ExecutionContext, JobState};
use crate::feedback::{FeedbackChannel, FeedbackConfig};

pub(crate) const JOB_RECORD: &str = "job-1";

/// A job's feedback channel and shared state over recording fakes.
pub(crate) struct JobHarness {
    pub dir: TempDir,
    pub telemetry: FakeTelemetryClient,
    pub lease: FakeLeaseClient,
    pub feedback: Arc<FeedbackChannel>,
    pub state: Arc<JobState>,
}

impl JobHarness {
    pub fn new() -> Self {
        Self::with_variables(Variables::new())
    }

    pub fn with_variables(variables: Variables) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let telemetry = FakeTelemetryClient::new();
        let lease = FakeLeaseClient::new();
        let masker = Masker::new();
        let feedback = Arc::new(FeedbackChannel::new(
            RecordId::new(JOB_RECORD),
            Arc::new(telemetry.clone()),
            Arc::new(lease.clone()),
            JobLease {
                request_id: 42,
                lock_token: LockToken::new("lock-1"),
                pool_id: 1,
                expires_at: None,
            },
            masker.clone(),
            FeedbackConfig {
                lease_interval: Duration::from_secs(3600),
                ..FeedbackConfig::default()
            },
        ));
        let state = Arc::new(JobState::new(
            RecordId::new(JOB_RECORD),
            "Build",
            "agent-1",
            dir.path().to_path_buf(),
            variables,
            masker,
        ));
        Self {
            dir,
            telemetry,
            lease,
            feedback,
            state,
        }
    }

    pub fn job_context(&self) -> ExecutionContext {
        ExecutionContext::job(Arc::clone(&self.state), Arc::clone(&self.feedback))
    }

    pub async fn drain(&self) {
        self.feedback.drain().await;
    }

    /// Every console line posted, in order.
    pub fn console_lines(&self) -> Vec<String> {
        self.telemetry
            .console_batches()
            .into_iter()
            .flatten()
            .collect()
    }

    /// All patches sent for `id`, folded into one record.
    pub fn record(&self, id: &str) -> TimelineRecord {
        let mut merged = TimelineRecord::new(RecordId::new(id));
        for patch in self
            .telemetry
            .timeline_batches()
            .into_iter()
            .flatten()
            .filter(|r| r.id == id)
        {
            macro_rules! take {
                ($($field:ident),*) => {
                    $(if patch.$field.is_some() { merged.$field = patch.$field.clone(); })*
                };
            }
            take!(
                parent_id,
                record_type,
                name,
                start_time,
                finish_time,
                current_operation,
                state,
                result,
                worker_name,
                order,
                log,
                error_count,
                warning_count,
                issues
            );
        }
        merged
    }

    /// Ids of every record that was sent, in first-sent order.
    pub fn record_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for record in self.telemetry.timeline_batches().into_iter().flatten() {
            if !ids.iter().any(|id| record.id == id.as_str()) {
                ids.push(record.id.to_string());
            }
        }
        ids
    }
}
