// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job feedback: console lines, log pages and timeline updates.
//!
//! The channel owns three batching queues and the lease renewer for one
//! job. Flush failures are logged and dropped; only the final lease update
//! is reported to the caller.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use relay_adapters::{LeaseClient, LeaseError, TelemetryClient};
use relay_core::{
    Issue, IssueType, JobLease, JobRequestUpdate, LogReference, Masker, RecordId, RecordType,
    TaskResult, TimelineRecord, TimelineRecordState,
};

use crate::batch::{BatchMap, BatchProcessor, BatchQueue};
use crate::error::EngineError;
use crate::lease::{Abandonment, LeaseRenewer};

pub const CONSOLE_DELAY: Duration = Duration::from_millis(373);
pub const TIMELINE_DELAY: Duration = Duration::from_millis(487);
pub const LOG_DELAY: Duration = Duration::from_millis(1137);
pub const LEASE_INTERVAL: Duration = Duration::from_millis(29_323);

/// Longest console line sent, in characters.
pub const MAX_CONSOLE_LINE: usize = 512;
pub const DEFAULT_MAX_ISSUES: usize = 10;

const SECTION_PREFIX: &str = "[section] ";

/// Timing and limits for a [`FeedbackChannel`].
#[derive(Debug, Clone)]
pub struct FeedbackConfig {
    pub console_delay: Duration,
    pub timeline_delay: Duration,
    pub log_delay: Duration,
    pub lease_interval: Duration,
    /// Issues kept per record and type; counts keep going past it.
    pub max_issues: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            console_delay: CONSOLE_DELAY,
            timeline_delay: TIMELINE_DELAY,
            log_delay: LOG_DELAY,
            lease_interval: LEASE_INTERVAL,
            max_issues: DEFAULT_MAX_ISSUES,
        }
    }
}

/// A finished page of a record's log, waiting on disk for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct LogPage {
    pub record_id: RecordId,
    pub path: PathBuf,
    pub page_number: u32,
}

type Timeline = BatchMap<RecordId, TimelineRecord>;

struct ConsoleProcessor {
    telemetry: Arc<dyn TelemetryClient>,
    job_record: RecordId,
}

#[async_trait]
impl BatchProcessor<Vec<String>> for ConsoleProcessor {
    async fn process(&self, lines: Vec<String>) -> Result<(), EngineError> {
        if lines.is_empty() {
            return Ok(());
        }
        self.telemetry
            .post_console_lines(&self.job_record, &lines)
            .await?;
        Ok(())
    }
}

struct TimelineProcessor {
    telemetry: Arc<dyn TelemetryClient>,
}

#[async_trait]
impl BatchProcessor<IndexMap<RecordId, TimelineRecord>> for TimelineProcessor {
    async fn process(&self, batch: IndexMap<RecordId, TimelineRecord>) -> Result<(), EngineError> {
        if batch.is_empty() {
            return Ok(());
        }
        let records: Vec<TimelineRecord> = batch.into_values().collect();
        self.telemetry.update_timeline_records(&records).await?;
        Ok(())
    }
}

struct LogPageProcessor {
    telemetry: Arc<dyn TelemetryClient>,
    timeline: Timeline,
    log_ids: Mutex<HashMap<RecordId, u64>>,
}

impl LogPageProcessor {
    async fn log_id(&self, record_id: &RecordId) -> Result<u64, EngineError> {
        let known = self.log_ids.lock().get(record_id).copied();
        if let Some(id) = known {
            return Ok(id);
        }
        let path = format!("logs\\{}", record_id);
        let log = self.telemetry.create_log(&path).await?;
        tracing::debug!(record_id = %record_id, log_id = log.id, "created log");
        self.log_ids.lock().insert(record_id.clone(), log.id);
        Ok(log.id)
    }

    async fn upload(&self, page: &LogPage) -> Result<(), EngineError> {
        let log_id = self.log_id(&page.record_id).await?;
        let content = tokio::fs::read(&page.path).await?;
        let appended = self.telemetry.append_log_page(log_id, content).await;

        let log = LogReference {
            id: log_id,
            location: None,
        };
        if self
            .timeline
            .update(&page.record_id, |r| r.log = Some(log))
            .is_err()
        {
            tracing::debug!(record_id = %page.record_id, "timeline closed before log reference");
        }
        appended?;
        Ok(())
    }
}

#[async_trait]
impl BatchProcessor<Vec<LogPage>> for LogPageProcessor {
    async fn process(&self, pages: Vec<LogPage>) -> Result<(), EngineError> {
        for page in pages {
            let result = self.upload(&page).await;
            if let Err(e) = std::fs::remove_file(&page.path) {
                tracing::debug!(path = %page.path.display(), error = %e, "failed to remove log page");
            }
            if let Err(e) = result {
                tracing::warn!(
                    record_id = %page.record_id,
                    page = page.page_number,
                    error = %e,
                    "log page upload failed"
                );
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct IssueTally {
    errors: u32,
    warnings: u32,
    issues: Vec<Issue>,
}

/// Outbound feedback for one job.
pub struct FeedbackChannel {
    job_record: RecordId,
    masker: Masker,
    max_issues: usize,
    console: BatchQueue<String>,
    logs: BatchQueue<LogPage>,
    timeline: Timeline,
    issues: Mutex<HashMap<RecordId, IssueTally>>,
    lease_client: Arc<dyn LeaseClient>,
    lease: JobLease,
    renewer: LeaseRenewer,
    abandonment: Abandonment,
}

impl FeedbackChannel {
    /// Build the channel and start its queues and lease renewal.
    pub fn new(
        job_record: RecordId,
        telemetry: Arc<dyn TelemetryClient>,
        lease_client: Arc<dyn LeaseClient>,
        lease: JobLease,
        masker: Masker,
        config: FeedbackConfig,
    ) -> Self {
        let timeline = BatchMap::new(
            "timeline",
            config.timeline_delay,
            |id: &RecordId| TimelineRecord::new(id.clone()),
            Arc::new(TimelineProcessor {
                telemetry: Arc::clone(&telemetry),
            }),
        );
        let console = BatchQueue::new(
            "console",
            config.console_delay,
            Arc::new(ConsoleProcessor {
                telemetry: Arc::clone(&telemetry),
                job_record: job_record.clone(),
            }),
        );
        let logs = BatchQueue::new(
            "logs",
            config.log_delay,
            Arc::new(LogPageProcessor {
                telemetry,
                timeline: timeline.clone(),
                log_ids: Mutex::new(HashMap::new()),
            }),
        );
        timeline.start_processing();
        console.start_processing();
        logs.start_processing();

        let abandonment = Abandonment::new();
        let renewer = LeaseRenewer::start(
            Arc::clone(&lease_client),
            lease.clone(),
            config.lease_interval,
            abandonment.clone(),
        );

        Self {
            job_record,
            masker,
            max_issues: config.max_issues,
            console,
            logs,
            timeline,
            issues: Mutex::new(HashMap::new()),
            lease_client,
            lease,
            renewer,
            abandonment,
        }
    }

    pub fn job_record(&self) -> &RecordId {
        &self.job_record
    }

    pub fn masker(&self) -> &Masker {
        &self.masker
    }

    /// Raised when the server takes the job away.
    pub fn abandonment(&self) -> &Abandonment {
        &self.abandonment
    }

    pub fn queue_console_line(&self, line: &str) {
        self.console.push(truncate(self.masker.mask(line)));
    }

    pub fn queue_console_section(&self, line: &str) {
        let line = format!("{}{}", SECTION_PREFIX, self.masker.mask(line));
        self.console.push(truncate(line));
    }

    pub fn queue_log_page(&self, page: LogPage) {
        tracing::trace!(record_id = %page.record_id, page = page.page_number, "queue log page");
        let path = page.path.clone();
        if !self.logs.push(page) {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::debug!(path = %path.display(), error = %e, "failed to remove dropped log page");
            }
            tracing::debug!(path = %path.display(), "log page after drain dropped");
        }
    }

    fn update_record(&self, record_id: &RecordId, f: impl FnOnce(&mut TimelineRecord)) {
        if self.timeline.update(record_id, f).is_err() {
            tracing::debug!(record_id = %record_id, "timeline update after drain dropped");
        }
    }

    pub fn set_current_operation(&self, record_id: &RecordId, operation: &str) {
        self.update_record(record_id, |r| {
            r.current_operation = Some(operation.to_string())
        });
    }

    pub fn set_name(&self, record_id: &RecordId, name: &str) {
        self.update_record(record_id, |r| r.name = Some(name.to_string()));
    }

    pub fn set_start_time(&self, record_id: &RecordId, at: DateTime<Utc>) {
        self.update_record(record_id, |r| r.start_time = Some(at));
    }

    pub fn set_finish_time(&self, record_id: &RecordId, at: DateTime<Utc>) {
        self.update_record(record_id, |r| r.finish_time = Some(at));
    }

    pub fn set_state(&self, record_id: &RecordId, state: TimelineRecordState) {
        self.update_record(record_id, |r| r.state = Some(state));
    }

    pub fn set_result(&self, record_id: &RecordId, result: TaskResult) {
        self.update_record(record_id, |r| r.result = Some(result));
    }

    pub fn set_type(&self, record_id: &RecordId, record_type: RecordType) {
        self.update_record(record_id, |r| r.record_type = Some(record_type));
    }

    pub fn set_parent_id(&self, record_id: &RecordId, parent_id: &RecordId) {
        self.update_record(record_id, |r| r.parent_id = Some(parent_id.clone()));
    }

    pub fn set_worker_name(&self, record_id: &RecordId, worker_name: &str) {
        self.update_record(record_id, |r| {
            r.worker_name = Some(worker_name.to_string())
        });
    }

    pub fn set_log(&self, record_id: &RecordId, log: LogReference) {
        self.update_record(record_id, |r| r.log = Some(log));
    }

    pub fn set_order(&self, record_id: &RecordId, order: u32) {
        self.update_record(record_id, |r| r.order = Some(order));
    }

    pub fn add_error(&self, record_id: &RecordId, category: &str, message: &str) {
        self.add_issue(record_id, issue(IssueType::Error, category, message));
    }

    pub fn add_warning(&self, record_id: &RecordId, category: &str, message: &str) {
        self.add_issue(record_id, issue(IssueType::Warning, category, message));
    }

    /// Attach an issue to a record, keeping at most `max_issues` per type.
    pub fn add_issue(&self, record_id: &RecordId, issue: Issue) {
        let issue_type = issue.issue_type;
        let (kept, errors, warnings) = {
            let mut issues = self.issues.lock();
            let tally = issues.entry(record_id.clone()).or_default();
            let count = match issue_type {
                IssueType::Error => &mut tally.errors,
                IssueType::Warning => &mut tally.warnings,
            };
            let keep = (*count as usize) < self.max_issues;
            *count += 1;
            if keep {
                tally.issues.push(issue);
            }
            (
                keep.then(|| tally.issues.clone()),
                tally.errors,
                tally.warnings,
            )
        };
        self.update_record(record_id, |r| {
            if let Some(issues) = kept {
                r.issues = Some(issues);
            }
            match issue_type {
                IssueType::Error => r.error_count = Some(errors),
                IssueType::Warning => r.warning_count = Some(warnings),
            }
        });
    }

    /// Stop renewing and report the job's final result.
    ///
    /// Waits for a renewal in flight so the final update is the last one sent.
    pub async fn finish_job_request(
        &self,
        result: TaskResult,
        finish_time: DateTime<Utc>,
    ) -> Result<(), LeaseError> {
        self.renewer.end();
        self.renewer.finished().await;
        let update = JobRequestUpdate::finished(self.lease.request_id, finish_time, result);
        tracing::info!(request_id = self.lease.request_id, %result, "finishing job request");
        self.lease_client
            .update_job_request(self.lease.pool_id, &self.lease.lock_token, &update)
            .await
    }

    /// Flush everything queued and stop.
    ///
    /// Console and log queues stop accepting items now. The timeline queue
    /// stops once the log queue is empty, so log references attached by the
    /// last log flush still go out. Resolves when all three queues are empty
    /// and no lease renewal is in flight.
    pub fn drain(&self) -> impl Future<Output = ()> + Send + 'static {
        self.renewer.end();
        let lease_idle = self.renewer.finished();
        let console_empty = self.console.wait_for_empty();
        let logs_empty = self.logs.wait_for_empty();
        let timeline_empty = self.timeline.wait_for_empty();

        self.console.finish_adding();
        self.logs.finish_adding();

        let logs_done = self.logs.wait_for_empty();
        let timeline = self.timeline.clone();
        tokio::spawn(async move {
            logs_done.await;
            timeline.finish_adding();
        });

        async move {
            tokio::join!(lease_idle, console_empty, logs_empty, timeline_empty);
            tracing::debug!("feedback drained");
        }
    }
}

fn issue(issue_type: IssueType, category: &str, message: &str) -> Issue {
    Issue {
        issue_type,
        category: Some(category.to_string()),
        message: message.to_string(),
        data: Default::default(),
    }
}

fn truncate(line: String) -> String {
    if line.chars().count() <= MAX_CONSOLE_LINE {
        return line;
    }
    let mut cut: String = line.chars().take(MAX_CONSOLE_LINE - 3).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
#[path = "feedback_tests.rs"]
mod tests;
