// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution contexts: where jobs, tasks and plugins send their output.
//!
//! A context writes timestamped lines to its sinks and, inside a job,
//! mirrors them to the console feed and records issues on its timeline
//! record. Task and plugin contexts share the job's [`JobState`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use relay_adapters::HandlerContext;
use relay_core::vars::names;
use relay_core::{Masker, RecordId, RecordType, TaskResult, TimelineRecordState, Variables};

use crate::commands::{self, TaskCommand, COMMAND_PREFIX};
use crate::feedback::FeedbackChannel;
use crate::paging_logger::PagingLogger;
use crate::sink::{Level, Sink, TracingSink};

/// Mutable state shared by every context of one job.
pub struct JobState {
    job_record: RecordId,
    job_name: String,
    agent_name: String,
    work_folder: PathBuf,
    masker: Masker,
    variables: Mutex<Variables>,
    working_directory: Mutex<PathBuf>,
}

impl JobState {
    /// The working directory starts at the work folder.
    pub fn new(
        job_record: RecordId,
        job_name: impl Into<String>,
        agent_name: impl Into<String>,
        work_folder: PathBuf,
        variables: Variables,
        masker: Masker,
    ) -> Self {
        Self {
            job_record,
            job_name: job_name.into(),
            agent_name: agent_name.into(),
            working_directory: Mutex::new(work_folder.clone()),
            work_folder,
            masker,
            variables: Mutex::new(variables),
        }
    }

    pub fn job_record(&self) -> &RecordId {
        &self.job_record
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn work_folder(&self) -> &Path {
        &self.work_folder
    }

    pub fn masker(&self) -> &Masker {
        &self.masker
    }

    /// Snapshot of the job variables.
    pub fn variables(&self) -> Variables {
        self.variables.lock().clone()
    }

    pub fn variable(&self, name: &str) -> Option<String> {
        self.variables.lock().get(name).map(str::to_string)
    }

    /// Set a job variable. Secret values are masked from then on.
    pub fn set_variable(&self, name: &str, value: &str, secret: bool) {
        if secret {
            self.masker.add(value);
        }
        self.variables.lock().set(name, value);
    }

    /// Expand `$(name)` references against the current variables.
    pub fn expand(&self, input: &str) -> String {
        self.variables.lock().expand(input)
    }

    pub fn working_directory(&self) -> PathBuf {
        self.working_directory.lock().clone()
    }

    pub fn set_working_directory(&self, dir: PathBuf) {
        *self.working_directory.lock() = dir;
    }

    /// Where page files for uploads are written.
    pub fn pages_dir(&self) -> PathBuf {
        self.work_folder.join("_logs").join("pages")
    }
}

#[derive(Clone)]
struct JobScope {
    state: Arc<JobState>,
    feedback: Arc<FeedbackChannel>,
}

/// Output and timeline handle for one unit of work.
pub struct ExecutionContext {
    record_id: RecordId,
    sinks: Vec<Arc<dyn Sink>>,
    scope: Option<JobScope>,
    result: Mutex<Option<TaskResult>>,
}

impl ExecutionContext {
    /// A context outside any job. Writes only to `sinks`.
    pub fn host(sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self {
            record_id: RecordId::new("host"),
            sinks,
            scope: None,
            result: Mutex::new(None),
        }
    }

    /// The context of the job record itself.
    pub fn job(state: Arc<JobState>, feedback: Arc<FeedbackChannel>) -> Self {
        let record_id = state.job_record().clone();
        Self::scoped(record_id, JobScope { state, feedback })
    }

    /// A child context for a task, with its own record and log.
    pub fn for_task(&self, record_id: &RecordId) -> Self {
        self.child(record_id.clone())
    }

    /// A child context for a plugin invocation.
    pub fn for_plugin(&self, record_id: &RecordId) -> Self {
        self.child(record_id.clone())
    }

    fn child(&self, record_id: RecordId) -> Self {
        match &self.scope {
            Some(scope) => Self::scoped(record_id, scope.clone()),
            None => Self {
                record_id,
                sinks: self.sinks.clone(),
                scope: None,
                result: Mutex::new(None),
            },
        }
    }

    fn scoped(record_id: RecordId, scope: JobScope) -> Self {
        let level = if scope.state.variables().is_true(names::SYSTEM_DEBUG) {
            Level::Verbose
        } else {
            Level::Info
        };
        let feedback = Arc::clone(&scope.feedback);
        let logger = PagingLogger::new(
            scope.state.pages_dir(),
            record_id.clone(),
            scope.state.masker().clone(),
            level,
            move |page| feedback.queue_log_page(page),
        );
        let sinks: Vec<Arc<dyn Sink>> = vec![
            Arc::new(TracingSink::new(record_id.clone(), level)),
            Arc::new(logger),
        ];
        Self {
            record_id,
            sinks,
            scope: Some(scope),
            result: Mutex::new(None),
        }
    }

    pub fn record_id(&self) -> &RecordId {
        &self.record_id
    }

    /// Shared job state; `None` for a host context.
    pub fn job_state(&self) -> Option<&Arc<JobState>> {
        self.scope.as_ref().map(|s| &s.state)
    }

    pub fn feedback(&self) -> Option<&Arc<FeedbackChannel>> {
        self.scope.as_ref().map(|s| &s.feedback)
    }

    pub fn variables(&self) -> Variables {
        self.job_state()
            .map(|s| s.variables())
            .unwrap_or_default()
    }

    pub fn set_variable(&self, name: &str, value: &str, secret: bool) {
        match self.job_state() {
            Some(state) => state.set_variable(name, value, secret),
            None => tracing::debug!(name, "variable set outside a job ignored"),
        }
    }

    pub fn working_directory(&self) -> Option<PathBuf> {
        self.job_state().map(|s| s.working_directory())
    }

    pub fn set_working_directory(&self, dir: PathBuf) {
        if let Some(state) = self.job_state() {
            state.set_working_directory(dir);
        }
    }

    /// Result requested by the task itself, if any.
    pub fn result(&self) -> Option<TaskResult> {
        *self.result.lock()
    }

    pub fn set_result(&self, result: TaskResult) {
        *self.result.lock() = Some(result);
    }

    pub fn error(&self, message: &str) {
        if let Some(feedback) = self.feedback() {
            feedback.add_error(&self.record_id, "Console", message);
        }
        self.write(Level::Error, message);
    }

    pub fn warning(&self, message: &str) {
        if let Some(feedback) = self.feedback() {
            feedback.add_warning(&self.record_id, "Console", message);
        }
        self.write(Level::Warning, message);
    }

    pub fn status(&self, message: &str) {
        self.write(Level::Status, message);
    }

    pub fn info(&self, message: &str) {
        self.write(Level::Info, message);
    }

    pub fn verbose(&self, message: &str) {
        self.write(Level::Verbose, message);
    }

    /// A raw line of task output. Task commands are executed, anything
    /// else is written at info level.
    pub fn output(&self, line: &str) {
        if !line.trim_start().starts_with(COMMAND_PREFIX) {
            self.info(line);
            return;
        }
        match TaskCommand::parse(line) {
            Ok(command) => commands::execute(self, &command),
            Err(e) => {
                tracing::debug!(record_id = %self.record_id, error = %e, "malformed task command");
                self.info(line);
            }
        }
    }

    /// A section header on the console feed.
    pub fn write_console_section(&self, message: &str) {
        if let Some(feedback) = self.feedback() {
            feedback.queue_console_section(message);
        }
    }

    fn write(&self, level: Level, message: &str) {
        let prefix = level
            .tag()
            .map(|tag| format!("##[{}] ", tag))
            .unwrap_or_default();
        for line in message.split('\n') {
            let line = line.trim_end_matches('\r');
            let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            let log_line = format!("{}{}: {}", prefix, stamp, line);

            let mut written = false;
            for sink in self.sinks.iter().filter(|s| s.level() >= level) {
                written = true;
                if level == Level::Error {
                    sink.write_error(&log_line);
                } else {
                    sink.write(&log_line);
                }
            }
            if written {
                if let Some(feedback) = self.feedback() {
                    feedback.queue_console_line(&format!("{}{}", prefix, line));
                }
            }
        }
    }

    /// Register a step's record as pending under the job.
    pub fn register_pending(&self, record_id: &RecordId, name: &str, order: u32) {
        let Some(scope) = &self.scope else {
            return;
        };
        let feedback = &scope.feedback;
        feedback.set_current_operation(record_id, "Initializing");
        feedback.set_parent_id(record_id, scope.state.job_record());
        feedback.set_name(record_id, name);
        feedback.set_state(record_id, TimelineRecordState::Pending);
        feedback.set_type(record_id, RecordType::Task);
        feedback.set_worker_name(record_id, scope.state.agent_name());
        feedback.set_order(record_id, order);
    }

    pub fn set_task_started(&self, name: &str) {
        let Some(scope) = &self.scope else {
            return;
        };
        let feedback = &scope.feedback;
        let operation = format!("Starting {}", name);
        feedback.set_current_operation(scope.state.job_record(), &operation);
        feedback.set_current_operation(&self.record_id, &operation);
        feedback.set_start_time(&self.record_id, Utc::now());
        feedback.set_state(&self.record_id, TimelineRecordState::InProgress);
        feedback.set_type(&self.record_id, RecordType::Task);
        feedback.set_name(&self.record_id, name);
    }

    pub fn set_task_result(&self, name: &str, result: TaskResult) {
        self.complete_record(name, result, RecordType::Task);
    }

    fn complete_record(&self, name: &str, result: TaskResult, record_type: RecordType) {
        let Some(feedback) = self.feedback() else {
            return;
        };
        feedback.set_current_operation(&self.record_id, &format!("Completed {}", name));
        feedback.set_state(&self.record_id, TimelineRecordState::Completed);
        feedback.set_finish_time(&self.record_id, Utc::now());
        feedback.set_result(&self.record_id, result);
        feedback.set_type(&self.record_id, record_type);
        feedback.set_name(&self.record_id, name);
    }

    pub fn set_job_in_progress(&self) {
        let Some(scope) = &self.scope else {
            return;
        };
        let feedback = &scope.feedback;
        feedback.set_current_operation(&self.record_id, "Starting");
        feedback.set_name(&self.record_id, scope.state.job_name());
        feedback.set_start_time(&self.record_id, Utc::now());
        feedback.set_state(&self.record_id, TimelineRecordState::InProgress);
        feedback.set_type(&self.record_id, RecordType::Job);
        feedback.set_worker_name(&self.record_id, scope.state.agent_name());
    }

    /// Complete the job record with its final result.
    pub fn finish_job(&self, result: TaskResult) {
        if let Some(state) = self.job_state() {
            let name = state.job_name().to_string();
            self.complete_record(&name, result, RecordType::Job);
        }
    }

    /// Close the sinks; the last log page goes to the upload queue.
    pub fn finish(&self) {
        for sink in &self.sinks {
            sink.end();
        }
    }
}

impl HandlerContext for ExecutionContext {
    fn output(&self, line: &str) {
        ExecutionContext::output(self, line);
    }

    fn info(&self, message: &str) {
        ExecutionContext::info(self, message);
    }

    fn warning(&self, message: &str) {
        ExecutionContext::warning(self, message);
    }

    fn error(&self, message: &str) {
        ExecutionContext::error(self, message);
    }

    fn verbose(&self, message: &str) {
        ExecutionContext::verbose(self, message);
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
