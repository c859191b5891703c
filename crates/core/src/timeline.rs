// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timeline records: the server-visible status of a job, plugin, or task.
//!
//! A `TimelineRecord` here is a *patch*: every field except `id` is optional
//! and only fields that were set are serialized. Several in-process mutations
//! of the same record merge into one patch before it is sent.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Identifies one timeline record (the job, a plugin invocation, or a task).
    #[derive(Default)]
    pub struct RecordId;
}

crate::define_id! {
    /// Identifies this agent's polling session on the work queue.
    pub struct SessionId;
}

/// Lifecycle state of a timeline record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimelineRecordState {
    Pending,
    InProgress,
    Completed,
}

/// Outcome of a task, a plugin, or the whole job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskResult {
    Succeeded,
    SucceededWithIssues,
    Failed,
    Canceled,
    Skipped,
    Abandoned,
}

impl TaskResult {
    /// Results that count as a passing job.
    pub fn is_success(self) -> bool {
        matches!(self, TaskResult::Succeeded | TaskResult::SucceededWithIssues)
    }

    /// Combine the running job result with the result of one more step.
    ///
    /// Failure is sticky; issues downgrade success; skipped steps change nothing.
    pub fn merge(self, step: TaskResult) -> TaskResult {
        match (self, step) {
            (TaskResult::Failed, _) | (_, TaskResult::Failed) => TaskResult::Failed,
            (TaskResult::Canceled, _) | (_, TaskResult::Canceled) => TaskResult::Canceled,
            (TaskResult::Abandoned, _) | (_, TaskResult::Abandoned) => TaskResult::Abandoned,
            (TaskResult::SucceededWithIssues, _) | (_, TaskResult::SucceededWithIssues) => {
                TaskResult::SucceededWithIssues
            }
            _ => TaskResult::Succeeded,
        }
    }

    /// Parse the case-insensitive names used by task commands.
    pub fn parse(s: &str) -> Option<TaskResult> {
        match s.to_ascii_lowercase().as_str() {
            "succeeded" => Some(TaskResult::Succeeded),
            "succeededwithissues" => Some(TaskResult::SucceededWithIssues),
            "failed" => Some(TaskResult::Failed),
            "canceled" | "cancelled" => Some(TaskResult::Canceled),
            "skipped" => Some(TaskResult::Skipped),
            "abandoned" => Some(TaskResult::Abandoned),
            _ => None,
        }
    }
}

impl fmt::Display for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskResult::Succeeded => "succeeded",
            TaskResult::SucceededWithIssues => "succeeded with issues",
            TaskResult::Failed => "failed",
            TaskResult::Canceled => "canceled",
            TaskResult::Skipped => "skipped",
            TaskResult::Abandoned => "abandoned",
        };
        write!(f, "{}", s)
    }
}

/// What a timeline record stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordType {
    Job,
    Task,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueType {
    Error,
    Warning,
}

/// An error or warning attached to a timeline record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

/// Server-side log object a record's pages are appended to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogReference {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Partial update of one timeline record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineRecord {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<RecordId>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<RecordType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<TimelineRecordState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<LogReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<Issue>>,
}

impl TimelineRecord {
    /// An empty patch for the given record.
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[path = "timeline_tests.rs"]
mod tests;
