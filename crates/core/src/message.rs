// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Messages exchanged with the work queue and between host and worker.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::job::{JobPayload, JobRequestUpdate, LockToken};

/// A message delivered by the work queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    pub message_id: u64,
    pub message_type: String,
    /// Opaque body; for job requests a JSON [`JobPayload`].
    pub body: String,
}

impl QueueMessage {
    pub const JOB_REQUEST: &'static str = "JobRequest";

    pub fn is_job_request(&self) -> bool {
        self.message_type.eq_ignore_ascii_case(Self::JOB_REQUEST)
    }

    pub fn job_payload(&self) -> Result<JobPayload, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Agent settings the worker needs to run a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    pub server_url: String,
    pub pool_id: u64,
    pub agent_id: u64,
    pub agent_name: String,
    pub work_folder: PathBuf,
    #[serde(default)]
    pub enable_access_token: bool,
    pub drain_timeout_secs: u64,
    pub max_issues: usize,
}

/// Host to worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WorkerMessage {
    Job {
        config: WorkerConfig,
        payload: Box<JobPayload>,
    },
    Abandoned,
}

/// Worker to host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostMessage {
    UpdateJobRequest {
        pool_id: u64,
        lock_token: LockToken,
        job_request: JobRequestUpdate,
    },
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
