// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders for payloads used across crates' tests.

use std::collections::BTreeMap;
use std::path::Path;

use crate::job::{
    JobEnvironment, JobPayload, LockToken, PlanId, PlanReference, TaskId, TaskInstance,
    TimelineId, TimelineReference,
};
use crate::message::WorkerConfig;
use crate::timeline::RecordId;

/// A task named `name` with record id `rec-<name>`.
pub fn task(name: &str) -> TaskInstance {
    TaskInstance {
        id: TaskId::new(format!("id-{}", name)),
        instance_id: RecordId::new(format!("rec-{}", name)),
        name: name.to_string(),
        version: "1.0.0".to_string(),
        display_name: String::new(),
        enabled: true,
        continue_on_error: false,
        inputs: BTreeMap::new(),
    }
}

pub fn job_payload(tasks: Vec<TaskInstance>) -> JobPayload {
    JobPayload {
        job_id: RecordId::new("job-1"),
        job_name: "Build".to_string(),
        request_id: 42,
        lock_token: LockToken::new("lock-1"),
        plan: PlanReference {
            plan_id: PlanId::new("plan-1"),
            plan_type: "build".to_string(),
        },
        timeline: TimelineReference {
            id: TimelineId::new("timeline-1"),
        },
        tasks,
        environment: JobEnvironment::default(),
    }
}

pub fn worker_config(work_folder: impl AsRef<Path>) -> WorkerConfig {
    WorkerConfig {
        server_url: "http://localhost:8080".to_string(),
        pool_id: 1,
        agent_id: 7,
        agent_name: "agent-1".to_string(),
        work_folder: work_folder.as_ref().to_path_buf(),
        enable_access_token: false,
        drain_timeout_secs: 60,
        max_issues: 10,
    }
}
