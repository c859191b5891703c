// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! relay-core: Core data types for the relay build agent

pub mod id;
pub mod job;
pub mod mask;
pub mod message;
pub mod timeline;
pub mod vars;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use job::{
    EndpointAuthorization, JobEnvironment, JobLease, JobOption, JobPayload, JobRequestUpdate,
    LockToken, PlanId, PlanReference, ServiceEndpoint, TaskId, TaskInstance, TimelineId,
    TimelineReference,
};
pub use mask::Masker;
pub use message::{HostMessage, QueueMessage, WorkerConfig, WorkerMessage};
pub use timeline::{
    Issue, IssueType, LogReference, RecordId, RecordType, SessionId, TaskResult, TimelineRecord,
    TimelineRecordState,
};
pub use vars::Variables;
