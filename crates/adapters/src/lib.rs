// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for the agent's external collaborators: the orchestration
//! service (work queue, lease, telemetry, task store) and task processes.

pub mod handler;
pub mod http;
pub mod lease;
pub mod queue;
pub mod tasks;
pub mod telemetry;
pub mod traced;

pub use handler::{
    HandlerContext, HandlerError, HandlerKind, ProcessTaskHandler, TaskHandler, TaskInvocation,
};
pub use http::{HttpConfig, HttpServiceClient, HttpTelemetryClient};
pub use lease::{LeaseClient, LeaseError};
pub use queue::{QueueClient, QueueError, SessionRequest};
pub use tasks::{TaskStore, TaskStoreError};
pub use telemetry::{TelemetryClient, TelemetryError};
pub use traced::{TracedLease, TracedQueue, TracedTelemetry};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use handler::{FakeOutcome, FakeTaskHandler};
#[cfg(any(test, feature = "test-support"))]
pub use lease::{FakeLeaseClient, LeaseCall};
#[cfg(any(test, feature = "test-support"))]
pub use queue::{FakeQueueClient, QueueCall};
#[cfg(any(test, feature = "test-support"))]
pub use tasks::FakeTaskStore;
#[cfg(any(test, feature = "test-support"))]
pub use telemetry::{FakeTelemetryClient, TelemetryCall};
