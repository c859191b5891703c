// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! relay-daemon: the `relayd` host and the `relay-worker` job process
//!
//! The host owns the work-queue session and starts one worker per job. The
//! worker runs the job in-process and talks to the host over its stdio.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod env;
pub mod heartbeat;
pub mod lifecycle;
pub mod listener;
pub mod supervisor;
pub mod wire;
pub mod worker;

pub use heartbeat::Heartbeat;
pub use lifecycle::{Config, LifecycleError};
pub use listener::{JobListener, ListenerConfig, ListenerError, ListenerPhase, ListenerState};
pub use supervisor::{RelayReport, SupervisorError, WorkerSupervisor};
pub use wire::WireError;
pub use worker::{run_job_worker, RelayLeaseClient, WorkerError, WorkerServices};
