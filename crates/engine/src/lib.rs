// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! relay-engine: runs one job and streams its feedback to the service

pub mod batch;
pub mod commands;
mod completion;
mod context;
mod error;
pub mod feedback;
mod lease;
mod orchestrator;
pub mod paging_logger;
pub mod plugins;
mod sink;
pub mod task_manager;

#[cfg(test)]
mod test_helpers;

pub use batch::{BatchMap, BatchProcessor, BatchQueue};
pub use completion::{run_job, Completion, CompletionGuard, JobCompletion};
pub use context::{ExecutionContext, JobState};
pub use error::{EngineError, QueueClosed};
pub use feedback::{FeedbackChannel, FeedbackConfig, LogPage};
pub use lease::{Abandonment, LeaseRenewer};
pub use orchestrator::{JobOrchestrator, Phase};
pub use paging_logger::PagingLogger;
pub use plugins::{AfterJobPlugin, BeforeJobPlugin, PluginSet};
pub use sink::{Level, Sink, TracingSink};
