// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine

use relay_adapters::{HandlerError, LeaseError, TaskStoreError, TelemetryError};
use thiserror::Error;

/// Errors raised while running a job
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("lease error: {0}")]
    Lease(#[from] LeaseError),
    #[error("failed to download task {name}@{version}: {source}")]
    TaskDownload {
        name: String,
        version: String,
        #[source]
        source: TaskStoreError,
    },
    #[error("invalid task definition {path}: {message}")]
    InvalidTask { path: String, message: String },
    #[error("task {0} has no supported execution handler")]
    NoHandler(String),
    #[error("task failed: {0}")]
    Handler(#[from] HandlerError),
    #[error("plugin {plugin} failed: {message}")]
    Plugin { plugin: String, message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A queue rejected an item because adding has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("queue is no longer accepting items")]
pub struct QueueClosed;
