// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task definition store

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeTaskStore;

use async_trait::async_trait;
use relay_core::TaskInstance;
use std::path::Path;
use thiserror::Error;

/// Errors from task downloads
#[derive(Debug, Error)]
pub enum TaskStoreError {
    #[error("task {name}@{version} not found")]
    NotFound { name: String, version: String },
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid task bundle: {0}")]
    Decode(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of task definitions
#[async_trait]
pub trait TaskStore: Send + Sync + 'static {
    /// Download the definition of `task` and unpack it into `dest`.
    async fn download(&self, task: &TaskInstance, dest: &Path) -> Result<(), TaskStoreError>;
}
