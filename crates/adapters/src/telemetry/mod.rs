// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Telemetry protocol: console lines, log pages, timeline records

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeTelemetryClient, TelemetryCall};

use async_trait::async_trait;
use relay_core::{LogReference, RecordId, TimelineRecord};
use thiserror::Error;

/// Errors from telemetry calls
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid response: {0}")]
    Decode(String),
}

/// Client for job feedback, scoped to one plan and timeline
#[async_trait]
pub trait TelemetryClient: Send + Sync + 'static {
    /// Post console lines for a record, in order.
    async fn post_console_lines(
        &self,
        record_id: &RecordId,
        lines: &[String],
    ) -> Result<(), TelemetryError>;

    /// Create a server-side log object at `path`.
    async fn create_log(&self, path: &str) -> Result<LogReference, TelemetryError>;

    /// Append one page of content to a log.
    async fn append_log_page(&self, log_id: u64, content: Vec<u8>) -> Result<(), TelemetryError>;

    /// Apply a batch of timeline record patches.
    async fn update_timeline_records(
        &self,
        records: &[TimelineRecord],
    ) -> Result<(), TelemetryError>;
}
