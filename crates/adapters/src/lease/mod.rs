// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease protocol: renewing and completing a job request

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeLeaseClient, LeaseCall};

use async_trait::async_trait;
use relay_core::{JobRequestUpdate, LockToken};
use thiserror::Error;

/// Errors from lease updates
#[derive(Debug, Error)]
pub enum LeaseError {
    /// The server no longer recognises the lease (any 4xx).
    #[error("job request abandoned by server (status {status})")]
    Abandoned { status: u16 },
    #[error("transport error: {0}")]
    Transport(String),
}

impl LeaseError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: &str) -> Self {
        if (400..500).contains(&status) {
            LeaseError::Abandoned { status }
        } else {
            LeaseError::Transport(format!("status {}: {}", status, body))
        }
    }

    pub fn is_abandoned(&self) -> bool {
        matches!(self, LeaseError::Abandoned { .. })
    }
}

/// Client for job-request lease updates
#[async_trait]
pub trait LeaseClient: Send + Sync + 'static {
    /// Renew (no result) or complete (with result) a job request.
    async fn update_job_request(
        &self,
        pool_id: u64,
        lock_token: &LockToken,
        update: &JobRequestUpdate,
    ) -> Result<(), LeaseError>;
}

#[cfg(test)]
#[path = "lease_tests.rs"]
mod tests;
