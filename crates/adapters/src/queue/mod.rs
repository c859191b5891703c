// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work-queue protocol: sessions and long-poll message retrieval

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeQueueClient, QueueCall};

use async_trait::async_trait;
use relay_core::{QueueMessage, SessionId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from work-queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    /// Credentials were rejected (401).
    #[error("unauthorized")]
    Unauthorized,
    /// The request was malformed, e.g. the pool or agent does not exist (400).
    #[error("invalid configuration: {0}")]
    BadRequest(String),
    /// Another session already holds this agent's identity (409).
    #[error("session conflict: {0}")]
    Conflict(String),
    /// The server dropped the connection; re-poll at once.
    #[error("connection reset")]
    ConnectionReset,
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid response: {0}")]
    Decode(String),
}

/// Who is asking for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub owner_name: String,
    pub agent_id: u64,
    pub agent_name: String,
}

/// Client for the agent pool's message queue
#[async_trait]
pub trait QueueClient: Send + Sync + 'static {
    /// Open a polling session.
    async fn create_session(&self, request: &SessionRequest) -> Result<SessionId, QueueError>;

    async fn delete_session(&self, session_id: &SessionId) -> Result<(), QueueError>;

    /// Long-poll for the next message after `last_message_id`.
    ///
    /// `Ok(None)` means the server answered 202: nothing yet, poll again.
    async fn get_message(
        &self,
        session_id: &SessionId,
        last_message_id: Option<u64>,
    ) -> Result<Option<QueueMessage>, QueueError>;

    async fn delete_message(&self, session_id: &SessionId, message_id: u64) -> Result<(), QueueError>;
}
