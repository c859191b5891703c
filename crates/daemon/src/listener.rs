// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work-queue listener: session lifecycle and the long-poll loop.

use std::time::Duration;

use relay_adapters::{QueueClient, QueueError, SessionRequest};
use relay_core::{QueueMessage, SessionId};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(15);
pub const DEFAULT_MAX_SESSION_RETRIES: u32 = 10;

/// Errors that end listening
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("agent credentials were rejected")]
    Unauthorized,

    #[error("agent is not configured correctly: {0}")]
    BadRequest(String),

    #[error("session unavailable after {attempts} conflicting attempts; is another agent running with this identity?")]
    SessionUnavailable { attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub session: SessionRequest,
    pub retry_delay: Duration,
    /// Session conflicts tolerated before giving up.
    pub max_session_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerPhase {
    NoSession,
    SessionRequested,
    Listening,
    WaitingRetry,
    Stopped,
}

/// Everything the listener tracks between polls.
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerState {
    pub phase: ListenerPhase,
    pub session_id: Option<SessionId>,
    /// Id of the last message handed out; polls ask for messages after it.
    pub last_message_id: Option<u64>,
}

impl Default for ListenerState {
    fn default() -> Self {
        Self {
            phase: ListenerPhase::NoSession,
            session_id: None,
            last_message_id: None,
        }
    }
}

/// Owns one agent session and hands out queue messages in order.
pub struct JobListener<Q> {
    queue: Q,
    config: ListenerConfig,
    state: ListenerState,
}

impl<Q: QueueClient> JobListener<Q> {
    pub fn new(queue: Q, config: ListenerConfig) -> Self {
        Self {
            queue,
            config,
            state: ListenerState::default(),
        }
    }

    pub fn state(&self) -> &ListenerState {
        &self.state
    }

    /// Create a session, retrying until it succeeds or fails for good.
    ///
    /// A 401 or 400 fails at once. Conflicts are retried up to
    /// `max_session_retries` times. Anything else is retried forever.
    pub async fn create_session(&mut self) -> Result<SessionId, ListenerError> {
        let mut conflicts = 0;
        loop {
            self.state.phase = ListenerPhase::SessionRequested;
            match self.queue.create_session(&self.config.session).await {
                Ok(session_id) => {
                    info!(session_id = %session_id, "session created");
                    self.state.session_id = Some(session_id.clone());
                    return Ok(session_id);
                }
                Err(QueueError::Unauthorized) => {
                    self.state.phase = ListenerPhase::Stopped;
                    return Err(ListenerError::Unauthorized);
                }
                Err(QueueError::BadRequest(message)) => {
                    self.state.phase = ListenerPhase::Stopped;
                    return Err(ListenerError::BadRequest(message));
                }
                Err(QueueError::Conflict(message)) => {
                    conflicts += 1;
                    if conflicts > self.config.max_session_retries {
                        self.state.phase = ListenerPhase::Stopped;
                        return Err(ListenerError::SessionUnavailable {
                            attempts: conflicts,
                        });
                    }
                    warn!(attempt = conflicts, %message, "session held elsewhere, retrying");
                }
                Err(e) => warn!(error = %e, "failed to create session, retrying"),
            }
            self.wait_retry().await;
        }
    }

    /// Long-poll until a message arrives, then delete it from the queue
    /// and hand it out.
    pub async fn next_message(&mut self) -> Result<QueueMessage, ListenerError> {
        loop {
            let session_id = match &self.state.session_id {
                Some(id) => id.clone(),
                None => self.create_session().await?,
            };
            self.state.phase = ListenerPhase::Listening;
            match self
                .queue
                .get_message(&session_id, self.state.last_message_id)
                .await
            {
                Ok(Some(message)) => {
                    self.state.last_message_id = Some(message.message_id);
                    if let Err(e) = self
                        .queue
                        .delete_message(&session_id, message.message_id)
                        .await
                    {
                        warn!(message_id = message.message_id, error = %e, "failed to delete message");
                    }
                    return Ok(message);
                }
                Ok(None) => debug!("no message yet, polling again"),
                Err(QueueError::ConnectionReset) => debug!("connection reset, polling again"),
                Err(QueueError::Unauthorized) => {
                    self.state.phase = ListenerPhase::Stopped;
                    return Err(ListenerError::Unauthorized);
                }
                Err(QueueError::Conflict(message)) => {
                    warn!(%message, "session no longer valid, creating a new one");
                    self.state.session_id = None;
                }
                Err(e) => {
                    warn!(error = %e, "failed to get message, retrying");
                    self.wait_retry().await;
                }
            }
        }
    }

    /// Delete the session if one was created. Safe to call more than once.
    pub async fn stop(&mut self) {
        if let Some(session_id) = self.state.session_id.take() {
            match self.queue.delete_session(&session_id).await {
                Ok(()) => info!(session_id = %session_id, "session deleted"),
                Err(e) => warn!(session_id = %session_id, error = %e, "failed to delete session"),
            }
        }
        self.state.phase = ListenerPhase::Stopped;
    }

    async fn wait_retry(&mut self) {
        self.state.phase = ListenerPhase::WaitingRetry;
        tokio::time::sleep(self.config.retry_delay).await;
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
