// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake work-queue client for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{QueueClient, QueueError, SessionRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::{QueueMessage, SessionId};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::time::Instant;

/// Recorded queue call, stamped with tokio's (possibly paused) clock
#[derive(Debug, Clone, PartialEq)]
pub enum QueueCall {
    CreateSession {
        owner_name: String,
        at: Instant,
    },
    DeleteSession {
        session_id: SessionId,
    },
    GetMessage {
        session_id: SessionId,
        last_message_id: Option<u64>,
        at: Instant,
    },
    DeleteMessage {
        session_id: SessionId,
        message_id: u64,
    },
}

#[derive(Default)]
struct FakeQueueState {
    sessions: VecDeque<Result<SessionId, QueueError>>,
    messages: VecDeque<Result<Option<QueueMessage>, QueueError>>,
    delete_message_errors: VecDeque<QueueError>,
    calls: Vec<QueueCall>,
    next_session: u64,
}

/// Scripted work-queue client.
///
/// Session creation succeeds with `session-N` once its script runs out.
/// `get_message` never resolves once its script runs out, so a test only
/// polls as far as it has scripted.
#[derive(Clone, Default)]
pub struct FakeQueueClient {
    inner: Arc<Mutex<FakeQueueState>>,
}

impl FakeQueueClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next `create_session` call.
    pub fn push_session(&self, result: Result<SessionId, QueueError>) {
        self.inner.lock().sessions.push_back(result);
    }

    /// Queue a response for the next `get_message` call.
    pub fn push_message(&self, result: Result<Option<QueueMessage>, QueueError>) {
        self.inner.lock().messages.push_back(result);
    }

    /// Make the next `delete_message` call fail.
    pub fn fail_next_delete(&self, error: QueueError) {
        self.inner.lock().delete_message_errors.push_back(error);
    }

    pub fn calls(&self) -> Vec<QueueCall> {
        self.inner.lock().calls.clone()
    }

    /// Instants of every `get_message` call.
    pub fn poll_times(&self) -> Vec<Instant> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                QueueCall::GetMessage { at, .. } => Some(*at),
                _ => None,
            })
            .collect()
    }

    /// Instants of every `create_session` call.
    pub fn session_attempt_times(&self) -> Vec<Instant> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                QueueCall::CreateSession { at, .. } => Some(*at),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl QueueClient for FakeQueueClient {
    async fn create_session(&self, request: &SessionRequest) -> Result<SessionId, QueueError> {
        let mut state = self.inner.lock();
        state.calls.push(QueueCall::CreateSession {
            owner_name: request.owner_name.clone(),
            at: Instant::now(),
        });
        match state.sessions.pop_front() {
            Some(result) => result,
            None => {
                state.next_session += 1;
                Ok(SessionId::new(format!("session-{}", state.next_session)))
            }
        }
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<(), QueueError> {
        self.inner.lock().calls.push(QueueCall::DeleteSession {
            session_id: session_id.clone(),
        });
        Ok(())
    }

    async fn get_message(
        &self,
        session_id: &SessionId,
        last_message_id: Option<u64>,
    ) -> Result<Option<QueueMessage>, QueueError> {
        let next = {
            let mut state = self.inner.lock();
            state.calls.push(QueueCall::GetMessage {
                session_id: session_id.clone(),
                last_message_id,
                at: Instant::now(),
            });
            state.messages.pop_front()
        };
        match next {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    async fn delete_message(&self, session_id: &SessionId, message_id: u64) -> Result<(), QueueError> {
        let mut state = self.inner.lock();
        state.calls.push(QueueCall::DeleteMessage {
            session_id: session_id.clone(),
            message_id,
        });
        match state.delete_message_errors.pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
