// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::lease::{LeaseClient, LeaseError};
use crate::queue::{QueueClient, QueueError, SessionRequest};
use crate::telemetry::{TelemetryClient, TelemetryError};
use async_trait::async_trait;
use relay_core::{JobRequestUpdate, LockToken, LogReference, QueueMessage, RecordId, SessionId, TimelineRecord};
use tracing::Instrument;

/// Wrapper that adds tracing to any QueueClient
#[derive(Clone)]
pub struct TracedQueue<Q> {
    inner: Q,
}

impl<Q> TracedQueue<Q> {
    pub fn new(inner: Q) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<Q: QueueClient> QueueClient for TracedQueue<Q> {
    async fn create_session(&self, request: &SessionRequest) -> Result<SessionId, QueueError> {
        async {
            let start = std::time::Instant::now();
            let result = self.inner.create_session(request).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(id) => tracing::info!(session_id = %id, elapsed_ms, "session created"),
                Err(e) => tracing::warn!(elapsed_ms, error = %e, "create session failed"),
            }
            result
        }
        .instrument(tracing::info_span!(
            "queue.create_session",
            owner = %request.owner_name,
            agent = %request.agent_name
        ))
        .await
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<(), QueueError> {
        let result = self.inner.delete_session(session_id).await;
        tracing::info_span!("queue.delete_session", %session_id).in_scope(|| match &result {
            Ok(()) => tracing::info!("session deleted"),
            Err(e) => tracing::warn!(error = %e, "delete session failed"),
        });
        result
    }

    async fn get_message(
        &self,
        session_id: &SessionId,
        last_message_id: Option<u64>,
    ) -> Result<Option<QueueMessage>, QueueError> {
        async {
            let start = std::time::Instant::now();
            let result = self.inner.get_message(session_id, last_message_id).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(Some(msg)) => tracing::info!(
                    message_id = msg.message_id,
                    message_type = %msg.message_type,
                    elapsed_ms,
                    "message received"
                ),
                Ok(None) => tracing::trace!(elapsed_ms, "no message"),
                Err(e) => tracing::warn!(elapsed_ms, error = %e, "poll failed"),
            }
            result
        }
        .instrument(tracing::debug_span!("queue.get_message", %session_id, ?last_message_id))
        .await
    }

    async fn delete_message(&self, session_id: &SessionId, message_id: u64) -> Result<(), QueueError> {
        let result = self.inner.delete_message(session_id, message_id).await;
        if let Err(ref e) = result {
            tracing::warn!(message_id, error = %e, "delete message failed");
        }
        result
    }
}

/// Wrapper that adds tracing to any LeaseClient
#[derive(Clone)]
pub struct TracedLease<L> {
    inner: L,
}

impl<L> TracedLease<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<L: LeaseClient> LeaseClient for TracedLease<L> {
    async fn update_job_request(
        &self,
        pool_id: u64,
        lock_token: &LockToken,
        update: &JobRequestUpdate,
    ) -> Result<(), LeaseError> {
        async {
            let start = std::time::Instant::now();
            let result = self.inner.update_job_request(pool_id, lock_token, update).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(()) if update.is_renewal() => tracing::debug!(elapsed_ms, "lease renewed"),
                Ok(()) => tracing::info!(elapsed_ms, result = ?update.result, "job request finished"),
                Err(e) => tracing::warn!(elapsed_ms, error = %e, "lease update failed"),
            }
            result
        }
        .instrument(tracing::info_span!(
            "lease.update",
            pool_id,
            request_id = update.request_id
        ))
        .await
    }
}

/// Wrapper that adds tracing to any TelemetryClient
#[derive(Clone)]
pub struct TracedTelemetry<T> {
    inner: T,
}

impl<T> TracedTelemetry<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T: TelemetryClient> TelemetryClient for TracedTelemetry<T> {
    async fn post_console_lines(
        &self,
        record_id: &RecordId,
        lines: &[String],
    ) -> Result<(), TelemetryError> {
        let start = std::time::Instant::now();
        let result = self.inner.post_console_lines(record_id, lines).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(()) => tracing::trace!(%record_id, count = lines.len(), elapsed_ms, "console lines posted"),
            Err(e) => tracing::warn!(%record_id, count = lines.len(), elapsed_ms, error = %e, "console post failed"),
        }
        result
    }

    async fn create_log(&self, path: &str) -> Result<LogReference, TelemetryError> {
        let result = self.inner.create_log(path).await;
        match &result {
            Ok(log) => tracing::debug!(path, log_id = log.id, "log created"),
            Err(e) => tracing::warn!(path, error = %e, "create log failed"),
        }
        result
    }

    async fn append_log_page(&self, log_id: u64, content: Vec<u8>) -> Result<(), TelemetryError> {
        let bytes = content.len();
        let result = self.inner.append_log_page(log_id, content).await;
        match &result {
            Ok(()) => tracing::trace!(log_id, bytes, "log page appended"),
            Err(e) => tracing::warn!(log_id, bytes, error = %e, "append log page failed"),
        }
        result
    }

    async fn update_timeline_records(
        &self,
        records: &[TimelineRecord],
    ) -> Result<(), TelemetryError> {
        let start = std::time::Instant::now();
        let result = self.inner.update_timeline_records(records).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(()) => tracing::trace!(count = records.len(), elapsed_ms, "timeline updated"),
            Err(e) => tracing::warn!(count = records.len(), elapsed_ms, error = %e, "timeline update failed"),
        }
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
