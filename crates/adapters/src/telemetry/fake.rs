// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake telemetry client for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{TelemetryClient, TelemetryError};
use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::{LogReference, RecordId, TimelineRecord};
use std::sync::Arc;

/// Recorded telemetry call
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryCall {
    ConsoleLines {
        record_id: RecordId,
        lines: Vec<String>,
    },
    CreateLog {
        path: String,
    },
    AppendLogPage {
        log_id: u64,
        content: Vec<u8>,
    },
    UpdateTimeline {
        records: Vec<TimelineRecord>,
    },
}

#[derive(Default)]
struct FakeTelemetryState {
    calls: Vec<TelemetryCall>,
    next_log_id: u64,
    fail_console: bool,
    fail_create_log: bool,
    fail_append: bool,
    fail_timeline: bool,
}

/// Telemetry client that records everything it is sent
#[derive(Clone, Default)]
pub struct FakeTelemetryClient {
    inner: Arc<Mutex<FakeTelemetryState>>,
}

impl FakeTelemetryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_console(&self, fail: bool) {
        self.inner.lock().fail_console = fail;
    }

    pub fn fail_create_log(&self, fail: bool) {
        self.inner.lock().fail_create_log = fail;
    }

    pub fn fail_append(&self, fail: bool) {
        self.inner.lock().fail_append = fail;
    }

    pub fn fail_timeline(&self, fail: bool) {
        self.inner.lock().fail_timeline = fail;
    }

    pub fn calls(&self) -> Vec<TelemetryCall> {
        self.inner.lock().calls.clone()
    }

    /// Every console batch, in posting order.
    pub fn console_batches(&self) -> Vec<Vec<String>> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                TelemetryCall::ConsoleLines { lines, .. } => Some(lines.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every timeline batch, in posting order.
    pub fn timeline_batches(&self) -> Vec<Vec<TimelineRecord>> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                TelemetryCall::UpdateTimeline { records } => Some(records.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn created_logs(&self) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                TelemetryCall::CreateLog { path } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn appended_pages(&self) -> Vec<(u64, Vec<u8>)> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                TelemetryCall::AppendLogPage { log_id, content } => {
                    Some((*log_id, content.clone()))
                }
                _ => None,
            })
            .collect()
    }
}

fn injected() -> TelemetryError {
    TelemetryError::Status {
        status: 500,
        body: "injected failure".to_string(),
    }
}

#[async_trait]
impl TelemetryClient for FakeTelemetryClient {
    async fn post_console_lines(
        &self,
        record_id: &RecordId,
        lines: &[String],
    ) -> Result<(), TelemetryError> {
        let mut state = self.inner.lock();
        state.calls.push(TelemetryCall::ConsoleLines {
            record_id: record_id.clone(),
            lines: lines.to_vec(),
        });
        if state.fail_console {
            return Err(injected());
        }
        Ok(())
    }

    async fn create_log(&self, path: &str) -> Result<LogReference, TelemetryError> {
        let mut state = self.inner.lock();
        state.calls.push(TelemetryCall::CreateLog {
            path: path.to_string(),
        });
        if state.fail_create_log {
            return Err(injected());
        }
        state.next_log_id += 1;
        Ok(LogReference {
            id: state.next_log_id,
            location: None,
        })
    }

    async fn append_log_page(&self, log_id: u64, content: Vec<u8>) -> Result<(), TelemetryError> {
        let mut state = self.inner.lock();
        state
            .calls
            .push(TelemetryCall::AppendLogPage { log_id, content });
        if state.fail_append {
            return Err(injected());
        }
        Ok(())
    }

    async fn update_timeline_records(
        &self,
        records: &[TimelineRecord],
    ) -> Result<(), TelemetryError> {
        let mut state = self.inner.lock();
        state.calls.push(TelemetryCall::UpdateTimeline {
            records: records.to_vec(),
        });
        if state.fail_timeline {
            return Err(injected());
        }
        Ok(())
    }
}
