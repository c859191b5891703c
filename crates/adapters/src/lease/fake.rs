// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake lease client for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{LeaseClient, LeaseError};
use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::{JobRequestUpdate, LockToken};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Recorded lease update
#[derive(Debug, Clone, PartialEq)]
pub struct LeaseCall {
    pub pool_id: u64,
    pub lock_token: LockToken,
    pub update: JobRequestUpdate,
    pub at: Instant,
}

#[derive(Default)]
struct FakeLeaseState {
    results: VecDeque<Result<(), LeaseError>>,
    calls: Vec<LeaseCall>,
    latency: Duration,
    in_flight: usize,
}

/// Lease client with scripted results and optional latency
#[derive(Clone, Default)]
pub struct FakeLeaseClient {
    inner: Arc<Mutex<FakeLeaseState>>,
}

impl FakeLeaseClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a result for the next update; unscripted updates succeed.
    pub fn push_result(&self, result: Result<(), LeaseError>) {
        self.inner.lock().results.push_back(result);
    }

    /// Delay every update by `latency` (tokio time).
    pub fn set_latency(&self, latency: Duration) {
        self.inner.lock().latency = latency;
    }

    pub fn calls(&self) -> Vec<LeaseCall> {
        self.inner.lock().calls.clone()
    }

    /// Number of renewals (updates without a result).
    pub fn renewals(&self) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| c.update.is_renewal())
            .count()
    }

    /// Updates that carried a final result.
    pub fn completions(&self) -> Vec<JobRequestUpdate> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| !c.update.is_renewal())
            .map(|c| c.update.clone())
            .collect()
    }

    /// Updates currently awaiting their (fake) response.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().in_flight
    }
}

#[async_trait]
impl LeaseClient for FakeLeaseClient {
    async fn update_job_request(
        &self,
        pool_id: u64,
        lock_token: &LockToken,
        update: &JobRequestUpdate,
    ) -> Result<(), LeaseError> {
        let (latency, result) = {
            let mut state = self.inner.lock();
            state.calls.push(LeaseCall {
                pool_id,
                lock_token: lock_token.clone(),
                update: update.clone(),
                at: Instant::now(),
            });
            state.in_flight += 1;
            (state.latency, state.results.pop_front().unwrap_or(Ok(())))
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.inner.lock().in_flight -= 1;
        result
    }
}
