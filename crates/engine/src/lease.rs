// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease keep-alive for the running job.
//!
//! A [`LeaseRenewer`] sends a renewal for the held lock token on a fixed
//! interval. A renewal rejected with a 4xx means the server gave the job
//! away; that is raised on the shared [`Abandonment`] signal instead of
//! being retried.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use relay_adapters::LeaseClient;
use relay_core::{JobLease, JobRequestUpdate};
use tokio::sync::{watch, Notify};

/// Server-initiated abandonment of the running job.
///
/// Clones observe the same signal. Raising it more than once is a no-op.
#[derive(Clone)]
pub struct Abandonment {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Abandonment {
    fn default() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }
}

impl Abandonment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Returns `true` for the first caller only.
    pub fn signal(&self) -> bool {
        self.tx.send_if_modified(|abandoned| {
            if *abandoned {
                false
            } else {
                *abandoned = true;
                true
            }
        })
    }

    pub fn is_signalled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the signal has been raised.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            while !*rx.borrow_and_update() {
                if rx.changed().await.is_err() {
                    // Sender lives as long as any clone; unreachable while awaited
                    std::future::pending::<()>().await;
                }
            }
        }
    }
}

struct RenewerState {
    enabled: Mutex<bool>,
    stop: Notify,
    in_flight: watch::Sender<bool>,
}

/// Periodic lease renewal.
pub struct LeaseRenewer {
    state: Arc<RenewerState>,
}

impl LeaseRenewer {
    /// Spawn the renewal loop. The first renewal is sent after one interval.
    pub fn start(
        client: Arc<dyn LeaseClient>,
        lease: JobLease,
        interval: Duration,
        abandonment: Abandonment,
    ) -> Self {
        let (in_flight, _) = watch::channel(false);
        let state = Arc::new(RenewerState {
            enabled: Mutex::new(true),
            stop: Notify::new(),
            in_flight,
        });
        tokio::spawn(renew_loop(
            Arc::clone(&state),
            client,
            lease,
            interval,
            abandonment,
        ));
        Self { state }
    }

    /// Stop further renewals. A renewal already in flight is not cancelled;
    /// await [`LeaseRenewer::finished`] to be sure the lease is idle.
    pub fn end(&self) {
        *self.state.enabled.lock() = false;
        self.state.stop.notify_one();
    }

    /// Resolves when no renewal is in flight.
    pub fn finished(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.state.in_flight.subscribe();
        async move {
            while *rx.borrow_and_update() {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn renew_loop(
    state: Arc<RenewerState>,
    client: Arc<dyn LeaseClient>,
    lease: JobLease,
    interval: Duration,
    abandonment: Abandonment,
) {
    let update = JobRequestUpdate::renewal(lease.request_id);
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = state.stop.notified() => {}
        }

        {
            // Checked under the lock so `end` either sees this renewal in
            // flight or prevents it.
            let enabled = state.enabled.lock();
            if !*enabled {
                break;
            }
            state.in_flight.send_replace(true);
        }

        let result = client
            .update_job_request(lease.pool_id, &lease.lock_token, &update)
            .await;
        state.in_flight.send_replace(false);

        match result {
            Ok(()) => {
                tracing::debug!(request_id = lease.request_id, "lease renewed");
            }
            Err(e) if e.is_abandoned() => {
                tracing::warn!(
                    request_id = lease.request_id,
                    error = %e,
                    "lease lost, job abandoned"
                );
                *state.enabled.lock() = false;
                abandonment.signal();
                break;
            }
            Err(e) => {
                tracing::warn!(
                    request_id = lease.request_id,
                    error = %e,
                    "lease renewal failed, will retry"
                );
            }
        }
    }
    tracing::debug!(request_id = lease.request_id, "lease renewer stopped");
}

#[cfg(test)]
#[path = "lease_tests.rs"]
mod tests;
