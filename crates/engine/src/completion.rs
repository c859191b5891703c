// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exactly-once job completion.
//!
//! A job ends either because the orchestrator returned a result or because
//! the server abandoned it. Whichever path claims the guard first reports
//! and drains; the other is a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use relay_adapters::{TaskHandler, TaskStore};
use relay_core::{IdGen, TaskResult};
use tokio::sync::watch;

use crate::context::ExecutionContext;
use crate::feedback::FeedbackChannel;
use crate::orchestrator::JobOrchestrator;

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Finished(TaskResult),
    Abandoned,
}

/// One-shot flag; the first claim wins.
#[derive(Debug, Default)]
pub struct CompletionGuard {
    claimed: AtomicBool,
}

impl CompletionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` for the first caller only.
    pub fn claim(&self) -> bool {
        !self.claimed.swap(true, Ordering::SeqCst)
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }
}

/// Converges job completion and abandonment on one report and one drain.
pub struct JobCompletion {
    feedback: Arc<FeedbackChannel>,
    guard: CompletionGuard,
    drain_timeout: Duration,
    outcome: watch::Sender<Option<Completion>>,
}

impl JobCompletion {
    pub fn new(feedback: Arc<FeedbackChannel>, drain_timeout: Duration) -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            feedback,
            guard: CompletionGuard::new(),
            drain_timeout,
            outcome,
        }
    }

    /// The orchestrator finished with `result`: complete the job record,
    /// report the result and drain. `None` if the job already completed.
    pub async fn complete(&self, ctx: &ExecutionContext, result: TaskResult) -> Option<Completion> {
        if !self.guard.claim() {
            tracing::debug!(%result, "job already completed, ignoring result");
            return None;
        }
        ctx.finish_job(result);
        ctx.finish();
        if let Err(e) = self.feedback.finish_job_request(result, Utc::now()).await {
            tracing::error!(error = %e, "failed to report job result");
        }
        self.drain().await;
        Some(self.resolve(Completion::Finished(result)))
    }

    /// The server abandoned the job: stop renewing and drain without
    /// reporting a result. `None` if the job already completed.
    pub async fn abandon(&self) -> Option<Completion> {
        if !self.guard.claim() {
            tracing::debug!("job already completed, ignoring abandonment");
            return None;
        }
        tracing::warn!("job abandoned by the server, draining");
        self.feedback.abandonment().signal();
        self.drain().await;
        Some(self.resolve(Completion::Abandoned))
    }

    /// Resolves with the single outcome once a path has finished draining.
    pub async fn wait(&self) -> Completion {
        let mut rx = self.outcome.subscribe();
        loop {
            if let Some(outcome) = *rx.borrow_and_update() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return Completion::Abandoned;
            }
        }
    }

    async fn drain(&self) {
        let drained = self.feedback.drain();
        if tokio::time::timeout(self.drain_timeout, drained).await.is_err() {
            tracing::warn!(
                timeout_secs = self.drain_timeout.as_secs(),
                "feedback did not drain in time"
            );
        }
    }

    fn resolve(&self, outcome: Completion) -> Completion {
        self.outcome.send_replace(Some(outcome));
        outcome
    }
}

/// Run `orchestrator` in `ctx` and complete the job exactly once.
///
/// Abandonment does not interrupt a running step. The orchestrator stops at
/// the next step boundary while feedback drains in the background.
pub async fn run_job<S, H, G>(
    orchestrator: JobOrchestrator<S, H, G>,
    ctx: &ExecutionContext,
    completion: Arc<JobCompletion>,
) -> Completion
where
    S: TaskStore,
    H: TaskHandler,
    G: IdGen,
{
    let abandoned = completion.feedback.abandonment().wait();
    let watcher = {
        let completion = Arc::clone(&completion);
        tokio::spawn(async move {
            abandoned.await;
            completion.abandon().await;
        })
    };

    let result = orchestrator.run(ctx).await;
    if result == TaskResult::Abandoned || completion.feedback.abandonment().is_signalled() {
        completion.abandon().await;
    } else {
        completion.complete(ctx, result).await;
    }
    let outcome = completion.wait().await;
    watcher.abort();
    outcome
}

#[cfg(test)]
#[path = "completion_tests.rs"]
mod tests;
