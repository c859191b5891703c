// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use relay_adapters::{FakeOutcome, FakeTaskHandler, FakeTaskStore};
use relay_core::test_support::{job_payload, task, worker_config};
use relay_core::SequentialIdGen;

use crate::task_manager::TASK_FILE;
use crate::test_helpers::{JobHarness, JOB_RECORD};

fn completion(h: &JobHarness) -> Arc<JobCompletion> {
    Arc::new(JobCompletion::new(
        Arc::clone(&h.feedback),
        Duration::from_secs(30),
    ))
}

#[test]
fn guard_is_claimed_once() {
    let guard = CompletionGuard::new();

    assert!(!guard.is_claimed());
    assert!(guard.claim());
    assert!(!guard.claim());
    assert!(guard.is_claimed());
}

#[tokio::test]
async fn completion_then_abandonment_reports_once() {
    let h = JobHarness::new();
    let c = completion(&h);
    let ctx = h.job_context();

    let first = c.complete(&ctx, TaskResult::Succeeded).await;
    let second = c.abandon().await;

    assert_eq!(first, Some(Completion::Finished(TaskResult::Succeeded)));
    assert_eq!(second, None);
    assert_eq!(c.wait().await, Completion::Finished(TaskResult::Succeeded));
    let completions = h.lease.completions();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].result, Some(TaskResult::Succeeded));
    assert_eq!(h.record(JOB_RECORD).result, Some(TaskResult::Succeeded));
}

#[tokio::test]
async fn abandonment_then_completion_reports_nothing() {
    let h = JobHarness::new();
    let c = completion(&h);
    let ctx = h.job_context();

    let first = c.abandon().await;
    let second = c.complete(&ctx, TaskResult::Failed).await;

    assert_eq!(first, Some(Completion::Abandoned));
    assert_eq!(second, None);
    assert_eq!(c.wait().await, Completion::Abandoned);
    assert!(h.lease.completions().is_empty());
    assert!(h.feedback.abandonment().is_signalled());
}

#[tokio::test]
async fn concurrent_paths_settle_on_one_outcome() {
    for abandon_first in [true, false] {
        let h = JobHarness::new();
        let c = completion(&h);
        let ctx = h.job_context();

        let (a, b) = if abandon_first {
            let (abandon, complete) =
                tokio::join!(c.abandon(), c.complete(&ctx, TaskResult::Succeeded));
            (abandon, complete)
        } else {
            tokio::join!(c.complete(&ctx, TaskResult::Succeeded), c.abandon())
        };

        let outcomes: Vec<Completion> = [a, b].into_iter().flatten().collect();
        assert_eq!(outcomes.len(), 1, "abandon_first={}", abandon_first);
        assert_eq!(c.wait().await, outcomes[0]);
        let reported = h.lease.completions().len();
        match outcomes[0] {
            Completion::Finished(_) => assert_eq!(reported, 1),
            Completion::Abandoned => assert_eq!(reported, 0),
        }
    }
}

fn orchestrator(
    h: &JobHarness,
    handler: &FakeTaskHandler,
) -> JobOrchestrator<FakeTaskStore, FakeTaskHandler, SequentialIdGen> {
    let store = FakeTaskStore::new();
    store.add(
        "A",
        "1.0.0",
        &[(TASK_FILE, r#"{"execution": {"Bash": {"target": "run.sh"}}}"#)],
    );
    JobOrchestrator::new(
        job_payload(vec![task("A")]),
        worker_config(h.dir.path()),
        store,
        handler.clone(),
        SequentialIdGen::new("plugin"),
    )
}

#[tokio::test]
async fn run_job_reports_the_orchestrator_result() {
    let h = JobHarness::new();
    let handler = FakeTaskHandler::new();
    handler.set_outcome("A", FakeOutcome::fail(3));
    let ctx = h.job_context();

    let outcome = run_job(orchestrator(&h, &handler), &ctx, completion(&h)).await;

    assert_eq!(outcome, Completion::Finished(TaskResult::Failed));
    let completions = h.lease.completions();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].result, Some(TaskResult::Failed));
    assert_eq!(h.record(JOB_RECORD).result, Some(TaskResult::Failed));
    assert!(h
        .console_lines()
        .iter()
        .any(|l| l.contains("process exited with code 3")));
}

#[tokio::test]
async fn run_job_abandoned_before_start_reports_nothing() {
    let h = JobHarness::new();
    let handler = FakeTaskHandler::new();
    let ctx = h.job_context();
    h.feedback.abandonment().signal();

    let outcome = run_job(orchestrator(&h, &handler), &ctx, completion(&h)).await;

    assert_eq!(outcome, Completion::Abandoned);
    assert!(handler.ran().is_empty());
    assert!(h.lease.completions().is_empty());
}
