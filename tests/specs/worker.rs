//! relay-worker stdin/stdout protocol specs

use crate::prelude::*;

fn job_line(work: &std::path::Path) -> String {
    let message = serde_json::json!({
        "messageType": "job",
        "config": {
            // Nothing listens on the discard port; telemetry fails fast
            "serverUrl": "http://127.0.0.1:9",
            "poolId": 1,
            "agentId": 7,
            "agentName": "agent-1",
            "workFolder": work,
            "drainTimeoutSecs": 10,
            "maxIssues": 10
        },
        "payload": {
            "jobId": "job-1",
            "jobName": "Empty",
            "requestId": 42,
            "lockToken": "lock-1",
            "plan": { "planId": "plan-1" },
            "timeline": { "id": "timeline-1" },
            "tasks": []
        }
    });
    format!("{}\n", message)
}

#[test]
fn empty_stdin_fails() {
    let output = relay_worker().write_stdin("").output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("before sending a job"));
    assert!(output.stdout.is_empty());
}

#[test]
fn garbage_on_stdin_fails() {
    let output = relay_worker().write_stdin("hello\n").output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("pipe error"));
}

#[test]
fn job_without_tasks_reports_success_to_the_host() {
    let dir = tempfile::tempdir().unwrap();

    let output = relay_worker()
        .write_stdin(job_line(dir.path()))
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let finals: Vec<serde_json::Value> = stdout(&output)
        .lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
        .filter(|m| m["jobRequest"]["result"].is_string())
        .collect();
    assert_eq!(finals.len(), 1, "stdout: {}", stdout(&output));
    assert_eq!(finals[0]["messageType"], "updateJobRequest");
    assert_eq!(finals[0]["lockToken"], "lock-1");
    assert_eq!(finals[0]["jobRequest"]["requestId"], 42);
    assert_eq!(finals[0]["jobRequest"]["result"], "succeeded");
    assert!(dir.path().join("_diag/worker-42.log").exists());
}
