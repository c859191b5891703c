// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{job_payload, task};

#[test]
fn payload_deserializes_with_defaults() {
    let json = serde_json::json!({
        "jobId": "job-1",
        "jobName": "Build",
        "requestId": 42,
        "lockToken": "lock-abc",
        "plan": { "planId": "plan-1" },
        "timeline": { "id": "tl-1" },
        "tasks": [
            { "id": "t1", "instanceId": "r1", "name": "Shell", "version": "1.0.0" }
        ]
    });

    let payload: JobPayload = serde_json::from_value(json).unwrap();

    assert_eq!(payload.request_id, 42);
    assert_eq!(payload.tasks.len(), 1);
    assert!(payload.tasks[0].enabled);
    assert!(!payload.tasks[0].continue_on_error);
    assert_eq!(payload.tasks[0].title(), "Shell");
    assert!(payload.environment.variables.is_empty());
}

#[test]
fn lease_carries_request_and_token() {
    let payload = job_payload(vec![]);
    let lease = payload.lease(7);
    assert_eq!(lease.pool_id, 7);
    assert_eq!(lease.request_id, payload.request_id);
    assert_eq!(lease.lock_token, payload.lock_token);
}

#[test]
fn masker_covers_secret_variables_and_endpoint_credentials() {
    let mut payload = job_payload(vec![task("a")]);
    payload.environment.variables.set("db.password", "s3cret");
    payload.environment.secret_variables.push("DB.PASSWORD".to_string());
    payload.environment.system_connection = Some(ServiceEndpoint {
        name: "SystemVssConnection".to_string(),
        kind: "externaltfs".to_string(),
        url: "https://example.test".to_string(),
        authorization: Some(EndpointAuthorization {
            scheme: "OAuth".to_string(),
            parameters: [("AccessToken".to_string(), "tok123".to_string())].into(),
        }),
    });

    let masker = payload.masker();

    assert_eq!(payload.access_token(), Some("tok123"));
    assert_eq!(
        masker.mask("pw s3cret token tok123"),
        "pw ******** token ********"
    );
}

#[test]
fn renewal_serializes_without_result() {
    let update = JobRequestUpdate::renewal(9);
    assert!(update.is_renewal());
    let json = serde_json::to_value(&update).unwrap();
    assert_eq!(json, serde_json::json!({ "requestId": 9 }));
}

#[test]
fn finished_update_carries_result() {
    let at = chrono::Utc::now();
    let update = JobRequestUpdate::finished(9, at, TaskResult::Failed);
    assert!(!update.is_renewal());
    let json = serde_json::to_value(&update).unwrap();
    assert_eq!(json["result"], "failed");
    assert!(json.get("finishTime").is_some());
}
