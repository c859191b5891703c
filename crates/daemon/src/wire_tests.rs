// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use relay_core::{HostMessage, JobRequestUpdate, LockToken, WorkerMessage};
use tokio::io::BufReader;

#[test]
fn messages_are_single_lines() {
    let bytes = encode(&WorkerMessage::Abandoned).unwrap();
    let text = String::from_utf8(bytes).unwrap();

    assert_eq!(text, "{\"messageType\":\"abandoned\"}\n");
}

#[test]
fn host_message_uses_camel_case_fields() {
    let msg = HostMessage::UpdateJobRequest {
        pool_id: 1,
        lock_token: LockToken::new("lock"),
        job_request: JobRequestUpdate::renewal(42),
    };
    let value: serde_json::Value =
        serde_json::from_slice(&encode(&msg).unwrap()).unwrap();

    assert_eq!(value["messageType"], "updateJobRequest");
    assert_eq!(value["poolId"], 1);
    assert_eq!(value["lockToken"], "lock");
    assert_eq!(value["jobRequest"]["requestId"], 42);
}

#[tokio::test]
async fn reads_messages_in_order_then_eof() {
    let input = b"{\"messageType\":\"abandoned\"}\n\n{\"messageType\":\"abandoned\"}\n";
    let mut reader = BufReader::new(&input[..]);

    let first: Option<WorkerMessage> = read_message(&mut reader).await.unwrap();
    let second: Option<WorkerMessage> = read_message(&mut reader).await.unwrap();
    let end: Option<WorkerMessage> = read_message(&mut reader).await.unwrap();

    assert_eq!(first, Some(WorkerMessage::Abandoned));
    assert_eq!(second, Some(WorkerMessage::Abandoned));
    assert_eq!(end, None);
}

#[tokio::test]
async fn garbage_line_is_a_json_error() {
    let mut reader = BufReader::new(&b"not json\n"[..]);

    let err = read_message::<_, WorkerMessage>(&mut reader)
        .await
        .unwrap_err();

    assert!(matches!(err, WireError::Json(_)));
}

#[tokio::test]
async fn write_then_read_over_a_pipe() {
    let (client, server) = tokio::io::duplex(1024);
    let mut writer = client;
    let mut reader = BufReader::new(server);

    write_message(&mut writer, &WorkerMessage::Abandoned)
        .await
        .unwrap();
    drop(writer);

    let msg: Option<WorkerMessage> = read_message(&mut reader).await.unwrap();
    assert_eq!(msg, Some(WorkerMessage::Abandoned));
}
