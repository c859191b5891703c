// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use relay_adapters::{FakeQueueClient, QueueCall};

const RETRY: Duration = Duration::from_secs(15);

fn listener(queue: &FakeQueueClient, max_session_retries: u32) -> JobListener<FakeQueueClient> {
    JobListener::new(
        queue.clone(),
        ListenerConfig {
            session: SessionRequest {
                owner_name: "owner-1".to_string(),
                agent_id: 7,
                agent_name: "agent-1".to_string(),
            },
            retry_delay: RETRY,
            max_session_retries,
        },
    )
}

fn job_message(id: u64) -> QueueMessage {
    QueueMessage {
        message_id: id,
        message_type: QueueMessage::JOB_REQUEST.to_string(),
        body: "{}".to_string(),
    }
}

fn offsets(times: &[tokio::time::Instant]) -> Vec<Duration> {
    times.iter().map(|t| *t - times[0]).collect()
}

#[tokio::test(start_paused = true)]
async fn immediate_repoll_on_202_and_connection_reset() {
    let queue = FakeQueueClient::new();
    queue.push_message(Ok(None));
    queue.push_message(Err(QueueError::ConnectionReset));
    queue.push_message(Ok(Some(job_message(5))));
    let mut listener = listener(&queue, 10);

    let message = listener.next_message().await.unwrap();

    assert_eq!(message.message_id, 5);
    assert_eq!(
        offsets(&queue.poll_times()),
        vec![Duration::ZERO, Duration::ZERO, Duration::ZERO]
    );
}

#[tokio::test(start_paused = true)]
async fn other_poll_errors_wait_the_retry_delay() {
    let queue = FakeQueueClient::new();
    queue.push_message(Err(QueueError::Transport("unreachable".to_string())));
    queue.push_message(Err(QueueError::Status {
        status: 503,
        body: String::new(),
    }));
    queue.push_message(Ok(Some(job_message(1))));
    let mut listener = listener(&queue, 10);

    listener.next_message().await.unwrap();

    assert_eq!(
        offsets(&queue.poll_times()),
        vec![Duration::ZERO, RETRY, RETRY * 2]
    );
}

#[tokio::test(start_paused = true)]
async fn message_advances_watermark_and_is_deleted() {
    let queue = FakeQueueClient::new();
    queue.push_message(Ok(Some(job_message(3))));
    queue.push_message(Ok(Some(job_message(4))));
    let mut listener = listener(&queue, 10);

    listener.next_message().await.unwrap();
    listener.next_message().await.unwrap();

    let session = SessionId::new("session-1");
    let polls: Vec<Option<u64>> = queue
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            QueueCall::GetMessage {
                last_message_id, ..
            } => Some(last_message_id),
            _ => None,
        })
        .collect();
    assert_eq!(polls, vec![None, Some(3)]);
    assert!(queue.calls().contains(&QueueCall::DeleteMessage {
        session_id: session.clone(),
        message_id: 3,
    }));
    assert_eq!(listener.state().last_message_id, Some(4));
    assert_eq!(listener.state().session_id, Some(session));
}

#[tokio::test(start_paused = true)]
async fn failed_delete_does_not_block_polling() {
    let queue = FakeQueueClient::new();
    queue.fail_next_delete(QueueError::Transport("gone".to_string()));
    queue.push_message(Ok(Some(job_message(8))));
    queue.push_message(Ok(Some(job_message(9))));
    let mut listener = listener(&queue, 10);

    assert_eq!(listener.next_message().await.unwrap().message_id, 8);
    assert_eq!(listener.next_message().await.unwrap().message_id, 9);
}

#[tokio::test(start_paused = true)]
async fn repeated_conflicts_give_up() {
    let queue = FakeQueueClient::new();
    for _ in 0..5 {
        queue.push_session(Err(QueueError::Conflict("taken".to_string())));
    }
    let mut listener = listener(&queue, 2);

    let err = listener.create_session().await.unwrap_err();

    assert!(matches!(err, ListenerError::SessionUnavailable { attempts: 3 }));
    assert_eq!(
        offsets(&queue.session_attempt_times()),
        vec![Duration::ZERO, RETRY, RETRY * 2]
    );
    assert_eq!(listener.state().phase, ListenerPhase::Stopped);
}

#[tokio::test(start_paused = true)]
async fn conflict_then_success_keeps_going() {
    let queue = FakeQueueClient::new();
    queue.push_session(Err(QueueError::Conflict("taken".to_string())));
    queue.push_session(Ok(SessionId::new("s-2")));
    let mut listener = listener(&queue, 2);

    let session = listener.create_session().await.unwrap();

    assert_eq!(session, SessionId::new("s-2"));
}

#[tokio::test(start_paused = true)]
async fn transient_session_errors_retry_past_the_conflict_bound() {
    let queue = FakeQueueClient::new();
    for _ in 0..4 {
        queue.push_session(Err(QueueError::Transport("down".to_string())));
    }
    let mut listener = listener(&queue, 1);

    listener.create_session().await.unwrap();

    assert_eq!(queue.session_attempt_times().len(), 5);
}

#[yare::parameterized(
    unauthorized = { QueueError::Unauthorized },
    bad_request = { QueueError::BadRequest("no such pool".to_string()) },
)]
#[test_macro(tokio::test(start_paused = true))]
async fn credential_and_config_errors_are_fatal(error: QueueError) {
    let queue = FakeQueueClient::new();
    queue.push_session(Err(error));
    let mut listener = listener(&queue, 10);

    let err = listener.next_message().await.unwrap_err();

    assert!(matches!(
        err,
        ListenerError::Unauthorized | ListenerError::BadRequest(_)
    ));
    assert_eq!(queue.session_attempt_times().len(), 1);
    assert!(queue.poll_times().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unauthorized_poll_is_fatal() {
    let queue = FakeQueueClient::new();
    queue.push_message(Err(QueueError::Unauthorized));
    let mut listener = listener(&queue, 10);

    let err = listener.next_message().await.unwrap_err();

    assert!(matches!(err, ListenerError::Unauthorized));
}

#[tokio::test(start_paused = true)]
async fn invalid_session_during_poll_creates_a_new_one() {
    let queue = FakeQueueClient::new();
    queue.push_message(Err(QueueError::Conflict("expired".to_string())));
    queue.push_message(Ok(Some(job_message(2))));
    let mut listener = listener(&queue, 10);

    listener.next_message().await.unwrap();

    assert_eq!(queue.session_attempt_times().len(), 2);
    assert_eq!(listener.state().session_id, Some(SessionId::new("session-2")));
}

#[tokio::test]
async fn stop_deletes_the_session_once() {
    let queue = FakeQueueClient::new();
    let mut listener = listener(&queue, 10);
    listener.create_session().await.unwrap();

    listener.stop().await;
    listener.stop().await;

    let deletes = queue
        .calls()
        .into_iter()
        .filter(|c| matches!(c, QueueCall::DeleteSession { .. }))
        .count();
    assert_eq!(deletes, 1);
    assert_eq!(listener.state().phase, ListenerPhase::Stopped);
}

#[tokio::test]
async fn stop_without_session_is_a_no_op() {
    let queue = FakeQueueClient::new();
    let mut listener = listener(&queue, 10);

    listener.stop().await;

    assert!(queue.calls().is_empty());
}
