// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use relay_adapters::{FakeLeaseClient, LeaseError};
use relay_core::LockToken;
use tokio::time::Instant;

const INTERVAL: Duration = Duration::from_millis(100);

fn lease() -> JobLease {
    JobLease {
        request_id: 42,
        lock_token: LockToken::new("lock-1"),
        pool_id: 3,
        expires_at: None,
    }
}

fn start(client: &FakeLeaseClient, abandonment: &Abandonment) -> LeaseRenewer {
    LeaseRenewer::start(
        Arc::new(client.clone()),
        lease(),
        INTERVAL,
        abandonment.clone(),
    )
}

#[tokio::test(start_paused = true)]
async fn renews_on_each_interval() {
    let client = FakeLeaseClient::new();
    let renewer = start(&client, &Abandonment::new());

    tokio::time::sleep(INTERVAL * 3 + Duration::from_millis(10)).await;

    assert_eq!(client.renewals(), 3);
    let call = &client.calls()[0];
    assert_eq!(call.pool_id, 3);
    assert_eq!(call.lock_token, "lock-1");
    assert_eq!(call.update, JobRequestUpdate::renewal(42));
    renewer.end();
}

#[tokio::test(start_paused = true)]
async fn end_stops_further_renewals() {
    let client = FakeLeaseClient::new();
    let renewer = start(&client, &Abandonment::new());

    tokio::time::sleep(INTERVAL + Duration::from_millis(10)).await;
    renewer.end();
    renewer.finished().await;
    tokio::time::sleep(INTERVAL * 5).await;

    assert_eq!(client.renewals(), 1);
}

#[tokio::test(start_paused = true)]
async fn finished_is_resolved_when_idle() {
    let client = FakeLeaseClient::new();
    let renewer = start(&client, &Abandonment::new());

    let before = Instant::now();
    renewer.finished().await;

    assert_eq!(before.elapsed(), Duration::ZERO);
    renewer.end();
}

#[tokio::test(start_paused = true)]
async fn finished_waits_for_the_renewal_in_flight() {
    let client = FakeLeaseClient::new();
    client.set_latency(Duration::from_millis(50));
    let renewer = start(&client, &Abandonment::new());

    tokio::time::sleep(INTERVAL + Duration::from_millis(10)).await;
    assert_eq!(client.in_flight(), 1);

    renewer.end();
    renewer.finished().await;

    assert_eq!(client.in_flight(), 0);
    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(client.renewals(), 1);
}

#[tokio::test(start_paused = true)]
async fn rejected_renewal_signals_abandonment() {
    let client = FakeLeaseClient::new();
    client.push_result(Ok(()));
    client.push_result(Err(LeaseError::Abandoned { status: 404 }));
    let abandonment = Abandonment::new();
    let _renewer = start(&client, &abandonment);

    abandonment.wait().await;
    tokio::time::sleep(INTERVAL * 5).await;

    assert!(abandonment.is_signalled());
    assert_eq!(client.renewals(), 2);
}

#[tokio::test(start_paused = true)]
async fn transport_failure_keeps_renewing() {
    let client = FakeLeaseClient::new();
    client.push_result(Err(LeaseError::Transport("reset".to_string())));
    let abandonment = Abandonment::new();
    let renewer = start(&client, &abandonment);

    tokio::time::sleep(INTERVAL * 3 + Duration::from_millis(10)).await;

    assert!(!abandonment.is_signalled());
    assert_eq!(client.renewals(), 3);
    renewer.end();
}

#[test]
fn abandonment_signals_once() {
    let abandonment = Abandonment::new();
    let other = abandonment.clone();

    assert!(abandonment.signal());
    assert!(!other.signal());
    assert!(other.is_signalled());
}
