// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn beat_writes_the_pid() {
    let dir = tempfile::tempdir().unwrap();
    let heartbeat = Heartbeat::new(&dir.path().join("work"));

    heartbeat.beat().unwrap();

    let content = std::fs::read_to_string(heartbeat.path()).unwrap();
    assert_eq!(content.trim(), std::process::id().to_string());
}

#[test]
fn stop_removes_the_file_and_tolerates_repeats() {
    let dir = tempfile::tempdir().unwrap();
    let heartbeat = Heartbeat::new(dir.path());
    heartbeat.beat().unwrap();

    heartbeat.stop().unwrap();
    heartbeat.stop().unwrap();

    assert!(!heartbeat.path().exists());
}
