// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Arc;

fn logger(dir: &Path, masker: Masker) -> (PagingLogger, Arc<Mutex<Vec<LogPage>>>) {
    let pages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&pages);
    let logger = PagingLogger::new(
        dir.to_path_buf(),
        RecordId::new("rec-1"),
        masker,
        Level::Info,
        move |page| sink.lock().push(page),
    );
    (logger, pages)
}

#[test]
fn nothing_written_means_no_page() {
    let dir = tempfile::tempdir().unwrap();
    let (logger, pages) = logger(dir.path(), Masker::new());

    logger.end();

    assert!(pages.lock().is_empty());
    assert!(!dir.path().join("rec-1_1.page").exists());
}

#[test]
fn end_hands_over_the_partial_page() {
    let dir = tempfile::tempdir().unwrap();
    let (logger, pages) = logger(dir.path(), Masker::new());

    logger.write("one");
    logger.write("two");
    logger.end();

    let pages = pages.lock();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].page_number, 1);
    assert_eq!(pages[0].record_id, "rec-1");
    assert_eq!(pages[0].path, dir.path().join("rec-1_1.page"));
    assert_eq!(std::fs::read_to_string(&pages[0].path).unwrap(), "one\ntwo\n");
}

#[test]
fn full_pages_roll_over() {
    let dir = tempfile::tempdir().unwrap();
    let (logger, pages) = logger(dir.path(), Masker::new());

    for i in 0..PAGE_SIZE + 3 {
        logger.write(&format!("line {}", i));
    }
    assert_eq!(pages.lock().len(), 1);
    logger.end();

    let pages = pages.lock();
    let numbers: Vec<u32> = pages.iter().map(|p| p.page_number).collect();
    assert_eq!(numbers, vec![1, 2]);
    let first = std::fs::read_to_string(&pages[0].path).unwrap();
    assert_eq!(first.lines().count(), PAGE_SIZE);
    let second = std::fs::read_to_string(&pages[1].path).unwrap();
    assert_eq!(second, format!("line {}\nline {}\nline {}\n", PAGE_SIZE, PAGE_SIZE + 1, PAGE_SIZE + 2));
}

#[test]
fn exactly_one_page_is_not_followed_by_an_empty_one() {
    let dir = tempfile::tempdir().unwrap();
    let (logger, pages) = logger(dir.path(), Masker::new());

    for i in 0..PAGE_SIZE {
        logger.write(&format!("line {}", i));
    }
    logger.end();

    assert_eq!(pages.lock().len(), 1);
}

#[test]
fn secrets_never_reach_disk() {
    let dir = tempfile::tempdir().unwrap();
    let masker = Masker::new();
    masker.add("s3cret");
    let (logger, pages) = logger(dir.path(), masker);

    logger.write_error("token=s3cret");
    logger.end();

    let content = std::fs::read_to_string(&pages.lock()[0].path).unwrap();
    assert_eq!(content, "token=********\n");
}

#[test]
fn creates_the_page_directory() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("_logs").join("pages");
    let (logger, pages) = logger(&nested, Masker::new());

    logger.write("hello");
    logger.end();

    assert!(pages.lock()[0].path.starts_with(&nested));
}
