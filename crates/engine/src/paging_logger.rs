// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Paged log files for upload.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use relay_core::{Masker, RecordId};

use crate::feedback::LogPage;
use crate::sink::{Level, Sink};

/// Lines per page file.
pub const PAGE_SIZE: usize = 256;

type PageCallback = Box<dyn Fn(LogPage) + Send + Sync>;

struct OpenPage {
    file: File,
    path: PathBuf,
}

#[derive(Default)]
struct PageState {
    page: Option<OpenPage>,
    page_count: u32,
    line_count: usize,
}

/// Writes one record's log as a series of page files.
///
/// Pages live at `<dir>/<record>_<n>.page`. A page is handed to the
/// callback once it holds [`PAGE_SIZE`] lines or the logger ends; the
/// receiver owns the file from then on.
///
/// Write failures are logged via tracing and otherwise ignored.
pub struct PagingLogger {
    dir: PathBuf,
    record_id: RecordId,
    masker: Masker,
    level: Level,
    state: Mutex<PageState>,
    on_page: PageCallback,
}

impl PagingLogger {
    pub fn new(
        dir: PathBuf,
        record_id: RecordId,
        masker: Masker,
        level: Level,
        on_page: impl Fn(LogPage) + Send + Sync + 'static,
    ) -> Self {
        Self {
            dir,
            record_id,
            masker,
            level,
            state: Mutex::new(PageState::default()),
            on_page: Box::new(on_page),
        }
    }

    fn write_line(&self, line: &str) {
        let masked = self.masker.mask(line);
        let mut state = self.state.lock();
        if let Err(e) = self.append(&mut state, &masked) {
            tracing::warn!(record_id = %self.record_id, error = %e, "failed to write log page");
            return;
        }
        state.line_count += 1;
        if state.line_count >= PAGE_SIZE {
            let page = self.close_page(&mut state);
            drop(state);
            if let Some(page) = page {
                (self.on_page)(page);
            }
        }
    }

    fn append(&self, state: &mut PageState, line: &str) -> std::io::Result<()> {
        if state.page.is_none() {
            state.page = Some(self.open_page(state.page_count + 1)?);
            state.page_count += 1;
            state.line_count = 0;
        }
        if let Some(page) = state.page.as_mut() {
            writeln!(page.file, "{}", line)?;
        }
        Ok(())
    }

    fn open_page(&self, number: u32) -> std::io::Result<OpenPage> {
        fs::create_dir_all(&self.dir)?;
        let path = page_path(&self.dir, &self.record_id, number);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(OpenPage { file, path })
    }

    fn close_page(&self, state: &mut PageState) -> Option<LogPage> {
        let mut page = state.page.take()?;
        if let Err(e) = page.file.flush() {
            tracing::warn!(path = %page.path.display(), error = %e, "failed to flush log page");
        }
        Some(LogPage {
            record_id: self.record_id.clone(),
            path: page.path,
            page_number: state.page_count,
        })
    }
}

impl Sink for PagingLogger {
    fn level(&self) -> Level {
        self.level
    }

    fn write(&self, line: &str) {
        self.write_line(line);
    }

    fn end(&self) {
        let page = self.close_page(&mut self.state.lock());
        if let Some(page) = page {
            (self.on_page)(page);
        }
    }
}

/// `<dir>/<record>_<n>.page`
pub fn page_path(dir: &Path, record_id: &RecordId, number: u32) -> PathBuf {
    dir.join(format!("{}_{}.page", record_id, number))
}

#[cfg(test)]
#[path = "paging_logger_tests.rs"]
mod tests;
