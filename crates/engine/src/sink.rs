// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output sinks for execution contexts.

use relay_core::RecordId;

/// Verbosity of a context message, least verbose first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error,
    Warning,
    Status,
    Info,
    Verbose,
}

impl Level {
    /// Line tag written before the timestamp, if any.
    pub fn tag(self) -> Option<&'static str> {
        match self {
            Level::Error => Some("error"),
            Level::Warning => Some("warning"),
            Level::Verbose => Some("debug"),
            Level::Status | Level::Info => None,
        }
    }
}

/// Destination for formatted context lines.
pub trait Sink: Send + Sync {
    /// Most verbose level this sink accepts.
    fn level(&self) -> Level;

    fn write(&self, line: &str);

    fn write_error(&self, line: &str) {
        self.write(line);
    }

    /// No more lines will be written.
    fn end(&self) {}
}

/// Sends context lines to the process diagnostic log.
pub struct TracingSink {
    record_id: RecordId,
    level: Level,
}

impl TracingSink {
    pub fn new(record_id: RecordId, level: Level) -> Self {
        Self { record_id, level }
    }
}

impl Sink for TracingSink {
    fn level(&self) -> Level {
        self.level
    }

    fn write(&self, line: &str) {
        tracing::info!(record_id = %self.record_id, "{}", line);
    }

    fn write_error(&self, line: &str) {
        tracing::error!(record_id = %self.record_id, "{}", line);
    }
}
