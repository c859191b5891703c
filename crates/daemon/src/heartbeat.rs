// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Liveness file for external supervisors.

use std::path::{Path, PathBuf};

/// Writes the agent's pid to `<work>/.pid` before every poll.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    path: PathBuf,
}

impl Heartbeat {
    pub const FILE: &'static str = ".pid";

    pub fn new(work_folder: &Path) -> Self {
        Self {
            path: work_folder.join(Self::FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the file, which also refreshes its modification time.
    pub fn beat(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, format!("{}\n", std::process::id()))
    }

    pub fn stop(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
