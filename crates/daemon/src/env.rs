// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;

pub const CONFIG_VAR: &str = "RELAY_CONFIG";
pub const TOKEN_VAR: &str = "RELAY_TOKEN";
pub const WORK_DIR_VAR: &str = "RELAY_WORK_DIR";
pub const MAX_ISSUES_VAR: &str = "RELAY_MAX_ISSUES";
pub const WORKER_PATH_VAR: &str = "RELAY_WORKER_PATH";

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Config file path override
pub fn config_path() -> Option<PathBuf> {
    non_empty(CONFIG_VAR).map(PathBuf::from)
}

/// Agent access token; never read from the config file.
pub fn token() -> Option<String> {
    non_empty(TOKEN_VAR)
}

/// Work folder used to find the default config file
pub fn work_dir() -> Option<PathBuf> {
    non_empty(WORK_DIR_VAR).map(PathBuf::from)
}

/// Per-record cap on kept error and warning issues
pub fn max_issues() -> Option<usize> {
    non_empty(MAX_ISSUES_VAR).and_then(|s| s.trim().parse::<usize>().ok())
}

/// Worker binary override
pub fn worker_path() -> Option<PathBuf> {
    non_empty(WORKER_PATH_VAR).map(PathBuf::from)
}

#[cfg(test)]
#[path = "env_tests.rs"]
pub(crate) mod tests;
