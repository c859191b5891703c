// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in steps that run before and after a job's tasks.
//!
//! Plugins come from a static registry keyed by the job's system
//! (`system` variable). Unknown systems get no plugins.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use relay_core::vars::names;
use relay_core::JobOption;

use crate::context::{ExecutionContext, JobState};
use crate::error::EngineError;

/// Job option that asks for build outputs to be copied to staging.
pub const STAGING_OPTION_ID: &str = "82f9a3e8-3930-482e-ac62-ae3276f284d5";

pub const SOURCES_DIR: &str = "s";
pub const STAGING_DIR: &str = "a";
pub const BINARIES_DIR: &str = "b";

/// Runs before the task list. A failure fails the job and skips the tasks.
#[async_trait]
pub trait BeforeJobPlugin: Send + Sync {
    fn name(&self) -> &str;
    /// Shown on the timeline.
    fn title(&self) -> &str;
    async fn before_job(&self, ctx: &ExecutionContext) -> Result<(), EngineError>;
}

/// Runs after the task list, whatever the job outcome so far.
#[async_trait]
pub trait AfterJobPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn title(&self) -> &str;
    /// Whether to run given the job outcome so far.
    fn should_run(&self, job_succeeded: bool, ctx: &ExecutionContext) -> bool;
    async fn after_job(&self, ctx: &ExecutionContext) -> Result<(), EngineError>;
}

/// Ordered plugins for one job.
#[derive(Default)]
pub struct PluginSet {
    pub before: Vec<Box<dyn BeforeJobPlugin>>,
    pub after: Vec<Box<dyn AfterJobPlugin>>,
}

/// Plugins for `system`, configured from the job's options.
pub fn registry(system: &str, options: &BTreeMap<String, JobOption>) -> PluginSet {
    if !system.eq_ignore_ascii_case("build") {
        return PluginSet::default();
    }
    let mut set = PluginSet::default();
    set.before.push(Box::new(PrepareWorkspace));
    if let Some(option) = options.get(STAGING_OPTION_ID) {
        set.after.push(Box::new(CopyToStagingFolder {
            pattern: option.data.get("pattern").cloned().unwrap_or_default(),
        }));
    }
    set
}

fn job_state(ctx: &ExecutionContext, plugin: &str) -> Result<std::sync::Arc<JobState>, EngineError> {
    ctx.job_state().cloned().ok_or_else(|| EngineError::Plugin {
        plugin: plugin.to_string(),
        message: "not running inside a job".to_string(),
    })
}

/// Lays out the build directories and moves into the sources directory.
pub struct PrepareWorkspace;

#[async_trait]
impl BeforeJobPlugin for PrepareWorkspace {
    fn name(&self) -> &str {
        "prepareWorkspace"
    }

    fn title(&self) -> &str {
        "Preparing Workspace"
    }

    async fn before_job(&self, ctx: &ExecutionContext) -> Result<(), EngineError> {
        let state = job_state(ctx, self.name())?;
        let root = state.work_folder().to_path_buf();
        ctx.info(&format!("preparing workspace in {}", root.display()));

        let layout = [
            (names::BUILD_SOURCES_DIRECTORY, SOURCES_DIR),
            (names::BUILD_STAGING_DIRECTORY, STAGING_DIR),
            (names::BUILD_BINARIES_DIRECTORY, BINARIES_DIR),
        ];
        for (variable, dir) in layout {
            let path = root.join(dir);
            fs::create_dir_all(&path)?;
            state.set_variable(variable, &path.to_string_lossy(), false);
            ctx.verbose(&format!("{} = {}", variable, path.display()));
        }

        let sources = root.join(SOURCES_DIR);
        ctx.info(&format!("working directory: {}", sources.display()));
        state.set_working_directory(sources);
        Ok(())
    }
}

/// Copies files matching the staging option's patterns into the staging
/// directory, keeping their paths relative to the sources directory.
pub struct CopyToStagingFolder {
    /// `;`-separated globs, relative to the sources directory unless rooted.
    pub pattern: String,
}

impl CopyToStagingFolder {
    fn matches(&self, ctx: &ExecutionContext, sources: &Path) -> Result<Vec<PathBuf>, EngineError> {
        let mut files = Vec::new();
        for pattern in self.pattern.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let rooted = if Path::new(pattern).is_absolute() {
                PathBuf::from(pattern)
            } else {
                sources.join(pattern)
            };
            let rooted = rooted.to_string_lossy().into_owned();
            let entries = glob::glob(&rooted).map_err(|e| EngineError::Plugin {
                plugin: self.name().to_string(),
                message: format!("invalid pattern {}: {}", pattern, e),
            })?;
            for entry in entries {
                match entry {
                    Ok(path) if path.is_file() => files.push(path),
                    Ok(_) => {}
                    Err(e) => ctx.warning(&format!("cannot read {}", e.path().display())),
                }
            }
        }
        files.sort();
        files.dedup();
        Ok(files)
    }
}

#[async_trait]
impl AfterJobPlugin for CopyToStagingFolder {
    fn name(&self) -> &str {
        "copyToStagingFolder"
    }

    fn title(&self) -> &str {
        "Copy to staging folder"
    }

    fn should_run(&self, job_succeeded: bool, _ctx: &ExecutionContext) -> bool {
        job_succeeded
    }

    async fn after_job(&self, ctx: &ExecutionContext) -> Result<(), EngineError> {
        let state = job_state(ctx, self.name())?;
        let missing = |variable: &str| EngineError::Plugin {
            plugin: self.name().to_string(),
            message: format!("{} is not set", variable),
        };
        let sources = state
            .variable(names::BUILD_SOURCES_DIRECTORY)
            .map(PathBuf::from)
            .ok_or_else(|| missing(names::BUILD_SOURCES_DIRECTORY))?;
        let staging = state
            .variable(names::BUILD_STAGING_DIRECTORY)
            .map(PathBuf::from)
            .ok_or_else(|| missing(names::BUILD_STAGING_DIRECTORY))?;

        let expanded = CopyToStagingFolder {
            pattern: state.expand(&self.pattern),
        };
        ctx.info(&format!("looking for files in {}", sources.display()));
        let files = expanded.matches(ctx, &sources)?;
        ctx.info(&format!("found {} files", files.len()));

        fs::create_dir_all(&staging)?;
        for file in files {
            let relative = match file.strip_prefix(&sources) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => file.file_name().map(PathBuf::from).unwrap_or_default(),
            };
            let target = staging.join(&relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            ctx.verbose(&format!("copying {} to {}", file.display(), target.display()));
            fs::copy(&file, &target)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "plugins_tests.rs"]
mod tests;
