// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task definitions on disk: download what is missing, then pick a handler.
//!
//! Definitions live in `<work>/tasks/<name>/<version>/task.json`.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use relay_adapters::{HandlerKind, TaskStore};
use relay_core::TaskInstance;
use serde::Deserialize;

use crate::error::EngineError;

pub const TASK_FILE: &str = "task.json";

/// Directory holding the definition of one task version.
pub fn task_dir(work_folder: &Path, task: &TaskInstance) -> PathBuf {
    work_folder
        .join("tasks")
        .join(&task.name)
        .join(&task.version)
}

/// Download every task definition not already on disk.
///
/// Tasks are deduplicated by id and version, so a task used twice in a job
/// is fetched once.
pub async fn ensure_tasks_exist(
    store: &dyn TaskStore,
    work_folder: &Path,
    tasks: &[TaskInstance],
) -> Result<(), EngineError> {
    let mut seen = HashSet::new();
    for task in tasks {
        if !seen.insert((task.id.as_str(), task.version.as_str())) {
            continue;
        }
        let dir = task_dir(work_folder, task);
        if dir.join(TASK_FILE).exists() {
            tracing::debug!(task = %task.name, version = %task.version, "task already present");
            continue;
        }
        tracing::info!(task = %task.name, version = %task.version, "downloading task");
        store
            .download(task, &dir)
            .await
            .map_err(|source| EngineError::TaskDownload {
                name: task.name.clone(),
                version: task.version.clone(),
                source,
            })?;
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct TaskDefinition {
    #[serde(default)]
    execution: BTreeMap<String, ExecutionTarget>,
}

#[derive(Debug, Deserialize)]
struct ExecutionTarget {
    target: String,
}

/// Handler and absolute script path for a downloaded task.
pub fn prepare_task(
    work_folder: &Path,
    task: &TaskInstance,
) -> Result<(HandlerKind, PathBuf), EngineError> {
    let dir = task_dir(work_folder, task);
    let path = dir.join(TASK_FILE);
    let invalid = |message: String| EngineError::InvalidTask {
        path: path.display().to_string(),
        message,
    };
    let content = std::fs::read_to_string(&path).map_err(|e| invalid(e.to_string()))?;
    let definition: TaskDefinition =
        serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;

    for kind in HandlerKind::PREFERENCE {
        let target = definition
            .execution
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(kind.name()))
            .map(|(_, target)| target);
        if let Some(target) = target {
            return Ok((kind, dir.join(&target.target)));
        }
    }
    Err(EngineError::NoHandler(task.name.clone()))
}

#[cfg(test)]
#[path = "task_manager_tests.rs"]
mod tests;
