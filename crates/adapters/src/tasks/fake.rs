// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake task store for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{TaskStore, TaskStoreError};
use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::TaskInstance;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Default)]
struct FakeTaskStoreState {
    bundles: HashMap<(String, String), Vec<(String, String)>>,
    downloads: Vec<(String, String)>,
}

/// Task store serving in-memory bundles
#[derive(Clone, Default)]
pub struct FakeTaskStore {
    inner: Arc<Mutex<FakeTaskStoreState>>,
}

impl FakeTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the files of `name@version`.
    pub fn add(&self, name: &str, version: &str, files: &[(&str, &str)]) {
        self.inner.lock().bundles.insert(
            (name.to_string(), version.to_string()),
            files
                .iter()
                .map(|(n, c)| (n.to_string(), c.to_string()))
                .collect(),
        );
    }

    /// `(name, version)` of every download request.
    pub fn downloads(&self) -> Vec<(String, String)> {
        self.inner.lock().downloads.clone()
    }
}

#[async_trait]
impl TaskStore for FakeTaskStore {
    async fn download(&self, task: &TaskInstance, dest: &Path) -> Result<(), TaskStoreError> {
        let files = {
            let mut state = self.inner.lock();
            let key = (task.name.clone(), task.version.clone());
            state.downloads.push(key.clone());
            state.bundles.get(&key).cloned()
        };
        let files = files.ok_or_else(|| TaskStoreError::NotFound {
            name: task.name.clone(),
            version: task.version.clone(),
        })?;
        tokio::fs::create_dir_all(dest).await?;
        for (name, content) in files {
            tokio::fs::write(dest.join(name), content).await?;
        }
        Ok(())
    }
}
