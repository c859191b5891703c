// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task handlers: run one task's script and report its output

mod process;

pub use process::ProcessTaskHandler;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeOutcome, FakeTaskHandler};

use async_trait::async_trait;
use relay_core::Variables;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Interpreter a task's execution section asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandlerKind {
    Node,
    Bash,
}

impl HandlerKind {
    /// Preference order when a task offers several handlers.
    pub const PREFERENCE: [HandlerKind; 2] = [HandlerKind::Node, HandlerKind::Bash];

    pub fn name(self) -> &'static str {
        match self {
            HandlerKind::Node => "Node",
            HandlerKind::Bash => "Bash",
        }
    }

    pub fn interpreter(self) -> &'static str {
        match self {
            HandlerKind::Node => "node",
            HandlerKind::Bash => "bash",
        }
    }
}

/// Everything a handler needs to run one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskInvocation {
    pub task_name: String,
    pub kind: HandlerKind,
    /// Absolute path of the script to run.
    pub script: PathBuf,
    pub working_directory: PathBuf,
    pub inputs: BTreeMap<String, String>,
    pub variables: Variables,
}

/// Where a handler sends output.
///
/// `output` receives raw lines, which may carry task commands.
pub trait HandlerContext: Send + Sync {
    fn output(&self, line: &str);
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
    fn verbose(&self, message: &str);
}

/// Errors from running a task
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("failed to start {interpreter}: {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: std::io::Error,
    },
    #[error("process exited with code {0}")]
    ExitCode(i32),
    #[error("process terminated by signal")]
    Signaled,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs a task's script to completion.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    /// `Ok` means the script succeeded.
    async fn run(
        &self,
        invocation: &TaskInvocation,
        ctx: &dyn HandlerContext,
    ) -> Result<(), HandlerError>;
}
