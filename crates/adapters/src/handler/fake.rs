// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake task handler for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{HandlerContext, HandlerError, TaskHandler, TaskInvocation};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// What a fake task does when run
#[derive(Debug, Clone, Default)]
pub struct FakeOutcome {
    /// Lines written to stdout, in order.
    pub output: Vec<String>,
    /// Exit code; `None` means success.
    pub exit_code: Option<i32>,
}

impl FakeOutcome {
    pub fn succeed() -> Self {
        Self::default()
    }

    pub fn fail(code: i32) -> Self {
        Self {
            output: Vec::new(),
            exit_code: Some(code),
        }
    }

    pub fn with_output(mut self, lines: &[&str]) -> Self {
        self.output = lines.iter().map(|l| l.to_string()).collect();
        self
    }
}

#[derive(Default)]
struct FakeHandlerState {
    outcomes: HashMap<String, FakeOutcome>,
    invocations: Vec<TaskInvocation>,
}

/// Handler whose behaviour is scripted per task name; unscripted tasks succeed
#[derive(Clone, Default)]
pub struct FakeTaskHandler {
    inner: Arc<Mutex<FakeHandlerState>>,
}

impl FakeTaskHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_outcome(&self, task_name: &str, outcome: FakeOutcome) {
        self.inner
            .lock()
            .outcomes
            .insert(task_name.to_string(), outcome);
    }

    pub fn invocations(&self) -> Vec<TaskInvocation> {
        self.inner.lock().invocations.clone()
    }

    /// Names of the tasks run, in order.
    pub fn ran(&self) -> Vec<String> {
        self.inner
            .lock()
            .invocations
            .iter()
            .map(|i| i.task_name.clone())
            .collect()
    }
}

#[async_trait]
impl TaskHandler for FakeTaskHandler {
    async fn run(
        &self,
        invocation: &TaskInvocation,
        ctx: &dyn HandlerContext,
    ) -> Result<(), HandlerError> {
        let outcome = {
            let mut state = self.inner.lock();
            state.invocations.push(invocation.clone());
            state
                .outcomes
                .get(&invocation.task_name)
                .cloned()
                .unwrap_or_default()
        };
        for line in &outcome.output {
            ctx.output(line);
        }
        match outcome.exit_code {
            Some(code) => Err(HandlerError::ExitCode(code)),
            None => Ok(()),
        }
    }
}
