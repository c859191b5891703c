// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handler that runs task scripts under node or bash

use super::{HandlerContext, HandlerError, TaskHandler, TaskInvocation};
use async_trait::async_trait;
use relay_core::vars::input_env_name;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Spawns the task's interpreter and streams its output line by line.
///
/// Stdout lines go to [`HandlerContext::output`], stderr lines to
/// [`HandlerContext::error`].
#[derive(Debug, Clone, Default)]
pub struct ProcessTaskHandler;

impl ProcessTaskHandler {
    pub fn new() -> Self {
        Self
    }

    fn command(invocation: &TaskInvocation) -> Command {
        let mut cmd = Command::new(invocation.kind.interpreter());
        cmd.arg(&invocation.script)
            .current_dir(&invocation.working_directory)
            .envs(invocation.variables.to_env())
            .envs(
                invocation
                    .inputs
                    .iter()
                    .map(|(k, v)| (input_env_name(k), v.clone())),
            )
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl TaskHandler for ProcessTaskHandler {
    async fn run(
        &self,
        invocation: &TaskInvocation,
        ctx: &dyn HandlerContext,
    ) -> Result<(), HandlerError> {
        let interpreter = invocation.kind.interpreter();
        ctx.verbose(&format!(
            "running {} {}",
            interpreter,
            invocation.script.display()
        ));

        let mut child = Self::command(invocation)
            .spawn()
            .map_err(|source| HandlerError::Spawn {
                interpreter: interpreter.to_string(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            HandlerError::Io(std::io::Error::other("stdout not captured"))
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            HandlerError::Io(std::io::Error::other("stderr not captured"))
        })?;
        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let mut out_open = true;
        let mut err_open = true;

        loop {
            tokio::select! {
                line = out_lines.next_line(), if out_open => match line {
                    Ok(Some(line)) => ctx.output(&line),
                    Ok(None) => out_open = false,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed reading task stdout");
                        out_open = false;
                    }
                },
                line = err_lines.next_line(), if err_open => match line {
                    Ok(Some(line)) => ctx.error(&line),
                    Ok(None) => err_open = false,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed reading task stderr");
                        err_open = false;
                    }
                },
                else => break,
            }
        }

        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            match status.code() {
                Some(code) => Err(HandlerError::ExitCode(code)),
                None => Err(HandlerError::Signaled),
            }
        }
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
