// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task commands embedded in task output.
//!
//! Format: `##vso[area.event key=value;key=value]message`. Property keys
//! are case-insensitive.

use std::collections::BTreeMap;

use relay_core::TaskResult;
use thiserror::Error;

use crate::context::ExecutionContext;

pub const COMMAND_PREFIX: &str = "##vso[";

/// Errors parsing a task command line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("missing command prefix")]
    MissingPrefix,
    #[error("missing closing bracket")]
    Unterminated,
    #[error("command '{0}' has no event (expected area.event)")]
    MissingEvent(String),
}

/// A parsed task command.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskCommand {
    pub area: String,
    pub event: String,
    /// Keys are lower-cased.
    pub properties: BTreeMap<String, String>,
    pub message: String,
}

impl TaskCommand {
    pub fn parse(line: &str) -> Result<TaskCommand, CommandError> {
        let rest = line
            .trim_start()
            .strip_prefix(COMMAND_PREFIX)
            .ok_or(CommandError::MissingPrefix)?;
        let (inner, message) = rest.split_once(']').ok_or(CommandError::Unterminated)?;

        let inner = inner.trim();
        let (name, props) = match inner.split_once(char::is_whitespace) {
            Some((name, props)) => (name, props),
            None => (inner, ""),
        };
        let (area, event) = name
            .split_once('.')
            .filter(|(a, e)| !a.is_empty() && !e.is_empty())
            .ok_or_else(|| CommandError::MissingEvent(name.to_string()))?;

        let properties = props
            .split(';')
            .filter_map(|pair| {
                let (key, value) = pair.split_once('=')?;
                let key = key.trim();
                if key.is_empty() {
                    return None;
                }
                Some((key.to_ascii_lowercase(), value.trim().to_string()))
            })
            .collect();

        Ok(TaskCommand {
            area: area.to_string(),
            event: event.to_string(),
            properties,
            message: message.trim_end_matches(['\r', '\n']).to_string(),
        })
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Run a command against the context that produced it.
pub fn execute(ctx: &ExecutionContext, command: &TaskCommand) {
    let area = command.area.to_ascii_lowercase();
    let event = command.event.to_ascii_lowercase();
    match (area.as_str(), event.as_str()) {
        ("task", "setvariable") => set_variable(ctx, command),
        ("task", "complete") => complete(ctx, command),
        ("task", "issue") => issue(ctx, command),
        ("task", "debug") => ctx.verbose(&command.message),
        _ => ctx.warning(&format!(
            "unknown command {}.{}",
            command.area, command.event
        )),
    }
}

fn set_variable(ctx: &ExecutionContext, command: &TaskCommand) {
    let Some(name) = command.property("variable").filter(|n| !n.is_empty()) else {
        ctx.warning("command setvariable variable not set");
        return;
    };
    let secret = command
        .property("issecret")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    ctx.set_variable(name, &command.message, secret);
    if secret {
        ctx.verbose(&format!("set secret variable {}", name));
    } else {
        ctx.verbose(&format!("set variable {}", name));
    }
}

fn complete(ctx: &ExecutionContext, command: &TaskCommand) {
    let result = match command.property("result") {
        None => TaskResult::Succeeded,
        Some(value) => match TaskResult::parse(value) {
            Some(result) => result,
            None => {
                ctx.warning(&format!("invalid task result: {}", value));
                return;
            }
        },
    };
    if !command.message.is_empty() {
        ctx.info(&command.message);
    }
    ctx.set_result(result);
}

fn issue(ctx: &ExecutionContext, command: &TaskCommand) {
    let Some(kind) = command.property("type") else {
        ctx.warning("command issue type not set");
        return;
    };
    match kind.to_ascii_lowercase().as_str() {
        "error" => ctx.error(&command.message),
        "warning" => ctx.warning(&command.message),
        _ => ctx.warning(&format!("invalid command issue type: {}", kind)),
    }
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
