// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Secret masking for console and log output.

use std::sync::Arc;

use parking_lot::RwLock;

/// Replacement written in place of a secret.
pub const MASK: &str = "********";

/// Set of secret values scrubbed from output.
///
/// Clones share the same set, so a secret registered while a task runs
/// (e.g. via `task.setvariable issecret=true`) is masked everywhere.
#[derive(Debug, Clone, Default)]
pub struct Masker {
    secrets: Arc<RwLock<Vec<String>>>,
}

impl Masker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret. Empty and duplicate values are ignored.
    pub fn add(&self, secret: impl Into<String>) {
        let secret = secret.into();
        if secret.is_empty() {
            return;
        }
        let mut secrets = self.secrets.write();
        if !secrets.contains(&secret) {
            secrets.push(secret);
        }
    }

    pub fn len(&self) -> usize {
        self.secrets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.read().is_empty()
    }

    /// Replace every occurrence of every secret with [`MASK`].
    ///
    /// Overlapping or adjacent matches collapse into one mask.
    pub fn mask(&self, input: &str) -> String {
        let secrets = self.secrets.read();
        if secrets.is_empty() {
            return input.to_string();
        }

        let mut ranges: Vec<(usize, usize)> = Vec::new();
        for secret in secrets.iter() {
            let mut from = 0;
            while let Some(pos) = input[from..].find(secret.as_str()) {
                let start = from + pos;
                ranges.push((start, start + secret.len()));
                // Step one char so overlapping occurrences are found too
                from = start + input[start..].chars().next().map_or(1, char::len_utf8);
                if from >= input.len() {
                    break;
                }
            }
        }
        if ranges.is_empty() {
            return input.to_string();
        }

        ranges.sort_unstable();
        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
        for (start, end) in ranges {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }

        let mut out = String::with_capacity(input.len());
        let mut cursor = 0;
        for (start, end) in merged {
            out.push_str(&input[cursor..start]);
            out.push_str(MASK);
            cursor = end;
        }
        out.push_str(&input[cursor..]);
        out
    }
}

#[cfg(test)]
#[path = "mask_tests.rs"]
mod tests;
