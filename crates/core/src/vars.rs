// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job variables and `$(name)` expansion.
//!
//! Variable names are case-insensitive. The first spelling a name was set
//! with is kept for display and for the environment export.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Well-known variable names.
pub mod names {
    pub const AGENT_ROOT_DIRECTORY: &str = "agent.rootDirectory";
    pub const AGENT_WORKING_DIRECTORY: &str = "agent.workingDirectory";
    pub const AGENT_ID: &str = "agent.id";
    pub const AGENT_NAME: &str = "agent.name";
    pub const SYSTEM_COLLECTION_URI: &str = "system.teamFoundationCollectionUri";
    pub const SYSTEM_ACCESS_TOKEN: &str = "system.accessToken";
    pub const SYSTEM: &str = "system";
    pub const SYSTEM_DEBUG: &str = "system.debug";
    pub const BUILD_SOURCES_DIRECTORY: &str = "build.sourcesDirectory";
    pub const BUILD_STAGING_DIRECTORY: &str = "build.stagingDirectory";
    pub const BUILD_BINARIES_DIRECTORY: &str = "build.binariesDirectory";
}

/// Case-insensitive variable map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variables(BTreeMap<String, String>);

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.key_for(name)
            .and_then(|key| self.0.get(key))
            .map(String::as_str)
    }

    /// Set a variable, replacing any existing value under any casing.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let key = self.key_for(&name).map(str::to_string).unwrap_or(name);
        self.0.insert(key, value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.key_for(name).is_some()
    }

    /// `true` when the variable is set to "true" in any casing.
    pub fn is_true(&self, name: &str) -> bool {
        self.get(name)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace every `$(name)` reference with the variable's value.
    ///
    /// Unknown references are left as written.
    pub fn expand(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find("$(") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find(')') {
                Some(end) => {
                    let name = &after[..end];
                    match self.get(name) {
                        Some(value) => out.push_str(value),
                        None => {
                            out.push_str("$(");
                            out.push_str(name);
                            out.push(')');
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Variables as environment entries (see [`env_name`]).
    pub fn to_env(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(k, v)| (env_name(k), v.clone()))
            .collect()
    }

    fn key_for(&self, name: &str) -> Option<&str> {
        if let Some((key, _)) = self.0.get_key_value(name) {
            return Some(key.as_str());
        }
        self.0
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Variables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut vars = Variables::new();
        for (k, v) in iter {
            vars.set(k, v);
        }
        vars
    }
}

/// Environment variable name for a job variable: `build.sourcesDirectory`
/// becomes `BUILD_SOURCESDIRECTORY`.
pub fn env_name(name: &str) -> String {
    name.replace('.', "_").to_uppercase()
}

/// Environment variable name for a task input: `pattern` becomes `INPUT_PATTERN`.
pub fn input_env_name(name: &str) -> String {
    format!("INPUT_{}", env_name(name))
}

#[cfg(test)]
#[path = "vars_tests.rs"]
mod tests;
