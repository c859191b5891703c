// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::handler::HandlerKind;
use parking_lot::Mutex;
use relay_core::Variables;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Default)]
struct RecordingContext {
    lines: Mutex<Vec<(String, String)>>,
}

impl RecordingContext {
    fn lines(&self, kind: &str) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|(k, _)| k == kind)
            .map(|(_, l)| l.clone())
            .collect()
    }

    fn push(&self, kind: &str, line: &str) {
        self.lines.lock().push((kind.to_string(), line.to_string()));
    }
}

impl HandlerContext for RecordingContext {
    fn output(&self, line: &str) {
        self.push("output", line);
    }
    fn info(&self, message: &str) {
        self.push("info", message);
    }
    fn warning(&self, message: &str) {
        self.push("warning", message);
    }
    fn error(&self, message: &str) {
        self.push("error", message);
    }
    fn verbose(&self, message: &str) {
        self.push("verbose", message);
    }
}

fn bash_invocation(dir: &Path, script: &str) -> TaskInvocation {
    let path = dir.join("run.sh");
    std::fs::write(&path, script).unwrap();
    TaskInvocation {
        task_name: "shell".to_string(),
        kind: HandlerKind::Bash,
        script: path,
        working_directory: dir.to_path_buf(),
        inputs: BTreeMap::new(),
        variables: Variables::new(),
    }
}

#[tokio::test]
async fn streams_stdout_and_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let invocation = bash_invocation(dir.path(), "echo one\necho two\necho oops >&2\n");
    let ctx = RecordingContext::default();

    ProcessTaskHandler::new().run(&invocation, &ctx).await.unwrap();

    assert_eq!(ctx.lines("output"), vec!["one", "two"]);
    assert_eq!(ctx.lines("error"), vec!["oops"]);
}

#[tokio::test]
async fn exports_variables_and_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let mut invocation = bash_invocation(
        dir.path(),
        "echo \"$BUILD_SOURCESDIRECTORY|$INPUT_PATTERN|$(pwd)\"\n",
    );
    invocation
        .variables
        .set("build.sourcesDirectory", "/src");
    invocation
        .inputs
        .insert("pattern".to_string(), "*.txt".to_string());
    let ctx = RecordingContext::default();

    ProcessTaskHandler::new().run(&invocation, &ctx).await.unwrap();

    let cwd = dir.path().canonicalize().unwrap();
    assert_eq!(
        ctx.lines("output"),
        vec![format!("/src|*.txt|{}", cwd.display())]
    );
}

#[tokio::test]
async fn nonzero_exit_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let invocation = bash_invocation(dir.path(), "exit 3\n");
    let ctx = RecordingContext::default();

    let err = ProcessTaskHandler::new()
        .run(&invocation, &ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, HandlerError::ExitCode(3)));
}

#[tokio::test]
async fn missing_working_directory_fails_to_spawn() {
    let dir = tempfile::tempdir().unwrap();
    let mut invocation = bash_invocation(dir.path(), "echo hi\n");
    invocation.working_directory = dir.path().join("missing");
    let ctx = RecordingContext::default();

    let err = ProcessTaskHandler::new()
        .run(&invocation, &ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, HandlerError::Spawn { .. }));
}
