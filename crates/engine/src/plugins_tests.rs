// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::JobHarness;
use relay_core::RecordId;

fn staging_option(pattern: &str) -> BTreeMap<String, JobOption> {
    let option = JobOption {
        id: STAGING_OPTION_ID.to_string(),
        data: [("pattern".to_string(), pattern.to_string())].into_iter().collect(),
    };
    [(STAGING_OPTION_ID.to_string(), option)].into_iter().collect()
}

#[test]
fn build_system_gets_workspace_and_staging_plugins() {
    let set = registry("Build", &staging_option("**/*.dll"));

    let before: Vec<&str> = set.before.iter().map(|p| p.name()).collect();
    let after: Vec<&str> = set.after.iter().map(|p| p.name()).collect();
    assert_eq!(before, vec!["prepareWorkspace"]);
    assert_eq!(after, vec!["copyToStagingFolder"]);
}

#[test]
fn staging_plugin_needs_its_option() {
    let set = registry("build", &BTreeMap::new());

    assert_eq!(set.before.len(), 1);
    assert!(set.after.is_empty());
}

#[test]
fn unknown_system_has_no_plugins() {
    let set = registry("release", &staging_option("*"));

    assert!(set.before.is_empty());
    assert!(set.after.is_empty());
}

#[tokio::test]
async fn prepare_workspace_lays_out_directories() {
    let h = JobHarness::new();
    let ctx = h.job_context().for_plugin(&RecordId::new("p1"));

    PrepareWorkspace.before_job(&ctx).await.unwrap();

    let root = h.dir.path();
    for dir in ["s", "a", "b"] {
        assert!(root.join(dir).is_dir());
    }
    let sources = root.join("s");
    assert_eq!(
        h.state.variable(names::BUILD_SOURCES_DIRECTORY),
        Some(sources.to_string_lossy().into_owned())
    );
    assert_eq!(
        h.state.variable(names::BUILD_STAGING_DIRECTORY),
        Some(root.join("a").to_string_lossy().into_owned())
    );
    assert_eq!(
        h.state.variable(names::BUILD_BINARIES_DIRECTORY),
        Some(root.join("b").to_string_lossy().into_owned())
    );
    assert_eq!(h.state.working_directory(), sources);
    h.drain().await;
}

#[tokio::test]
async fn copy_to_staging_preserves_relative_paths() {
    let h = JobHarness::new();
    let ctx = h.job_context().for_plugin(&RecordId::new("p1"));
    PrepareWorkspace.before_job(&ctx).await.unwrap();

    let sources = h.dir.path().join("s");
    fs::create_dir_all(sources.join("bin/release")).unwrap();
    fs::write(sources.join("bin/release/app.dll"), "dll").unwrap();
    fs::write(sources.join("bin/release/app.pdb"), "pdb").unwrap();
    fs::write(sources.join("readme.md"), "docs").unwrap();

    let plugin = CopyToStagingFolder {
        pattern: "**/*.dll; readme.md".to_string(),
    };
    plugin.after_job(&ctx).await.unwrap();

    let staging = h.dir.path().join("a");
    assert_eq!(
        fs::read_to_string(staging.join("bin/release/app.dll")).unwrap(),
        "dll"
    );
    assert!(staging.join("readme.md").exists());
    assert!(!staging.join("bin/release/app.pdb").exists());
    h.drain().await;
}

#[tokio::test]
async fn copy_to_staging_expands_variables_in_pattern() {
    let h = JobHarness::new();
    let ctx = h.job_context();
    PrepareWorkspace.before_job(&ctx).await.unwrap();
    h.state.set_variable("ext", "txt", false);
    fs::write(h.dir.path().join("s/out.txt"), "x").unwrap();

    CopyToStagingFolder {
        pattern: "*.$(ext)".to_string(),
    }
    .after_job(&ctx)
    .await
    .unwrap();

    assert!(h.dir.path().join("a/out.txt").exists());
    h.drain().await;
}

#[tokio::test]
async fn copy_to_staging_runs_only_after_success() {
    let h = JobHarness::new();
    let ctx = h.job_context();
    let plugin = CopyToStagingFolder {
        pattern: "*".to_string(),
    };

    assert!(plugin.should_run(true, &ctx));
    assert!(!plugin.should_run(false, &ctx));
    h.drain().await;
}

#[tokio::test]
async fn copy_to_staging_without_workspace_fails() {
    let h = JobHarness::new();
    let ctx = h.job_context();

    let err = CopyToStagingFolder {
        pattern: "*".to_string(),
    }
    .after_job(&ctx)
    .await
    .unwrap_err();

    assert!(matches!(err, EngineError::Plugin { .. }));
    h.drain().await;
}
