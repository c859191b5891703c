// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job orchestration: before-job plugins, the task list, after-job plugins.
//!
//! Phases advance through [`Phase::next`]. Each step runs in its own
//! child context, so it gets its own timeline record and log. Steps never
//! run concurrently, and the shared working directory is reset before each
//! task.

use std::collections::BTreeMap;
use std::path::PathBuf;

use relay_adapters::{HandlerKind, TaskHandler, TaskInvocation, TaskStore};
use relay_core::vars::names;
use relay_core::{IdGen, JobPayload, RecordId, TaskInstance, TaskResult, WorkerConfig};

use crate::context::ExecutionContext;
use crate::plugins::{self, AfterJobPlugin, BeforeJobPlugin, PluginSet};
use crate::task_manager;

/// Where a job run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Preparing,
    RunningBeforePlugins,
    RunningTasks,
    RunningAfterPlugins,
    Finished,
}

impl Phase {
    /// The phase after this one. `passed` is whether this phase succeeded;
    /// an abandoned job goes straight to `Finished`.
    pub fn next(self, passed: bool, abandoned: bool) -> Phase {
        if abandoned {
            return Phase::Finished;
        }
        match self {
            Phase::Preparing if passed => Phase::RunningBeforePlugins,
            Phase::RunningBeforePlugins if passed => Phase::RunningTasks,
            Phase::Preparing | Phase::RunningBeforePlugins | Phase::RunningTasks => {
                Phase::RunningAfterPlugins
            }
            Phase::RunningAfterPlugins | Phase::Finished => Phase::Finished,
        }
    }
}

/// A task ready to hand to a handler.
struct PreparedTask {
    instance: TaskInstance,
    kind: HandlerKind,
    script: PathBuf,
    inputs: BTreeMap<String, String>,
}

struct PluginStep<P: ?Sized> {
    record_id: RecordId,
    plugin: Box<P>,
}

/// Runs one job to a single result.
pub struct JobOrchestrator<S, H, G> {
    payload: JobPayload,
    config: WorkerConfig,
    store: S,
    handler: H,
    ids: G,
    plugins: PluginSet,
}

impl<S, H, G> JobOrchestrator<S, H, G>
where
    S: TaskStore,
    H: TaskHandler,
    G: IdGen,
{
    /// Plugins come from the registry for the payload's `system` variable.
    pub fn new(payload: JobPayload, config: WorkerConfig, store: S, handler: H, ids: G) -> Self {
        let system = payload
            .environment
            .variables
            .get(names::SYSTEM)
            .unwrap_or_default()
            .to_string();
        let plugins = plugins::registry(&system, &payload.environment.options);
        Self {
            payload,
            config,
            store,
            handler,
            ids,
            plugins,
        }
    }

    pub fn with_plugins(mut self, plugins: PluginSet) -> Self {
        self.plugins = plugins;
        self
    }

    /// Run the job in `ctx` (a job context) and return its result.
    ///
    /// The job record is left in progress; completing it is up to the caller.
    pub async fn run(self, ctx: &ExecutionContext) -> TaskResult {
        let Self {
            payload,
            config,
            store,
            handler,
            ids,
            plugins,
        } = self;

        set_standard_variables(ctx, &payload, &config);
        ctx.set_job_in_progress();

        let mut tasks: Vec<PreparedTask> = Vec::new();
        let before: Vec<PluginStep<dyn BeforeJobPlugin>> = plugins
            .before
            .into_iter()
            .map(|plugin| PluginStep {
                record_id: RecordId::new(ids.next()),
                plugin,
            })
            .collect();
        let after: Vec<PluginStep<dyn AfterJobPlugin>> = plugins
            .after
            .into_iter()
            .map(|plugin| PluginStep {
                record_id: RecordId::new(ids.next()),
                plugin,
            })
            .collect();

        let pending = before
            .iter()
            .map(|s| (&s.record_id, s.plugin.title()))
            .chain(payload.tasks.iter().map(|t| (&t.instance_id, t.title())))
            .chain(after.iter().map(|s| (&s.record_id, s.plugin.title())));
        for (order, (record_id, title)) in (1..).zip(pending) {
            ctx.register_pending(record_id, title, order);
        }

        let abandonment = ctx.feedback().map(|f| f.abandonment().clone());
        let abandoned = || abandonment.as_ref().is_some_and(|a| a.is_signalled());

        let mut result = TaskResult::Succeeded;
        let mut phase = Phase::Preparing;
        while phase != Phase::Finished {
            tracing::debug!(?phase, %result, "job phase");
            let passed = match phase {
                Phase::Preparing => match prepare(ctx, &store, &config, &payload.tasks).await {
                    Some(prepared) => {
                        tasks = prepared;
                        true
                    }
                    None => {
                        for step in &before {
                            skip(ctx.for_plugin(&step.record_id), step.plugin.title());
                        }
                        false
                    }
                },
                Phase::RunningBeforePlugins => {
                    let passed = run_before_plugins(ctx, &before, &abandoned).await;
                    for task in &mut tasks {
                        task.inputs = expand_inputs(ctx, &task.inputs);
                    }
                    passed
                }
                Phase::RunningTasks => run_tasks(ctx, &handler, &tasks, &mut result, &abandoned).await,
                Phase::RunningAfterPlugins => {
                    let succeeded = result.is_success();
                    run_after_plugins(ctx, &after, succeeded, &abandoned).await
                }
                Phase::Finished => true,
            };
            if !passed {
                result = TaskResult::Failed;
            }
            let next = phase.next(passed, abandoned());
            if next == Phase::RunningAfterPlugins && phase != Phase::RunningTasks {
                for task in &payload.tasks {
                    skip(ctx.for_task(&task.instance_id), task.title());
                }
            }
            phase = next;
        }

        if abandoned() {
            tracing::info!("job abandoned, stopping");
            return TaskResult::Abandoned;
        }
        tracing::info!(%result, "job finished");
        result
    }
}

/// Variables every job sees, set before anything runs.
fn set_standard_variables(ctx: &ExecutionContext, payload: &JobPayload, config: &WorkerConfig) {
    let work = config.work_folder.to_string_lossy();
    ctx.set_variable(names::AGENT_ROOT_DIRECTORY, &work, false);
    ctx.set_variable(names::AGENT_WORKING_DIRECTORY, &work, false);
    ctx.set_variable(names::AGENT_ID, &config.agent_id.to_string(), false);
    ctx.set_variable(names::AGENT_NAME, &config.agent_name, false);

    let collection = payload
        .environment
        .system_connection
        .as_ref()
        .map(|endpoint| endpoint.url.as_str())
        .filter(|url| !url.is_empty())
        .unwrap_or(&config.server_url);
    ctx.set_variable(names::SYSTEM_COLLECTION_URI, collection, false);

    if config.enable_access_token {
        if let Some(token) = payload.access_token() {
            ctx.set_variable(names::SYSTEM_ACCESS_TOKEN, token, true);
        }
    }
}

fn expand_inputs(
    ctx: &ExecutionContext,
    inputs: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let variables = ctx.variables();
    inputs
        .iter()
        .map(|(name, value)| (name.clone(), variables.expand(value)))
        .collect()
}

/// Download missing definitions and resolve each task's handler.
async fn prepare<S: TaskStore>(
    ctx: &ExecutionContext,
    store: &S,
    config: &WorkerConfig,
    tasks: &[TaskInstance],
) -> Option<Vec<PreparedTask>> {
    ctx.write_console_section("Preparing tasks");
    if let Err(e) = task_manager::ensure_tasks_exist(store, &config.work_folder, tasks).await {
        ctx.error(&e.to_string());
        return None;
    }
    let mut prepared = Vec::with_capacity(tasks.len());
    for task in tasks {
        match task_manager::prepare_task(&config.work_folder, task) {
            Ok((kind, script)) => {
                ctx.verbose(&format!("{} runs with {}", task.name, kind.name()));
                prepared.push(PreparedTask {
                    instance: task.clone(),
                    kind,
                    script,
                    inputs: expand_inputs(ctx, &task.inputs),
                });
            }
            Err(e) => {
                ctx.error(&e.to_string());
                return None;
            }
        }
    }
    Some(prepared)
}

async fn run_before_plugins(
    ctx: &ExecutionContext,
    steps: &[PluginStep<dyn BeforeJobPlugin>],
    abandoned: &impl Fn() -> bool,
) -> bool {
    for (i, step) in steps.iter().enumerate() {
        if abandoned() {
            return false;
        }
        let title = step.plugin.title();
        ctx.write_console_section(&format!("Running {}", title));
        let plugin_ctx = ctx.for_plugin(&step.record_id);
        plugin_ctx.set_task_started(title);
        let result = match step.plugin.before_job(&plugin_ctx).await {
            Ok(()) => TaskResult::Succeeded,
            Err(e) => {
                plugin_ctx.error(&e.to_string());
                TaskResult::Failed
            }
        };
        plugin_ctx.set_task_result(title, result);
        plugin_ctx.finish();
        if result == TaskResult::Failed {
            for rest in &steps[i + 1..] {
                skip(ctx.for_plugin(&rest.record_id), rest.plugin.title());
            }
            return false;
        }
    }
    true
}

/// Run tasks in order. Returns false when a task failed the job.
async fn run_tasks<H: TaskHandler>(
    ctx: &ExecutionContext,
    handler: &H,
    tasks: &[PreparedTask],
    job_result: &mut TaskResult,
    abandoned: &impl Fn() -> bool,
) -> bool {
    let base = ctx.working_directory().unwrap_or_default();
    for (i, task) in tasks.iter().enumerate() {
        if abandoned() {
            return true;
        }
        let instance = &task.instance;
        let title = instance.title();
        ctx.set_working_directory(base.clone());
        ctx.write_console_section(&format!("Running {}", title));
        let task_ctx = ctx.for_task(&instance.instance_id);

        if !instance.enabled {
            task_ctx.info("task is disabled");
            task_ctx.set_task_result(title, TaskResult::Skipped);
            task_ctx.finish();
            continue;
        }

        task_ctx.set_task_started(title);
        let invocation = TaskInvocation {
            task_name: instance.name.clone(),
            kind: task.kind,
            script: task.script.clone(),
            working_directory: base.clone(),
            inputs: task.inputs.clone(),
            variables: ctx.variables(),
        };
        let mut result = match handler.run(&invocation, &task_ctx).await {
            Ok(()) => task_ctx.result().unwrap_or(TaskResult::Succeeded),
            Err(e) => {
                task_ctx.error(&e.to_string());
                TaskResult::Failed
            }
        };
        if result == TaskResult::Failed && instance.continue_on_error {
            task_ctx.warning("task failed, continuing because continueOnError is set");
            result = TaskResult::SucceededWithIssues;
        }
        tracing::info!(task = %instance.name, %result, "task finished");
        task_ctx.set_task_result(title, result);
        task_ctx.finish();

        *job_result = job_result.merge(result);
        if result == TaskResult::Failed {
            for rest in &tasks[i + 1..] {
                skip(ctx.for_task(&rest.instance.instance_id), rest.instance.title());
            }
            return false;
        }
    }
    true
}

fn skip(step_ctx: ExecutionContext, title: &str) {
    step_ctx.set_task_result(title, TaskResult::Skipped);
}

/// Run the after-job plugins that opt in. A failure fails the job but the
/// remaining plugins still run.
async fn run_after_plugins(
    ctx: &ExecutionContext,
    steps: &[PluginStep<dyn AfterJobPlugin>],
    succeeded: bool,
    abandoned: &impl Fn() -> bool,
) -> bool {
    let mut passed = true;
    for step in steps {
        let title = step.plugin.title();
        let plugin_ctx = ctx.for_plugin(&step.record_id);
        if abandoned() || !step.plugin.should_run(succeeded, &plugin_ctx) {
            skip(plugin_ctx, title);
            continue;
        }
        ctx.write_console_section(&format!("Running {}", title));
        plugin_ctx.set_task_started(title);
        let result = match step.plugin.after_job(&plugin_ctx).await {
            Ok(()) => TaskResult::Succeeded,
            Err(e) => {
                plugin_ctx.error(&e.to_string());
                passed = false;
                TaskResult::Failed
            }
        };
        plugin_ctx.set_task_result(title, result);
        plugin_ctx.finish();
    }
    passed
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
