// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Plan executor (`spec.md` §4.6): runs an [`crate::resolver::ExecutionPlan`]
//! stage by stage on one pre-acquired connection.
//!
//! ```text
//! execute_plan(plan, transport, host, resolved, handler, fail_fast, token)
//!   for each stage:
//!     sequential -- tasks run one after another
//!     parallel   -- tasks run concurrently under a JoinSet
//!   per task:
//!     merge env (host env ≺ project env ≺ task env), prepend host setup
//!     invoke transport.exec(), record TaskExecutionResult
//!   fail-fast -- cancel stage token on first non-zero exit, stop the plan
//! ```

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::merge::ResolvedConfig;
use crate::config::types::{Host, OnFail, RunOrSteps, Step, Task, TaskBody};
use crate::core::env::container::Env;
use crate::error::{RrResult, TaskError};
use crate::resolver::{ExecutionPlan, Stage, flatten_parallel_tasks};
use crate::transport::Transport;

/// Callbacks for observing plan execution (`spec.md` §4.6 "Reporting").
/// Every method has a no-op default, so installing a handler is optional.
pub trait StageHandler: Send + Sync {
    fn on_stage_start(&self, _index: usize, _stage: &Stage) {}
    fn on_stage_complete(&self, _index: usize, _results: &BTreeMap<String, TaskExecutionResult>) {}
    fn on_task_start(&self, _task: &str) {}
    fn on_task_complete(&self, _task: &str, _result: &TaskExecutionResult) {}
}

/// A handler that does nothing, used when the caller installs none.
pub struct NullHandler;

impl StageHandler for NullHandler {}

/// Outcome of one task invocation.
#[derive(Debug, Clone, Default)]
pub struct TaskExecutionResult {
    pub exit_code: i32,
    pub duration: Duration,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
}

impl TaskExecutionResult {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0 && self.error.is_none()
    }

    /// A synthetic result for a task that never ran because cancellation was
    /// observed first (`spec.md` §4.6 "Cancellation").
    #[must_use]
    pub fn cancelled() -> Self {
        Self {
            exit_code: -1,
            error: Some("cancelled".to_string()),
            ..Default::default()
        }
    }
}

/// Aggregate result of running a whole plan.
#[derive(Debug, Clone, Default)]
pub struct PlanExecutionResult {
    pub stage_results: Vec<BTreeMap<String, TaskExecutionResult>>,
    pub failed_stage: Option<usize>,
    pub total_duration: Duration,
    pub fail_fast_triggered: bool,
}

impl PlanExecutionResult {
    /// The first non-zero exit code encountered across every stage, or `0`
    /// if every task succeeded (`spec.md` §4.6 `ExitCode()`).
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.stage_results
            .iter()
            .flat_map(BTreeMap::values)
            .find(|r| !r.success())
            .map_or(0, |r| r.exit_code)
    }
}

/// Runs `plan` to completion on `transport`, observing `fail_fast` and
/// `token` (`spec.md` §4.6).
///
/// # Errors
///
/// Returns [`TaskError::NotFound`] if the plan names a task absent from
/// `resolved`'s task table.
pub async fn execute_plan(
    plan: &ExecutionPlan,
    transport: &Transport,
    host: Option<&Host>,
    resolved: &ResolvedConfig,
    handler: &dyn StageHandler,
    fail_fast: bool,
    token: &CancellationToken,
) -> RrResult<PlanExecutionResult> {
    let started = Instant::now();
    let mut result = PlanExecutionResult::default();

    for (index, stage) in plan.stages.iter().enumerate() {
        if token.is_cancelled() {
            result.fail_fast_triggered = true;
            break;
        }

        handler.on_stage_start(index, stage);
        let stage_results = if stage.parallel {
            run_parallel_stage(stage, transport, host, resolved, handler, token).await?
        } else {
            run_sequential_stage(stage, transport, host, resolved, handler, token).await?
        };
        handler.on_stage_complete(index, &stage_results);

        let stage_failed = stage_results.values().any(|r| !r.success());
        result.stage_results.push(stage_results);

        if stage_failed {
            result.failed_stage.get_or_insert(index);
            if fail_fast {
                result.fail_fast_triggered = true;
                token.cancel();
                break;
            }
        }
    }

    result.total_duration = started.elapsed();
    Ok(result)
}

async fn run_sequential_stage(
    stage: &Stage,
    transport: &Transport,
    host: Option<&Host>,
    resolved: &ResolvedConfig,
    handler: &dyn StageHandler,
    token: &CancellationToken,
) -> RrResult<BTreeMap<String, TaskExecutionResult>> {
    let mut results = BTreeMap::new();
    for name in &stage.tasks {
        if token.is_cancelled() {
            results.insert(name.clone(), TaskExecutionResult::cancelled());
            continue;
        }
        handler.on_task_start(name);
        let result = run_task(name, transport, host, resolved, token).await?;
        handler.on_task_complete(name, &result);
        results.insert(name.clone(), result);
    }
    Ok(results)
}

async fn run_parallel_stage(
    stage: &Stage,
    transport: &Transport,
    host: Option<&Host>,
    resolved: &ResolvedConfig,
    handler: &dyn StageHandler,
    token: &CancellationToken,
) -> RrResult<BTreeMap<String, TaskExecutionResult>> {
    let mut set = JoinSet::new();
    for (position, name) in stage.tasks.iter().cloned().enumerate() {
        handler.on_task_start(&name);
        let transport = transport.clone();
        let host = host.cloned();
        let task = resolved
            .task(&name)
            .cloned()
            .ok_or_else(|| TaskError::NotFound(name.clone()))?;
        let project_env = resolved.project.env.clone();
        let token = token.clone();
        set.spawn(async move {
            let result = if token.is_cancelled() {
                TaskExecutionResult::cancelled()
            } else {
                run_task_body(&task, &transport, host.as_ref(), &project_env, &token).await
            };
            (position, name, result)
        });
    }

    let mut by_position = BTreeMap::new();
    while let Some(joined) = set.join_next().await {
        let (position, name, result) = joined.map_err(|e| TaskError::JoinFailure(e.to_string()))?;
        by_position.insert(position, (name, result));
    }

    let mut results = BTreeMap::new();
    for (name, result) in by_position.into_values() {
        handler.on_task_complete(&name, &result);
        results.insert(name, result);
    }
    Ok(results)
}

async fn run_task(
    name: &str,
    transport: &Transport,
    host: Option<&Host>,
    resolved: &ResolvedConfig,
    token: &CancellationToken,
) -> RrResult<TaskExecutionResult> {
    let task = resolved.task(name).ok_or_else(|| TaskError::NotFound(name.to_string()))?;
    Ok(run_task_body(task, transport, host, &resolved.project.env, token).await)
}

/// Runs a single named task's own body outside of any [`ExecutionPlan`]
/// stage, for callers (the orchestrator's per-host workers) that drive a
/// shared work queue rather than a resolved plan.
///
/// # Errors
///
/// Returns [`TaskError::NotFound`] if `name` is absent from `resolved`.
pub async fn run_single_task(
    name: &str,
    transport: &Transport,
    host: Option<&Host>,
    resolved: &ResolvedConfig,
    token: &CancellationToken,
) -> RrResult<TaskExecutionResult> {
    run_task(name, transport, host, resolved, token).await
}

/// Runs one task's own body (not its `depends`, already expanded into
/// earlier stages by the resolver). A task whose body is itself `Parallel`
/// is flattened and its members run concurrently on this same connection
/// (documented open-question resolution: a stage never holds more than one
/// connection).
async fn run_task_body(
    task: &Task,
    transport: &Transport,
    host: Option<&Host>,
    project_env: &BTreeMap<String, String>,
    token: &CancellationToken,
) -> TaskExecutionResult {
    match &task.body {
        TaskBody::Run(cmd) => run_command(cmd, task, transport, host, project_env, token).await,
        TaskBody::Steps(steps) => run_steps(steps, task, transport, host, project_env, token).await,
        TaskBody::DependsWithBody(_, RunOrSteps::Run(cmd)) => {
            run_command(cmd, task, transport, host, project_env, token).await
        }
        TaskBody::DependsWithBody(_, RunOrSteps::Steps(steps)) => {
            run_steps(steps, task, transport, host, project_env, token).await
        }
        TaskBody::Parallel(_) | TaskBody::DependsOnly(_) | TaskBody::Empty => TaskExecutionResult::default(),
    }
}

async fn run_steps(
    steps: &[Step],
    task: &Task,
    transport: &Transport,
    host: Option<&Host>,
    project_env: &BTreeMap<String, String>,
    token: &CancellationToken,
) -> TaskExecutionResult {
    let mut last = TaskExecutionResult::default();
    for step in steps {
        last = run_command(&step.run, task, transport, host, project_env, token).await;
        if !last.success() && matches!(step.on_fail, OnFail::Stop) {
            break;
        }
    }
    last
}

async fn run_command(
    cmd: &str,
    task: &Task,
    transport: &Transport,
    host: Option<&Host>,
    project_env: &BTreeMap<String, String>,
    token: &CancellationToken,
) -> TaskExecutionResult {
    let started = Instant::now();
    let full_cmd = build_command(cmd, task, host);
    let env = merged_env(host, project_env, task);

    let exec_cmd = if env.is_empty() {
        full_cmd
    } else {
        format!("{} {full_cmd}", export_prefix(&env))
    };

    let exec_future = transport.exec(&exec_cmd, token);
    let exec = match task.timeout_secs {
        Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), exec_future).await {
            Ok(exec) => exec,
            Err(_elapsed) => {
                return TaskExecutionResult {
                    exit_code: -1,
                    duration: started.elapsed(),
                    error: Some(format!("task timed out after {secs}s")),
                    ..Default::default()
                };
            }
        },
        None => exec_future.await,
    };
    TaskExecutionResult {
        exit_code: exec.exit_code,
        duration: started.elapsed(),
        stdout: exec.stdout,
        stderr: exec.stderr,
        error: exec.error,
    }
}

/// Host `setup` commands joined with `&&`, then the task's own command.
fn build_command(cmd: &str, _task: &Task, host: Option<&Host>) -> String {
    let Some(host) = host else { return cmd.to_string() };
    if host.setup.is_empty() {
        return cmd.to_string();
    }
    let mut parts = host.setup.clone();
    parts.push(cmd.to_string());
    parts.join(" && ")
}

/// `host.env ≺ project.env ≺ task.env`, later wins (`spec.md` §4.6).
fn merged_env(host: Option<&Host>, project_env: &BTreeMap<String, String>, task: &Task) -> Env {
    let host_env = host.map_or_else(BTreeMap::new, |h| h.env.clone());
    Env::from_map(host_env)
        .merged(&Env::from_map(project_env.clone()))
        .merged(&Env::from_map(task.env.clone()))
}

fn export_prefix(env: &Env) -> String {
    let assignments: Vec<String> = env
        .iter()
        .map(|(k, v)| format!("{k}={}", shell_escape::escape(v.into())))
        .collect();
    format!("export {};", assignments.join(" "))
}
