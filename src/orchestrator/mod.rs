// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Parallel orchestrator (`spec.md` §4.7): used when the root task is itself
//! a `parallel` group spanning multiple hosts.
//!
//! ```text
//! run(task_names, selector, resolved, local_root, opts, token)
//!   push every task name onto a shared flume queue, then close it
//!   one worker per eligible host (work-stealing: faster hosts drain more)
//!   worker loop:
//!     pull -> check cancellation -> check fail-fast flag
//!       -> sync host once -> acquire lock -> run task -> publish result
//!       -> on failure with fail_fast: set flag, cancel token
//!   no hosts + local fallback -- single sequential local worker
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::merge::ResolvedConfig;
use crate::error::RrResult;
use crate::executor::{TaskExecutionResult, run_single_task};
use crate::host::selector::Selector;
use crate::lock;
use crate::transport::Transport;

/// One queued unit of work: a task name at a fixed position, preserving
/// duplicate entries as distinct items (`spec.md` §4.7 "flake-detection").
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub index: usize,
    pub task_name: String,
}

/// The outcome of running one [`WorkItem`] on a particular host.
#[derive(Debug, Clone)]
pub struct WorkResult {
    pub index: usize,
    pub task_name: String,
    pub host: String,
    pub result: TaskExecutionResult,
}

/// Aggregate outcome of an orchestrated run.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorResult {
    pub results: Vec<WorkResult>,
    pub failed_count: usize,
    pub total_duration: Duration,
    pub fail_fast_triggered: bool,
}

/// Options controlling one orchestrated run.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub fail_fast: bool,
    pub max_parallel: Option<usize>,
}

/// Runs every name in `task_names` across the eligible hosts in `selector`,
/// falling back to a single sequential local worker when no hosts are
/// configured and local fallback is enabled.
///
/// # Errors
///
/// Propagates the first connection or lock error that isn't swallowed into a
/// per-task [`TaskExecutionResult`].
pub async fn run(
    task_names: &[String],
    selector: &Selector,
    resolved: &ResolvedConfig,
    local_root: &Path,
    opts: &OrchestratorOptions,
    token: &CancellationToken,
) -> RrResult<OrchestratorResult> {
    let started = Instant::now();
    let hosts = selector.ordered_host_names();

    if hosts.is_empty() {
        if !resolved.local_fallback() {
            return Err(crate::error::TaskError::NoHosts.into());
        }
        return run_local_fallback(task_names, resolved, token, started).await;
    }

    let workers: Vec<String> = match opts.max_parallel {
        Some(limit) => hosts.into_iter().take(limit.max(1)).collect(),
        None => hosts,
    };

    let (tx, rx) = flume::unbounded::<WorkItem>();
    for (index, task_name) in task_names.iter().cloned().enumerate() {
        let _ = tx.send(WorkItem { index, task_name });
    }
    drop(tx);

    let fail_fast_flag = Arc::new(AtomicBool::new(false));
    let synced = Arc::new(Mutex::new(BTreeSet::<String>::new()));
    let results = Arc::new(Mutex::new(Vec::<WorkResult>::new()));

    let mut set = JoinSet::new();
    for host_name in workers {
        let rx = rx.clone();
        let fail_fast_flag = Arc::clone(&fail_fast_flag);
        let synced = Arc::clone(&synced);
        let results = Arc::clone(&results);
        let token = token.clone();
        let local_root = local_root.to_path_buf();
        let resolved = resolved.clone();
        let fail_fast = opts.fail_fast;

        set.spawn(async move {
            run_host_worker(host_name, rx, &resolved, &local_root, fail_fast, &fail_fast_flag, &synced, &results, &token).await;
        });
    }
    while set.join_next().await.is_some() {}

    let results = results.lock().await.clone();
    let failed_count = results.iter().filter(|r| !r.result.success()).count();

    Ok(OrchestratorResult {
        failed_count,
        fail_fast_triggered: fail_fast_flag.load(Ordering::SeqCst),
        total_duration: started.elapsed(),
        results,
    })
}

#[allow(clippy::too_many_arguments)]
async fn run_host_worker(
    host_name: String,
    rx: flume::Receiver<WorkItem>,
    resolved: &ResolvedConfig,
    local_root: &Path,
    fail_fast: bool,
    fail_fast_flag: &Arc<AtomicBool>,
    synced: &Arc<Mutex<BTreeSet<String>>>,
    results: &Arc<Mutex<Vec<WorkResult>>>,
    token: &CancellationToken,
) {
    let Some(host) = resolved.host(&host_name) else {
        warn!(host = %host_name, "orchestrator worker started for an unconfigured host");
        return;
    };

    // This worker owns its own connection rather than sharing the
    // `Selector`'s cache, so two workers never contend on the same
    // `tokio::sync::Mutex` for the hot path of every `Exec` call.
    let transport = match crate::host::prober::probe_aliases(&host.aliases, host.shell_or_default(), Duration::from_secs(resolved.global.defaults.probe_timeout_secs), |alias, shell| {
        Transport::Ssh(crate::transport::ssh::SshTransport::new(alias, shell))
    })
    .await
    .into_iter()
    .find(|r| r.outcome.is_success())
    {
        Some(probe) => Transport::Ssh(crate::transport::ssh::SshTransport::new(probe.alias, host.shell_or_default().to_string())),
        None => {
            warn!(host = %host_name, "every alias failed, worker exiting without draining its share of the queue");
            return;
        }
    };

    while let Ok(item) = rx.recv_async().await {
        if token.is_cancelled() || fail_fast_flag.load(Ordering::SeqCst) {
            break;
        }

        if !ensure_synced(&host_name, &transport, local_root, host, resolved, synced).await {
            let message = format!("sync failed for host {host_name}");
            record_failure(results, &host_name, item, fail_fast, fail_fast_flag, token, message).await;
            continue;
        }

        let project_name = crate::config::expand::resolve_project(local_root);
        let guard = match lock::acquire(Arc::new(transport.clone()), &resolved.project.lock, &host_name, &project_name, token).await {
            Ok(guard) => guard,
            Err(err) => {
                warn!(host = %host_name, task = %item.task_name, error = %err, "lock acquisition failed");
                record_failure(results, &host_name, item, fail_fast, fail_fast_flag, token, err.to_string()).await;
                continue;
            }
        };

        let result = run_single_task(&item.task_name, &transport, Some(host), resolved, token).await;
        let _ = guard.release().await;

        let exec_result = result.unwrap_or_else(|err| TaskExecutionResult {
            exit_code: -1,
            error: Some(err.to_string()),
            ..Default::default()
        });
        let failed = !exec_result.success();
        info!(host = %host_name, task = %item.task_name, exit_code = exec_result.exit_code, "task finished");
        results.lock().await.push(WorkResult {
            index: item.index,
            task_name: item.task_name,
            host: host_name.clone(),
            result: exec_result,
        });

        if failed && fail_fast {
            fail_fast_flag.store(true, Ordering::SeqCst);
            token.cancel();
            break;
        }
    }
}

async fn ensure_synced(
    host_name: &str,
    transport: &Transport,
    local_root: &Path,
    host: &crate::config::types::Host,
    resolved: &ResolvedConfig,
    synced: &Arc<Mutex<BTreeSet<String>>>,
) -> bool {
    {
        let guard = synced.lock().await;
        if guard.contains(host_name) {
            return true;
        }
    }
    let mut guard = synced.lock().await;
    if guard.contains(host_name) {
        return true;
    }
    match transport.copy_dir(local_root, &host.dir, &resolved.project.sync).await {
        Ok(()) => {
            guard.insert(host_name.to_string());
            true
        }
        Err(err) => {
            warn!(host = %host_name, error = %err, "sync failed, worker exiting");
            false
        }
    }
}

async fn record_failure(
    results: &Arc<Mutex<Vec<WorkResult>>>,
    host_name: &str,
    item: WorkItem,
    fail_fast: bool,
    fail_fast_flag: &Arc<AtomicBool>,
    token: &CancellationToken,
    message: String,
) {
    results.lock().await.push(WorkResult {
        index: item.index,
        task_name: item.task_name,
        host: host_name.to_string(),
        result: TaskExecutionResult {
            exit_code: -1,
            error: Some(message),
            ..Default::default()
        },
    });
    if fail_fast {
        fail_fast_flag.store(true, Ordering::SeqCst);
        token.cancel();
    }
}

async fn run_local_fallback(
    task_names: &[String],
    resolved: &ResolvedConfig,
    token: &CancellationToken,
    started: Instant,
) -> RrResult<OrchestratorResult> {
    let transport = Transport::Local(crate::transport::local::LocalTransport::new("sh -c"));
    let mut results = Vec::new();
    for (index, name) in task_names.iter().cloned().enumerate() {
        if token.is_cancelled() {
            break;
        }
        let result = run_single_task(&name, &transport, None, resolved, token)
            .await
            .unwrap_or_else(|err| TaskExecutionResult {
                exit_code: -1,
                error: Some(err.to_string()),
                ..Default::default()
            });
        results.push(WorkResult {
            index,
            task_name: name,
            host: String::new(),
            result,
        });
    }
    let failed_count = results.iter().filter(|r| !r.result.success()).count();
    Ok(OrchestratorResult {
        failed_count,
        fail_fast_triggered: false,
        total_duration: started.elapsed(),
        results,
    })
}
