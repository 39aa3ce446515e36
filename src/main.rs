// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Entry point: parses the CLI, loads the resolved configuration, and
//! dispatches to the library subsystems (`SPEC_FULL.md` §9 "CLI").
//!
//! ```text
//! cli::parse() --> logging --> load config --> dispatch
//!   run   -- resolver + executor (single host) or orchestrator (parallel root)
//!   exec  -- one ad hoc command on the selected host
//!   sync  -- copy_dir only
//!   tasks -- list configured tasks
//!   host status|unlock -- prober / lock::force_release
//!   clean -- clean::discover [+ clean::remove --apply]
//!   status, version -- introspection
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use mimalloc::MiMalloc;
use tokio_util::sync::CancellationToken;

use rr::cli::{self, CleanArgs, Command, ExecArgs, HostCommand, HostSelectArgs, RunArgs};
use rr::config::merge::ResolvedConfig;
use rr::config::types::TaskBody;
use rr::error::RrError;
use rr::executor::NullHandler;
use rr::host::selector::Selector;
use rr::logging::{LogConfig, LogLevel, init_logging};
use rr::resolver::ResolveOptions;
use rr::{clean, config, executor, lock, orchestrator, resolver};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::parse();

    let log_config = build_log_config(cli.log_level, cli.log_file.clone());
    let _log_guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            return ExitCode::from(70);
        }
    };

    match dispatch(cli.command).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn build_log_config(level: Option<u8>, log_file: Option<String>) -> LogConfig {
    let console_level = level.and_then(|l| LogLevel::new(l).ok()).unwrap_or_default();
    LogConfig::builder()
        .with_console_level(console_level)
        .maybe_with_log_file(log_file)
        .build()
}

/// Exit-code semantics (`spec.md` §6): the first non-zero task exit,
/// or a distinct code for config errors vs. lock-held vs. transport errors.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<RrError>() {
        Some(RrError::Config(_)) => 2,
        Some(RrError::Lock(_)) => 3,
        Some(RrError::Transport(_) | RrError::Probe(_)) => 4,
        Some(RrError::DangerousPath(_)) => 5,
        Some(RrError::Cancelled) => 130,
        Some(RrError::Task(task_err)) => match task_err.as_ref() {
            rr::error::TaskError::ExecutionFailed { code, .. } if *code != 0 => {
                u8::try_from(*code).unwrap_or(1)
            }
            _ => 1,
        },
        _ => 1,
    }
}

async fn dispatch(command: Command) -> rr::error::Result<u8> {
    match command {
        Command::Version => {
            println!("rr {}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
        Command::Status => cmd_status(),
        Command::Tasks => cmd_tasks(),
        Command::Run(args) => cmd_run(args).await,
        Command::Exec(args) => cmd_exec(args).await,
        Command::Sync(args) => cmd_sync(args).await,
        Command::Host { command } => cmd_host(command).await,
        Command::Clean(args) => cmd_clean(args).await,
        Command::Init | Command::Setup | Command::Monitor | Command::Doctor | Command::Completion | Command::Update => {
            eprintln!("not implemented in this build: this verb is an external collaborator out of this crate's scope");
            Ok(64)
        }
    }
}

fn cwd() -> std::path::PathBuf {
    std::env::current_dir().unwrap_or_default()
}

fn load() -> rr::error::Result<ResolvedConfig> {
    config::load(&cwd())
}

fn cmd_status() -> rr::error::Result<u8> {
    let resolved = load()?;
    for line in config::format_options(&resolved) {
        println!("{line}");
    }
    Ok(0)
}

fn cmd_tasks() -> rr::error::Result<u8> {
    let resolved = load()?;
    for (name, task) in resolved.tasks() {
        if task.description.is_empty() {
            println!("{name}");
        } else {
            println!("{name:<24} {}", task.description);
        }
    }
    Ok(0)
}

async fn cmd_run(args: RunArgs) -> rr::error::Result<u8> {
    let resolved = Arc::new(load()?);
    let task = resolved
        .task(&args.task)
        .ok_or_else(|| rr::error::TaskError::NotFound(args.task.clone()))?
        .clone();
    let token = CancellationToken::new();
    let fail_fast = task.fail_fast || args.fail_fast;

    if matches!(task.body, TaskBody::Parallel(_)) {
        let names = resolver::flatten_parallel_tasks(resolved.tasks(), &args.task)?;
        let selector = Selector::new(Arc::clone(&resolved));
        let opts = orchestrator::OrchestratorOptions {
            fail_fast,
            max_parallel: args.max_parallel.or(task.max_parallel),
        };
        let project_root = cwd();
        let result = orchestrator::run(&names, &selector, &resolved, &project_root, &opts, &token).await?;
        selector.teardown().await;
        print_orchestrator_result(&result);
        return Ok(exit_from_flag(result.failed_count > 0));
    }

    let plan = resolver::resolve(
        resolved.tasks(),
        &args.task,
        &ResolveOptions {
            skip_deps: args.skip_deps,
            from: args.from.clone(),
        },
    )?;

    let selector = Selector::new(Arc::clone(&resolved));
    let host_name = selector.resolve_host(args.host.as_deref())?;

    if host_name.is_empty() {
        let transport = rr::transport::Transport::Local(rr::transport::local::LocalTransport::new("sh -c"));
        let result = executor::execute_plan(&plan, &transport, None, &resolved, &NullHandler, fail_fast, &token).await?;
        print_plan_result(&plan, &result);
        return Ok(exit_from_flag(result.failed_stage.is_some()));
    }

    let transport = selector.connection(&host_name).await?;
    let host = resolved.host(&host_name).cloned();
    let project_name = rr::config::expand::resolve_project(&cwd());

    transport
        .copy_dir(&cwd(), host.as_ref().map_or("", |h| h.dir.as_str()), &resolved.project.sync)
        .await?;

    let guard = lock::acquire(Arc::clone(&transport), &resolved.project.lock, &host_name, &project_name, &token).await?;
    let result = executor::execute_plan(&plan, &transport, host.as_ref(), &resolved, &NullHandler, fail_fast, &token).await;
    let release = guard.release().await;
    selector.teardown().await;
    release?;
    let result = result?;

    print_plan_result(&plan, &result);
    Ok(exit_from_flag(result.failed_stage.is_some()))
}

async fn cmd_exec(args: ExecArgs) -> rr::error::Result<u8> {
    let resolved = Arc::new(load()?);
    let selector = Selector::new(Arc::clone(&resolved));
    let host_name = selector.resolve_host(args.host.as_deref())?;
    let token = CancellationToken::new();

    let transport = if host_name.is_empty() {
        Arc::new(rr::transport::Transport::Local(rr::transport::local::LocalTransport::new("sh -c")))
    } else {
        selector.connection(&host_name).await?
    };

    let result = transport.exec(&args.command, &token).await;
    print!("{}", result.stdout);
    eprint!("{}", result.stderr);
    selector.teardown().await;
    Ok(u8::try_from(result.exit_code.clamp(0, 255)).unwrap_or(1))
}

async fn cmd_sync(args: HostSelectArgs) -> rr::error::Result<u8> {
    let resolved = Arc::new(load()?);
    let selector = Selector::new(Arc::clone(&resolved));
    let host_name = selector.resolve_host(args.host.as_deref())?;
    if host_name.is_empty() {
        eprintln!("no remote host selected; nothing to sync");
        return Ok(0);
    }
    let transport = selector.connection(&host_name).await?;
    let host = resolved.host(&host_name).ok_or_else(|| rr::error::TaskError::NotFound(host_name.clone()))?;
    transport.copy_dir(&cwd(), &host.dir, &resolved.project.sync).await?;
    selector.teardown().await;
    println!("synced to {host_name}:{}", host.dir);
    Ok(0)
}

async fn cmd_host(command: HostCommand) -> rr::error::Result<u8> {
    let resolved = Arc::new(load()?);
    match command {
        HostCommand::Status => {
            let selector = Selector::new(Arc::clone(&resolved));
            for info in selector.host_info() {
                println!("{} ({})", info.name, info.dir);
                let Some(host) = resolved.host(&info.name) else { continue };
                let timeout = std::time::Duration::from_secs(resolved.global.defaults.probe_timeout_secs);
                let results = rr::host::prober::probe_aliases(&host.aliases, host.shell_or_default(), timeout, |alias, shell| {
                    rr::transport::Transport::Ssh(rr::transport::ssh::SshTransport::new(alias, shell))
                })
                .await;
                for probe in results {
                    match probe.outcome {
                        rr::host::prober::ProbeOutcome::Success { latency } => {
                            println!("  {} ok ({latency:?})", probe.alias);
                        }
                        rr::host::prober::ProbeOutcome::Failure { kind, message } => {
                            println!("  {} {kind} ({message})", probe.alias);
                        }
                    }
                }
            }
            Ok(0)
        }
        HostCommand::Unlock { host, project } => {
            let selector = Selector::new(Arc::clone(&resolved));
            let transport = selector.connection(&host).await?;
            let project_name = project.unwrap_or_else(|| rr::config::expand::resolve_project(&cwd()));
            let token = CancellationToken::new();
            lock::force_release(&transport, &resolved.project.lock, &host, &project_name, &token).await?;
            selector.teardown().await;
            println!("lock released for {project_name}@{host}");
            Ok(0)
        }
    }
}

async fn cmd_clean(args: CleanArgs) -> rr::error::Result<u8> {
    let resolved = Arc::new(load()?);
    let selector = Selector::new(Arc::clone(&resolved));
    let host_name = selector.resolve_host(args.host.as_deref())?;
    if host_name.is_empty() {
        eprintln!("no remote host selected; nothing to clean");
        return Ok(0);
    }
    let transport = selector.connection(&host_name).await?;
    let host = resolved.host(&host_name).ok_or_else(|| rr::error::TaskError::NotFound(host_name.clone()))?;

    let cwd = cwd();
    let vars = rr::config::expand::Variables::resolve(&cwd);
    let active: std::collections::BTreeSet<String> = if args.active_branches.is_empty() {
        std::collections::BTreeSet::from([vars.branch.clone()])
    } else {
        args.active_branches.iter().cloned().collect()
    };

    let token = CancellationToken::new();
    let Some(stale) = clean::discover(&transport, &host.dir, &vars, &active, &token).await? else {
        println!("host directory template has no ${{BRANCH}}; nothing to scan");
        return Ok(0);
    };

    if stale.is_empty() {
        println!("no stale directories found");
        selector.teardown().await;
        return Ok(0);
    }

    for dir in &stale {
        let size = dir.size_bytes.map_or_else(String::new, |b| format!(" ({} KiB)", b / 1024));
        println!("{}  branch={}{size}", dir.path, dir.branch);
    }

    if !args.apply {
        println!("(dry run; pass --apply to remove)");
        selector.teardown().await;
        return Ok(0);
    }

    let (glob, _had_branch) = rr::config::expand::expand_glob(&host.dir, &vars);
    let prefix = glob.strip_suffix('*');

    let (removed, errors) = clean::remove(&transport, &stale, prefix, &token).await;
    for path in &removed {
        println!("removed {path}");
    }
    for (path, err) in &errors {
        eprintln!("failed to remove {path}: {err}");
    }
    selector.teardown().await;
    Ok(exit_from_flag(!errors.is_empty()))
}

fn exit_from_flag(failed: bool) -> u8 {
    u8::from(failed)
}

fn print_plan_result(plan: &resolver::ExecutionPlan, result: &executor::PlanExecutionResult) {
    println!("plan: {plan}");
    for (index, stage) in result.stage_results.iter().enumerate() {
        for (name, task_result) in stage {
            println!(
                "  [{index}] {name}: exit={} duration={:?}{}",
                task_result.exit_code,
                task_result.duration,
                task_result.error.as_deref().map(|e| format!(" error={e}")).unwrap_or_default(),
            );
        }
    }
    if let Some(stage) = result.failed_stage {
        println!("failed at stage {stage} (fail_fast={})", result.fail_fast_triggered);
    }
}

fn print_orchestrator_result(result: &orchestrator::OrchestratorResult) {
    for item in &result.results {
        println!(
            "[{}] {} @ {}: exit={}{}",
            item.index,
            item.task_name,
            item.host,
            item.result.exit_code,
            item.result.error.as_deref().map(|e| format!(" error={e}")).unwrap_or_default(),
        );
    }
    println!(
        "{} failed, fail_fast_triggered={}, total={:?}",
        result.failed_count, result.fail_fast_triggered, result.total_duration
    );
}
