// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Command-line surface (`SPEC_FULL.md` §9 "CLI"). An external collaborator
//! per `spec.md` §1: this module only parses arguments into a typed
//! [`Command`] and defers every decision to the library subsystems in
//! [`crate::config`], [`crate::host`], [`crate::resolver`],
//! [`crate::executor`], [`crate::orchestrator`], [`crate::lock`], and
//! [`crate::clean`].

use clap::{Parser, Subcommand};

/// Run task graphs across a fleet of remote hosts over SSH.
#[derive(Debug, Parser)]
#[command(name = "rr", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Console log verbosity, 0 (silent) through 6 (dump).
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<u8>,

    /// Also write logs to this file, independent of `--log-level`.
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a named task, resolving its dependency chain first.
    Run(RunArgs),
    /// Execute one command ad hoc, bypassing task configuration.
    Exec(ExecArgs),
    /// Sync the local project tree to the selected host without running anything.
    Sync(HostSelectArgs),
    /// List every configured task.
    Tasks,
    /// Host fleet operations.
    Host {
        #[command(subcommand)]
        command: HostCommand,
    },
    /// Discover and optionally remove stale branch-suffixed remote directories.
    Clean(CleanArgs),
    /// Print the resolved configuration.
    Status,
    /// Print the rr version.
    Version,
    /// Reserved but out of scope (`spec.md` §1's external collaborators).
    Init,
    Setup,
    Monitor,
    Doctor,
    Completion,
    Update,
}

#[derive(Debug, Parser)]
pub struct HostSelectArgs {
    /// Restrict to this configured host instead of the default selection.
    #[arg(long)]
    pub host: Option<String>,
}

#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Task name to run.
    pub task: String,
    /// Restrict to this configured host instead of the default selection.
    #[arg(long)]
    pub host: Option<String>,
    /// Resume the plan starting at this task, dropping everything before it.
    #[arg(long)]
    pub from: Option<String>,
    /// Run only the named task's own body, skipping its `depends` chain.
    #[arg(long)]
    pub skip_deps: bool,
    /// Cancel remaining work in the current stage on the first failure.
    #[arg(long)]
    pub fail_fast: bool,
    /// Cap the number of host workers used for a `parallel` root task.
    #[arg(long)]
    pub max_parallel: Option<usize>,
}

#[derive(Debug, Parser)]
pub struct ExecArgs {
    /// Shell command to run on the selected host.
    pub command: String,
    #[arg(long)]
    pub host: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum HostCommand {
    /// Probe every configured host and print reachability/latency.
    Status,
    /// Force-release a held lock for a host/project pair.
    Unlock {
        host: String,
        #[arg(long)]
        project: Option<String>,
    },
}

#[derive(Debug, Parser)]
pub struct CleanArgs {
    /// Restrict to this configured host instead of the default selection.
    #[arg(long)]
    pub host: Option<String>,
    /// Branch names considered active (kept). Defaults to the current branch.
    #[arg(long = "active")]
    pub active_branches: Vec<String>,
    /// Actually remove stale directories instead of only listing them.
    #[arg(long)]
    pub apply: bool,
}

/// Parses `std::env::args()` into a [`Cli`].
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
