// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Configuration management for rr.
//!
//! # Configuration layers (`spec.md` §6)
//!
//! ```text
//! Priority (low → high)
//! 1. defaults (FleetDefaults / LockConfig / MonitorConfig / OutputConfig)
//! 2. global   <home>/.rr/config.yaml   (hosts, fleet defaults)
//! 3. project  .rr.yaml                 (tasks, host selection, lock/monitor overrides)
//! 4. RR_GLOBAL_* / RR_PROJECT_* env vars
//! 5. CLI overrides
//! ```
//!
//! # Environment variable mapping
//!
//! ```text
//! RR_GLOBAL_DEFAULTS_LOCAL_FALLBACK=true   → global.defaults.local_fallback = true
//! RR_PROJECT_HOST=web-2                    → project.host = "web-2"
//! ```

pub mod expand;
pub mod loader;
pub mod merge;
pub mod paths;
pub mod types;
pub mod validator;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;

pub use loader::ConfigLoader;
pub use merge::ResolvedConfig;
pub use types::{ConfigSource, GlobalConfig, Host, ProjectConfig, Task, TaskBody};

/// Loads and validates the resolved configuration using the standard file
/// locations: `<home>/.rr/config.yaml` for the global layer, and the first
/// `.rr.yaml` found walking upward from `cwd` for the project layer.
///
/// # Errors
///
/// Returns an error if either file has invalid YAML, or if C2 validation
/// fails.
pub fn load(cwd: &Path) -> Result<ResolvedConfig> {
    ConfigLoader::load_standard(cwd)
}

/// Formats a resolved config for display (`rr host status`, `--verbose`
/// startup dumps). Output is deterministically ordered using `BTreeMap`.
#[must_use]
pub fn format_options(resolved: &ResolvedConfig) -> Vec<String> {
    let mut options = BTreeMap::new();
    format_host_options(resolved, &mut options);
    format_defaults_options(resolved, &mut options);
    format_project_options(resolved, &mut options);
    format_lock_options(resolved, &mut options);
    format_monitor_options(resolved, &mut options);

    let max_key_len = options.keys().map(String::len).max().unwrap_or(0);

    options
        .into_iter()
        .map(|(key, value)| format!("{key:<max_key_len$} = {value}"))
        .collect()
}

fn format_host_options(resolved: &ResolvedConfig, options: &mut BTreeMap<String, String>) {
    for (name, host) in resolved.hosts() {
        options.insert(format!("hosts.{name}.aliases"), host.aliases.join(","));
        options.insert(format!("hosts.{name}.dir"), host.dir.clone());
        if !host.tags.is_empty() {
            options.insert(format!("hosts.{name}.tags"), host.tags.join(","));
        }
        options.insert(
            format!("hosts.{name}.shell"),
            host.shell_or_default().to_string(),
        );
    }
}

fn format_defaults_options(resolved: &ResolvedConfig, options: &mut BTreeMap<String, String>) {
    let defaults = &resolved.global.defaults;
    options.insert(
        "defaults.probe_timeout_secs".into(),
        defaults.probe_timeout_secs.to_string(),
    );
    options.insert(
        "defaults.local_fallback".into(),
        defaults.local_fallback.to_string(),
    );
    if !defaults.host_priority.is_empty() {
        options.insert(
            "defaults.host_priority".into(),
            defaults.host_priority.join(","),
        );
    }
}

fn format_project_options(resolved: &ResolvedConfig, options: &mut BTreeMap<String, String>) {
    options.insert(
        "project.host".into(),
        resolved.project.host.clone().unwrap_or_default(),
    );
    options.insert("project.hosts".into(), resolved.project.hosts.join(","));
    options.insert(
        "project.local_fallback".into(),
        resolved.project.local_fallback.to_string(),
    );
    options.insert("project.tasks".into(), resolved.tasks().len().to_string());
    if !resolved.project.sync.exclude.is_empty() {
        options.insert(
            "project.sync.exclude".into(),
            resolved.project.sync.exclude.join(","),
        );
    }
}

fn format_lock_options(resolved: &ResolvedConfig, options: &mut BTreeMap<String, String>) {
    let lock = &resolved.project.lock;
    options.insert("lock.dir".into(), lock.dir.clone());
    options.insert("lock.stale_secs".into(), lock.stale_secs.to_string());
    options.insert("lock.timeout_secs".into(), lock.timeout_secs.to_string());
    options.insert(
        "lock.wait_timeout_secs".into(),
        lock.wait_timeout_secs.to_string(),
    );
}

fn format_monitor_options(resolved: &ResolvedConfig, options: &mut BTreeMap<String, String>) {
    let monitor = &resolved.project.monitor;
    options.insert("monitor.warning_pct".into(), monitor.warning_pct.to_string());
    options.insert(
        "monitor.critical_pct".into(),
        monitor.critical_pct.to_string(),
    );
    options.insert(
        "monitor.interval_secs".into(),
        monitor.interval_secs.to_string(),
    );
}
