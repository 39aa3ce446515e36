// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Schema and semantic validation (`spec.md` §4.2), run after host
//! directories have been expansion-checked.
//!
//! ```text
//! validate(&ResolvedConfig)
//!   validate_host()            -- aliases, dir, shell flag ending
//!   validate_host_dir_expansion() -- no leftover ${...} after expand_remote
//!   validate_reserved_names()  -- task keys not in RESERVED_TASK_NAMES
//!   validate_task()            -- host refs bare, parallel/depends shape
//!   validate_parallel_graph()  -- exists, no self-ref, no cycles
//!   validate_dependency_graph()-- DFS, acyclic, no undefined refs
//!   validate_lock()            -- timeout <= stale
//!   validate_monitor()         -- thresholds in [0,100], warning < critical
//! ```

use std::collections::BTreeMap;

use super::expand::{self, Variables};
use super::merge::ResolvedConfig;
use super::types::{Host, Task, TaskBody};
use crate::error::{ConfigError, RrResult};

/// Built-in verbs that cannot be used as task keys (`spec.md` §6).
pub const RESERVED_TASK_NAMES: &[&str] = &[
    "run",
    "exec",
    "sync",
    "init",
    "setup",
    "status",
    "monitor",
    "doctor",
    "help",
    "version",
    "completion",
    "update",
    "host",
    "unlock",
    "tasks",
    "clean",
];

fn validation(message: impl Into<String>, hint: impl Into<String>) -> crate::error::RrError {
    ConfigError::validation(message, hint).into()
}

/// Runs every C2 check against a resolved config, failing fast on the first
/// violation (validation errors are fatal and never retried, `spec.md` §7).
pub fn validate(resolved: &ResolvedConfig) -> RrResult<()> {
    for (name, host) in resolved.hosts() {
        validate_host(name, host)?;
    }

    let vars = Variables::resolve(&std::env::current_dir().unwrap_or_default());
    for (name, host) in resolved.hosts() {
        validate_host_dir_expansion(name, host, &vars)?;
    }

    validate_reserved_names(resolved.tasks())?;

    for (name, task) in resolved.tasks() {
        validate_task(name, task, resolved.tasks(), resolved.hosts())?;
    }

    validate_parallel_graph(resolved.tasks())?;
    validate_dependency_graph(resolved.tasks())?;
    validate_lock(resolved)?;
    validate_monitor(resolved)?;

    Ok(())
}

/// Bare-name check shared by host restriction lists and `host`/`hosts`
/// project fields (`spec.md` §4.2 "Host references").
fn is_bare_host_name(name: &str) -> bool {
    !name.contains('@') && !name.contains('/')
}

fn validate_host(name: &str, host: &Host) -> RrResult<()> {
    if host.aliases.is_empty() {
        return Err(validation(
            format!("host '{name}' has no connection aliases"),
            format!("add at least one alias under hosts.{name}.aliases"),
        ));
    }
    if host.dir.trim().is_empty() {
        return Err(validation(
            format!("host '{name}' has an empty working directory"),
            format!("set hosts.{name}.dir to a non-empty path"),
        ));
    }
    if let Some(shell) = &host.shell {
        let ends_in_flag = shell
            .split_whitespace()
            .next_back()
            .is_some_and(|tok| tok.starts_with('-'));
        if !ends_in_flag {
            return Err(validation(
                format!("host '{name}' shell '{shell}' does not end in a command-introducing flag"),
                "end the shell template in a flag starting with '-', e.g. \"bash -l -c\"",
            ));
        }
    }
    Ok(())
}

fn validate_host_dir_expansion(name: &str, host: &Host, vars: &Variables) -> RrResult<()> {
    let expanded = expand::expand_remote(&host.dir, vars);
    if expanded.contains("${") {
        return Err(validation(
            format!("host '{name}' dir '{}' has an unresolved variable after expansion", host.dir),
            "check for a typo in a ${...} variable name (recognised: PROJECT, USER, HOME, BRANCH)",
        ));
    }
    Ok(())
}

fn validate_reserved_names(tasks: &BTreeMap<String, Task>) -> RrResult<()> {
    for name in tasks.keys() {
        if RESERVED_TASK_NAMES.contains(&name.as_str()) {
            return Err(validation(
                format!("task name '{name}' is reserved"),
                format!("rename the task; '{name}' is a built-in command"),
            ));
        }
    }
    Ok(())
}

fn validate_task(
    name: &str,
    task: &Task,
    all_tasks: &BTreeMap<String, Task>,
    hosts: &BTreeMap<String, Host>,
) -> RrResult<()> {
    for host_ref in &task.hosts {
        if !is_bare_host_name(host_ref) {
            return Err(validation(
                format!("task '{name}' references host '{host_ref}' with an invalid name"),
                "host references must be bare names, without '@' or '/'",
            ));
        }
        if !hosts.contains_key(host_ref) {
            return Err(validation(
                format!("task '{name}' references undefined host '{host_ref}'"),
                format!("define hosts.{host_ref} or remove it from task '{name}'s host list"),
            ));
        }
    }

    if let Some(members) = task.body.parallel_members() {
        for member in members {
            if !all_tasks.contains_key(member) {
                return Err(validation(
                    format!("task '{name}' parallel group references undefined task '{member}'"),
                    format!("define task '{member}' or remove it from '{name}'s parallel list"),
                ));
            }
        }
    }

    for item in task.depends() {
        for member in item.names() {
            if !all_tasks.contains_key(member) {
                return Err(validation(
                    format!("task '{name}' depends on undefined task '{member}'"),
                    format!("define task '{member}' or remove it from '{name}'s depends list"),
                ));
            }
        }
    }

    Ok(())
}

/// DFS colour used by both the parallel-reference and dependency-graph
/// cycle checks.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Colour {
    White,
    Gray,
    Black,
}

/// Validates the graph formed by `parallel`-type tasks referencing other
/// `parallel`-type tasks: no self-reference, no cycles. Leaf (non-parallel)
/// members are not graph nodes and may repeat freely (`spec.md` §4.2).
fn validate_parallel_graph(tasks: &BTreeMap<String, Task>) -> RrResult<()> {
    let mut colour: BTreeMap<&str, Colour> = tasks.keys().map(|k| (k.as_str(), Colour::White)).collect();

    for start in tasks.keys() {
        if colour[start.as_str()] == Colour::White {
            visit_parallel(start, tasks, &mut colour)?;
        }
    }
    Ok(())
}

fn visit_parallel<'a>(
    name: &'a str,
    tasks: &'a BTreeMap<String, Task>,
    colour: &mut BTreeMap<&'a str, Colour>,
) -> RrResult<()> {
    colour.insert(name, Colour::Gray);

    if let Some(task) = tasks.get(name)
        && let Some(members) = task.body.parallel_members()
    {
        for member in members {
            if member == name {
                return Err(validation(
                    format!("task '{name}' lists itself in its own parallel group"),
                    "remove the self-reference",
                ));
            }
            match colour.get(member.as_str()).copied() {
                Some(Colour::Gray) => {
                    return Err(validation(
                        format!("cycle detected in parallel references starting at '{name}'"),
                        "break the cycle: a chain of parallel groups refers back to itself",
                    ));
                }
                Some(Colour::White) => visit_parallel(member, tasks, colour)?,
                _ => {}
            }
        }
    }

    colour.insert(name, Colour::Black);
    Ok(())
}

/// Validates the dependency graph (`depends` lists): acyclic, no
/// self-reference, no reference to an undefined task. Diamond patterns
/// (the same task reached via two paths) are valid; deduplication is the
/// resolver's job (`spec.md` §4.2, §4.5).
fn validate_dependency_graph(tasks: &BTreeMap<String, Task>) -> RrResult<()> {
    let mut colour: BTreeMap<&str, Colour> = tasks.keys().map(|k| (k.as_str(), Colour::White)).collect();

    for start in tasks.keys() {
        if colour[start.as_str()] == Colour::White {
            visit_depends(start, tasks, &mut colour)?;
        }
    }
    Ok(())
}

fn visit_depends<'a>(
    name: &'a str,
    tasks: &'a BTreeMap<String, Task>,
    colour: &mut BTreeMap<&'a str, Colour>,
) -> RrResult<()> {
    colour.insert(name, Colour::Gray);

    if let Some(task) = tasks.get(name) {
        for item in task.depends() {
            for member in item.names() {
                if member == name {
                    return Err(validation(
                        format!("task '{name}' depends on itself"),
                        "remove the self-reference from the depends list",
                    ));
                }
                match colour.get(member.as_str()).copied() {
                    Some(Colour::Gray) => {
                        return Err(validation(
                            format!("dependency cycle detected involving task '{name}'"),
                            "break the cycle in the depends chain",
                        ));
                    }
                    Some(Colour::White) => visit_depends(member, tasks, colour)?,
                    _ => {}
                }
            }
        }
    }

    colour.insert(name, Colour::Black);
    Ok(())
}

fn validate_lock(resolved: &ResolvedConfig) -> RrResult<()> {
    let lock = &resolved.project.lock;
    // Negative durations are unrepresentable (u64 fields); only the
    // cross-field invariant needs an explicit check.
    if lock.timeout_secs > lock.stale_secs {
        return Err(validation(
            format!(
                "lock.timeout_secs ({}) must not exceed lock.stale_secs ({})",
                lock.timeout_secs, lock.stale_secs
            ),
            "lower lock.timeout_secs or raise lock.stale_secs",
        ));
    }
    Ok(())
}

fn validate_monitor(resolved: &ResolvedConfig) -> RrResult<()> {
    let monitor = &resolved.project.monitor;
    if monitor.warning_pct > 100 || monitor.critical_pct > 100 {
        return Err(validation(
            "monitor thresholds must lie in [0, 100]",
            "set monitor.warning_pct and monitor.critical_pct to a percentage between 0 and 100",
        ));
    }
    if monitor.warning_pct != 0 && monitor.critical_pct != 0 && monitor.warning_pct >= monitor.critical_pct {
        return Err(validation(
            format!(
                "monitor.warning_pct ({}) must be less than monitor.critical_pct ({})",
                monitor.warning_pct, monitor.critical_pct
            ),
            "lower monitor.warning_pct or raise monitor.critical_pct",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
