// rr: remote task runner
//
// SPDX-License-Identifier: MIT

use super::validate;
use crate::config::merge::ResolvedConfig;
use crate::config::types::{ConfigSource, GlobalConfig, Host, ProjectConfig, Task, TaskBody};
use std::collections::BTreeMap;

fn host(aliases: &[&str]) -> Host {
    Host {
        aliases: aliases.iter().map(ToString::to_string).collect(),
        dir: "~/rr/myproject".to_string(),
        ..Default::default()
    }
}

fn run_task(cmd: &str) -> Task {
    Task {
        description: String::new(),
        hosts: Vec::new(),
        env: BTreeMap::new(),
        require: Vec::new(),
        fail_fast: false,
        timeout_secs: None,
        max_parallel: None,
        body: TaskBody::Run(cmd.to_string()),
    }
}

fn resolved(hosts: BTreeMap<String, Host>, tasks: BTreeMap<String, Task>) -> ResolvedConfig {
    let mut global = GlobalConfig::default();
    global.hosts = hosts;
    let mut project = ProjectConfig::default();
    project.tasks = tasks;
    ResolvedConfig::new(global, project, ConfigSource::Both)
}

#[test]
fn rejects_host_with_no_aliases() {
    let mut hosts = BTreeMap::new();
    hosts.insert("web-1".to_string(), Host::default());
    let resolved = resolved(hosts, BTreeMap::new());
    assert!(validate(&resolved).is_err());
}

#[test]
fn rejects_shell_not_ending_in_flag() {
    let mut hosts = BTreeMap::new();
    let mut h = host(&["web-1"]);
    h.shell = Some("bash -l -c hi".to_string());
    hosts.insert("web-1".to_string(), h);
    let resolved = resolved(hosts, BTreeMap::new());
    assert!(validate(&resolved).is_err());
}

#[test]
fn accepts_valid_shell_ending_in_flag() {
    let mut hosts = BTreeMap::new();
    let mut h = host(&["web-1"]);
    h.shell = Some("bash -l -c".to_string());
    hosts.insert("web-1".to_string(), h);
    let resolved = resolved(hosts, BTreeMap::new());
    assert!(validate(&resolved).is_ok());
}

#[test]
fn rejects_reserved_task_name() {
    let mut tasks = BTreeMap::new();
    tasks.insert("clean".to_string(), run_task("echo hi"));
    let resolved = resolved(BTreeMap::new(), tasks);
    assert!(validate(&resolved).is_err());
}

#[test]
fn rejects_task_host_reference_with_at_sign() {
    let mut tasks = BTreeMap::new();
    let mut t = run_task("echo hi");
    t.hosts = vec!["user@web-1".to_string()];
    tasks.insert("deploy".to_string(), t);
    let resolved = resolved(BTreeMap::new(), tasks);
    assert!(validate(&resolved).is_err());
}

#[test]
fn rejects_undefined_host_reference() {
    let mut tasks = BTreeMap::new();
    let mut t = run_task("echo hi");
    t.hosts = vec!["ghost".to_string()];
    tasks.insert("deploy".to_string(), t);
    let resolved = resolved(BTreeMap::new(), tasks);
    assert!(validate(&resolved).is_err());
}

#[test]
fn diamond_dependency_is_valid() {
    // spec.md S3: base, left(depends base), right(depends base), top(depends [left,right])
    let mut tasks = BTreeMap::new();
    tasks.insert("base".to_string(), run_task("echo base"));
    tasks.insert(
        "left".to_string(),
        Task {
            body: TaskBody::DependsWithBody(
                vec![crate::config::types::DependencyItem::Single("base".to_string())],
                crate::config::types::RunOrSteps::Run("echo left".to_string()),
            ),
            ..run_task("")
        },
    );
    tasks.insert(
        "right".to_string(),
        Task {
            body: TaskBody::DependsWithBody(
                vec![crate::config::types::DependencyItem::Single("base".to_string())],
                crate::config::types::RunOrSteps::Run("echo right".to_string()),
            ),
            ..run_task("")
        },
    );
    tasks.insert(
        "top".to_string(),
        Task {
            body: TaskBody::DependsOnly(vec![crate::config::types::DependencyItem::Parallel(vec![
                "left".to_string(),
                "right".to_string(),
            ])]),
            ..run_task("")
        },
    );
    let resolved = resolved(BTreeMap::new(), tasks);
    assert!(validate(&resolved).is_ok());
}

#[test]
fn rejects_dependency_self_reference() {
    let mut tasks = BTreeMap::new();
    tasks.insert(
        "a".to_string(),
        Task {
            body: TaskBody::DependsOnly(vec![crate::config::types::DependencyItem::Single("a".to_string())]),
            ..run_task("")
        },
    );
    let resolved = resolved(BTreeMap::new(), tasks);
    assert!(validate(&resolved).is_err());
}

#[test]
fn rejects_dependency_cycle() {
    let mut tasks = BTreeMap::new();
    tasks.insert(
        "a".to_string(),
        Task {
            body: TaskBody::DependsOnly(vec![crate::config::types::DependencyItem::Single("b".to_string())]),
            ..run_task("")
        },
    );
    tasks.insert(
        "b".to_string(),
        Task {
            body: TaskBody::DependsOnly(vec![crate::config::types::DependencyItem::Single("a".to_string())]),
            ..run_task("")
        },
    );
    let resolved = resolved(BTreeMap::new(), tasks);
    assert!(validate(&resolved).is_err());
}

#[test]
fn accepts_direct_duplicates_in_parallel_list() {
    // spec.md S4 / invariant 7: [a, a, a] is legal.
    let mut tasks = BTreeMap::new();
    tasks.insert("a".to_string(), run_task("echo a"));
    tasks.insert(
        "flake".to_string(),
        Task {
            body: TaskBody::Parallel(vec!["a".to_string(), "a".to_string(), "a".to_string()]),
            ..run_task("")
        },
    );
    let resolved = resolved(BTreeMap::new(), tasks);
    assert!(validate(&resolved).is_ok());
}

#[test]
fn rejects_parallel_self_reference() {
    let mut tasks = BTreeMap::new();
    tasks.insert(
        "flake".to_string(),
        Task {
            body: TaskBody::Parallel(vec!["flake".to_string()]),
            ..run_task("")
        },
    );
    let resolved = resolved(BTreeMap::new(), tasks);
    assert!(validate(&resolved).is_err());
}

#[test]
fn accepts_nested_parallel_groups() {
    let mut tasks = BTreeMap::new();
    tasks.insert("a".to_string(), run_task("echo a"));
    tasks.insert(
        "inner".to_string(),
        Task {
            body: TaskBody::Parallel(vec!["a".to_string()]),
            ..run_task("")
        },
    );
    tasks.insert(
        "outer".to_string(),
        Task {
            body: TaskBody::Parallel(vec!["inner".to_string()]),
            ..run_task("")
        },
    );
    let resolved = resolved(BTreeMap::new(), tasks);
    assert!(validate(&resolved).is_ok());
}

#[test]
fn rejects_lock_timeout_greater_than_stale() {
    let mut global = GlobalConfig::default();
    global.hosts = BTreeMap::new();
    let mut project = ProjectConfig::default();
    project.lock.timeout_secs = 500;
    project.lock.stale_secs = 300;
    let resolved = ResolvedConfig::new(global, project, ConfigSource::ProjectOnly);
    assert!(validate(&resolved).is_err());
}

#[test]
fn rejects_monitor_warning_not_below_critical() {
    let mut project = ProjectConfig::default();
    project.monitor.warning_pct = 90;
    project.monitor.critical_pct = 80;
    let resolved = ResolvedConfig::new(GlobalConfig::default(), project, ConfigSource::ProjectOnly);
    assert!(validate(&resolved).is_err());
}
