use std::collections::BTreeMap;
use std::sync::Arc;

use super::*;
use crate::config::types::{ConfigSource, FleetDefaults, GlobalConfig, ProjectConfig};

fn host(aliases: &[&str]) -> Host {
    Host {
        aliases: aliases.iter().map(|s| (*s).to_string()).collect(),
        dir: "~/rr/project".to_string(),
        ..Default::default()
    }
}

fn resolved_with_hosts(hosts: Vec<(&str, Host)>, priority: Vec<&str>) -> ResolvedConfig {
    let mut global = GlobalConfig::default();
    for (name, h) in hosts {
        global.hosts.insert(name.to_string(), h);
    }
    global.defaults = FleetDefaults {
        probe_timeout_secs: 1,
        local_fallback: false,
        host_priority: priority.into_iter().map(String::from).collect(),
    };
    ResolvedConfig::new(global, ProjectConfig::default(), ConfigSource::GlobalOnly)
}

#[test]
fn ordered_host_names_honours_priority_then_lexicographic() {
    let resolved = resolved_with_hosts(
        vec![
            ("web-1", host(&["web-1a"])),
            ("web-2", host(&["web-2a"])),
            ("db-1", host(&["db-1a"])),
        ],
        vec!["db-1"],
    );
    let selector = Selector::new(Arc::new(resolved));
    assert_eq!(selector.ordered_host_names(), vec!["db-1", "web-1", "web-2"]);
}

#[test]
fn resolve_host_prefers_explicit_preferred() {
    let resolved = resolved_with_hosts(vec![("web-1", host(&["a"])), ("web-2", host(&["b"]))], vec![]);
    let selector = Selector::new(Arc::new(resolved));
    assert_eq!(selector.resolve_host(Some("web-2")).unwrap(), "web-2");
}

#[test]
fn resolve_host_falls_back_to_priority_order() {
    let resolved = resolved_with_hosts(vec![("web-1", host(&["a"])), ("web-2", host(&["b"]))], vec!["web-2"]);
    let selector = Selector::new(Arc::new(resolved));
    assert_eq!(selector.resolve_host(None).unwrap(), "web-2");
}

#[test]
fn resolve_host_errors_with_no_hosts_and_no_fallback() {
    let resolved = resolved_with_hosts(vec![], vec![]);
    let selector = Selector::new(Arc::new(resolved));
    assert!(selector.resolve_host(None).is_err());
}

#[test]
fn eligible_host_names_filters_by_restriction_list() {
    let resolved = resolved_with_hosts(
        vec![("web-1", host(&["a"])), ("web-2", host(&["b"])), ("db-1", host(&["c"]))],
        vec![],
    );
    let selector = Selector::new(Arc::new(resolved));
    let task = Task {
        description: String::new(),
        hosts: vec!["db-1".to_string()],
        env: BTreeMap::new(),
        require: Vec::new(),
        fail_fast: false,
        timeout_secs: None,
        max_parallel: None,
        body: crate::config::types::TaskBody::Empty,
    };
    assert_eq!(selector.eligible_host_names(&task), vec!["db-1"]);
}

#[test]
fn host_info_reflects_configured_hosts() {
    let resolved = resolved_with_hosts(vec![("web-1", host(&["web-1a", "web-1b"]))], vec![]);
    let selector = Selector::new(Arc::new(resolved));
    let info = selector.host_info();
    assert_eq!(info.len(), 1);
    assert_eq!(info[0].name, "web-1");
    assert_eq!(info[0].aliases, vec!["web-1a", "web-1b"]);
}
