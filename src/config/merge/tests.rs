// rr: remote task runner
//
// SPDX-License-Identifier: MIT

use super::ResolvedConfig;
use crate::config::types::{ConfigSource, GlobalConfig, ProjectConfig};

#[test]
fn candidate_hosts_prefers_single_host_field() {
    let mut project = ProjectConfig::default();
    project.host = Some("web-1".to_string());
    project.hosts = vec!["web-2".to_string(), "web-3".to_string()];
    let resolved = ResolvedConfig::new(GlobalConfig::default(), project, ConfigSource::Both);
    assert_eq!(resolved.candidate_hosts(), vec!["web-1".to_string()]);
}

#[test]
fn candidate_hosts_falls_back_to_hosts_list() {
    let mut project = ProjectConfig::default();
    project.hosts = vec!["web-2".to_string(), "web-3".to_string()];
    let resolved = ResolvedConfig::new(GlobalConfig::default(), project, ConfigSource::ProjectOnly);
    assert_eq!(
        resolved.candidate_hosts(),
        vec!["web-2".to_string(), "web-3".to_string()]
    );
}

#[test]
fn local_fallback_true_if_either_layer_enables_it() {
    let mut global = GlobalConfig::default();
    global.defaults.local_fallback = true;
    let resolved = ResolvedConfig::new(global, ProjectConfig::default(), ConfigSource::Both);
    assert!(resolved.local_fallback());
}
