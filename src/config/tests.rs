// rr: remote task runner
//
// SPDX-License-Identifier: MIT

use super::{format_options, loader::ConfigLoader};

const GLOBAL_YAML: &str = r#"
version: 1
hosts:
  web-1:
    aliases: ["web-1.internal", "10.0.0.1"]
    dir: "~/rr/${PROJECT}"
    tags: ["prod"]
defaults:
  probe_timeout_secs: 3
  local_fallback: true
"#;

const PROJECT_YAML: &str = r#"
version: 1
host: web-1
tasks:
  deploy:
    run: "echo deploying"
  build:
    depends: ["deploy"]
    run: "make"
"#;

#[test]
fn format_options_is_deterministically_ordered() {
    let resolved = ConfigLoader::new()
        .global_yaml_str(GLOBAL_YAML)
        .project_yaml_str(PROJECT_YAML)
        .build()
        .unwrap();
    let lines = format_options(&resolved);
    let mut sorted = lines.clone();
    sorted.sort();
    assert_eq!(lines, sorted);
    assert!(lines.iter().any(|l| l.starts_with("hosts.web-1.aliases")));
    assert!(lines.iter().any(|l| l.starts_with("project.tasks")));
}

#[test]
fn format_options_reports_task_count() {
    let resolved = ConfigLoader::new()
        .global_yaml_str(GLOBAL_YAML)
        .project_yaml_str(PROJECT_YAML)
        .build()
        .unwrap();
    let lines = format_options(&resolved);
    let task_line = lines.iter().find(|l| l.trim_start().starts_with("project.tasks")).unwrap();
    assert!(task_line.contains('2'));
}

#[test]
fn load_rejects_config_with_reserved_task_name() {
    let bad_project = r#"
version: 1
tasks:
  clean:
    run: "echo no"
"#;
    let result = ConfigLoader::new().project_yaml_str(bad_project).build();
    assert!(result.is_err());
}
