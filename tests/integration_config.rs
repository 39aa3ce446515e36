// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Integration tests for the two-layer configuration pipeline (`spec.md`
//! §6): loading, merging, and C2 validation against realistic YAML.

use rr::config::loader::ConfigLoader;

// =============================================================================
// Loading and merging
// =============================================================================

#[test]
fn loads_global_and_project_layers_together() {
    let global = r"
hosts:
  web-1:
    aliases: [web-1.internal]
    dir: ~/rr/${PROJECT}-${BRANCH}
defaults:
  probe_timeout_secs: 3
";
    let project = r"
tasks:
  build:
    run: make
";
    let resolved = ConfigLoader::new()
        .global_yaml_str(global)
        .project_yaml_str(project)
        .build()
        .unwrap();

    assert_eq!(resolved.hosts().len(), 1);
    assert!(resolved.host("web-1").is_some());
    assert_eq!(resolved.global.defaults.probe_timeout_secs, 3);
    assert!(resolved.task("build").is_some());
    assert_eq!(resolved.source, rr::config::types::ConfigSource::Both);
}

#[test]
fn project_only_load_defaults_the_global_layer() {
    let project = r"
tasks:
  build:
    run: make
";
    let resolved = ConfigLoader::new().project_yaml_str(project).build().unwrap();

    assert!(resolved.hosts().is_empty());
    assert_eq!(resolved.source, rr::config::types::ConfigSource::ProjectOnly);
}

#[test]
fn unknown_top_level_field_is_rejected() {
    let project = r"
made_up_field: true
tasks: {}
";
    let err = ConfigLoader::new().project_yaml_str(project).build().unwrap_err();
    assert!(format!("{err:#}").to_lowercase().contains("unknown"));
}

// =============================================================================
// Task shapes
// =============================================================================

#[test]
fn parses_every_task_body_shape() {
    let project = r#"
tasks:
  plain:
    run: echo plain
  multi_step:
    steps:
      - run: make
      - run: make test
        on_fail: continue
  fan_out:
    parallel: [plain, multi_step]
  chained:
    depends: [plain, [multi_step, fan_out]]
  chained_with_body:
    depends: [plain]
    run: echo after-deps
  placeholder: {}
"#;
    let resolved = ConfigLoader::new().project_yaml_str(project).build().unwrap();

    assert!(matches!(resolved.task("plain").unwrap().body, rr::config::types::TaskBody::Run(_)));
    assert!(matches!(resolved.task("multi_step").unwrap().body, rr::config::types::TaskBody::Steps(_)));
    assert!(matches!(resolved.task("fan_out").unwrap().body, rr::config::types::TaskBody::Parallel(_)));
    assert!(matches!(resolved.task("chained").unwrap().body, rr::config::types::TaskBody::DependsOnly(_)));
    assert!(matches!(
        resolved.task("chained_with_body").unwrap().body,
        rr::config::types::TaskBody::DependsWithBody(..)
    ));
    assert!(matches!(resolved.task("placeholder").unwrap().body, rr::config::types::TaskBody::Empty));
}

#[test]
fn run_and_steps_are_mutually_exclusive() {
    let project = r"
tasks:
  broken:
    run: echo a
    steps:
      - run: echo b
";
    let err = ConfigLoader::new().project_yaml_str(project).build().unwrap_err();
    assert!(format!("{err:#}").contains("mutually exclusive"));
}

// =============================================================================
// C2 validation (`spec.md` §4.2)
// =============================================================================

#[test]
fn rejects_a_reserved_task_name() {
    let project = r"
tasks:
  clean:
    run: echo nope
";
    let err = ConfigLoader::new().project_yaml_str(project).build().unwrap_err();
    assert!(format!("{err:#}").contains("reserved"));
}

#[test]
fn rejects_a_host_with_no_aliases() {
    let global = r"
hosts:
  web-1:
    dir: /srv/app
";
    let err = ConfigLoader::new().global_yaml_str(global).build().unwrap_err();
    assert!(format!("{err:#}").contains("no connection aliases"));
}

#[test]
fn rejects_a_shell_template_not_ending_in_a_flag() {
    let global = r"
hosts:
  web-1:
    aliases: [web-1.internal]
    dir: /srv/app
    shell: bash -l
";
    let err = ConfigLoader::new().global_yaml_str(global).build().unwrap_err();
    assert!(format!("{err:#}").contains("does not end in a command-introducing flag"));
}

#[test]
fn rejects_a_dependency_cycle() {
    let project = r"
tasks:
  a:
    depends: [b]
    run: echo a
  b:
    depends: [a]
    run: echo b
";
    let err = ConfigLoader::new().project_yaml_str(project).build().unwrap_err();
    assert!(format!("{err:#}").contains("cycle"));
}

#[test]
fn rejects_a_dependency_on_an_undefined_task() {
    let project = r"
tasks:
  a:
    depends: [ghost]
    run: echo a
";
    let err = ConfigLoader::new().project_yaml_str(project).build().unwrap_err();
    assert!(format!("{err:#}").contains("undefined task 'ghost'"));
}

#[test]
fn a_diamond_dependency_shape_is_accepted() {
    // shared -> {left, right} -> top; reached via two paths, not a cycle.
    let project = r"
tasks:
  shared:
    run: echo shared
  left:
    depends: [shared]
    run: echo left
  right:
    depends: [shared]
    run: echo right
  top:
    depends: [left, right]
    run: echo top
";
    let resolved = ConfigLoader::new().project_yaml_str(project).build().unwrap();
    assert_eq!(resolved.tasks().len(), 4);
}

#[test]
fn rejects_lock_timeout_exceeding_stale_threshold() {
    let project = r"
lock:
  timeout_secs: 600
  stale_secs: 300
tasks: {}
";
    let err = ConfigLoader::new().project_yaml_str(project).build().unwrap_err();
    assert!(format!("{err:#}").contains("lock.timeout_secs"));
}

#[test]
fn rejects_monitor_thresholds_out_of_order() {
    let project = r"
monitor:
  warning_pct: 90
  critical_pct: 50
tasks: {}
";
    let err = ConfigLoader::new().project_yaml_str(project).build().unwrap_err();
    assert!(format!("{err:#}").contains("monitor.warning_pct"));
}

// =============================================================================
// Environment variable overrides
// =============================================================================

#[test]
fn env_prefix_overrides_project_fields() {
    // SAFETY: integration tests run single-threaded per binary by default for
    // this crate's test suite; this env var is local to this test's prefix.
    unsafe {
        std::env::set_var("RR_TEST_PROJECT_LOCAL_FALLBACK", "true");
    }
    let resolved = ConfigLoader::new()
        .project_yaml_str("tasks: {}")
        .with_env_prefix("RR_TEST")
        .build()
        .unwrap();
    unsafe {
        std::env::remove_var("RR_TEST_PROJECT_LOCAL_FALLBACK");
    }
    assert!(resolved.local_fallback());
}
