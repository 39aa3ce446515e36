// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Integration tests for dependency resolution and plan execution against a
//! fully loaded configuration (`spec.md` §4.5, §4.6, §8).

use rr::config::loader::ConfigLoader;
use rr::executor::{self, NullHandler};
use rr::resolver::{self, ResolveOptions};
use rr::transport::Transport;
use rr::transport::mock::MockTransport;
use tokio_util::sync::CancellationToken;

fn resolved(project_yaml: &str) -> rr::config::merge::ResolvedConfig {
    ConfigLoader::new().project_yaml_str(project_yaml).build().unwrap()
}

// =============================================================================
// Diamond dependency dedup (spec.md §8 S3)
// =============================================================================

#[test]
fn a_diamond_shaped_dependency_graph_runs_each_task_exactly_once() {
    let cfg = resolved(
        r"
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
",
    );

    let plan = resolver::resolve(cfg.tasks(), "top", &ResolveOptions::default()).unwrap();
    let all_names: Vec<&str> = plan.stages.iter().flat_map(|s| s.tasks.iter().map(String::as_str)).collect();

    assert_eq!(all_names.iter().filter(|n| **n == "shared").count(), 1, "shared must run once: {all_names:?}");
    let shared_pos = all_names.iter().position(|n| *n == "shared").unwrap();
    let top_pos = all_names.iter().position(|n| *n == "top").unwrap();
    assert!(shared_pos < top_pos, "shared must precede top: {all_names:?}");
}

// =============================================================================
// skip_deps and from (spec.md §4.5)
// =============================================================================

#[test]
fn skip_deps_runs_only_the_targets_own_body() {
    let cfg = resolved(
        r"
tasks:
  build:
    run: make
  deploy:
    depends: [build]
    run: make deploy
",
    );

    let plan = resolver::resolve(
        cfg.tasks(),
        "deploy",
        &ResolveOptions {
            skip_deps: true,
            from: None,
        },
    )
    .unwrap();

    assert_eq!(plan.stages.len(), 1);
    assert_eq!(plan.stages[0].tasks, vec!["deploy".to_string()]);
}

#[test]
fn from_trims_every_stage_before_the_named_task() {
    let cfg = resolved(
        r"
tasks:
  fetch:
    run: git fetch
  build:
    depends: [fetch]
    run: make
  deploy:
    depends: [build]
    run: make deploy
",
    );

    let plan = resolver::resolve(
        cfg.tasks(),
        "deploy",
        &ResolveOptions {
            skip_deps: false,
            from: Some("build".to_string()),
        },
    )
    .unwrap();

    let names: Vec<&str> = plan.stages.iter().flat_map(|s| s.tasks.iter().map(String::as_str)).collect();
    assert_eq!(names, vec!["build", "deploy"]);
}

#[test]
fn from_naming_a_task_outside_the_chain_is_an_error() {
    let cfg = resolved(
        r"
tasks:
  fetch:
    run: git fetch
  deploy:
    depends: [fetch]
    run: make deploy
  unrelated:
    run: echo unrelated
",
    );

    let err = resolver::resolve(
        cfg.tasks(),
        "deploy",
        &ResolveOptions {
            skip_deps: false,
            from: Some("unrelated".to_string()),
        },
    )
    .unwrap_err();
    assert!(matches!(err, rr::error::RrError::Task(_)));
}

// =============================================================================
// Parallel flattening (spec.md §4.5 "Parallel flattening", §8 S4)
// =============================================================================

#[test]
fn nested_parallel_groups_flatten_preserving_repetition() {
    let cfg = resolved(
        r"
tasks:
  leaf_a:
    run: echo a
  leaf_b:
    run: echo b
  inner:
    parallel: [leaf_a, leaf_b]
  outer:
    parallel: [inner, leaf_a]
",
    );

    let leaves = resolver::flatten_parallel_tasks(cfg.tasks(), "outer").unwrap();
    assert_eq!(leaves, vec!["leaf_a".to_string(), "leaf_b".to_string(), "leaf_a".to_string()]);
}

// =============================================================================
// End-to-end: resolve then execute against a mock transport (spec.md §8 S6)
// =============================================================================

#[tokio::test]
async fn fail_fast_aborts_before_a_dependent_stage() {
    let cfg = resolved(
        r"
tasks:
  build:
    fail_fast: true
    run: make
  deploy:
    depends: [build]
    run: make deploy
",
    );

    let plan = resolver::resolve(cfg.tasks(), "deploy", &ResolveOptions::default()).unwrap();
    assert_eq!(plan.stages.len(), 2);

    let mock = MockTransport::new();
    mock.script("make", rr::transport::ExecResult { exit_code: 1, ..Default::default() });
    let transport = Transport::Mock(mock.clone());
    let token = CancellationToken::new();

    let result = executor::execute_plan(&plan, &transport, None, &cfg, &NullHandler, true, &token)
        .await
        .unwrap();

    assert_eq!(result.stage_results.len(), 1, "deploy's stage must not run");
    assert!(result.fail_fast_triggered);
    assert_ne!(result.exit_code(), 0);
    assert!(!mock.calls().iter().any(|c| c.contains("make deploy")));
}
