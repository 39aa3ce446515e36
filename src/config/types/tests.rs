// rr: remote task runner
//
// SPDX-License-Identifier: MIT

use super::{DependencyItem, OnFail, TaskBody};

fn task_from_yaml(yaml: &str) -> super::Task {
    let wrapped = format!("{{{yaml}}}");
    let value: serde_json::Value = serde_yaml_like_json(&wrapped);
    serde_json::from_value(value).expect("task should deserialize")
}

/// Minimal stand-in: the crate deserializes YAML through the `config` crate
/// in production, but these unit tests only need to exercise `Task`'s custom
/// `Deserialize` impl, so a JSON document (a YAML subset) is enough.
fn serde_yaml_like_json(s: &str) -> serde_json::Value {
    serde_json::from_str(s).expect("valid json fixture")
}

#[test]
fn run_only_task() {
    let task = task_from_yaml(r#""run": "echo hi""#);
    match task.body {
        TaskBody::Run(cmd) => assert_eq!(cmd, "echo hi"),
        other => panic!("expected Run, got {other:?}"),
    }
    assert!(task.has_body());
}

#[test]
fn steps_task_with_on_fail() {
    let task = task_from_yaml(
        r#""steps": [{"run": "a"}, {"run": "b", "on_fail": "continue"}]"#,
    );
    match task.body {
        TaskBody::Steps(steps) => {
            assert_eq!(steps.len(), 2);
            assert_eq!(steps[0].on_fail, OnFail::Stop);
            assert_eq!(steps[1].on_fail, OnFail::Continue);
        }
        other => panic!("expected Steps, got {other:?}"),
    }
}

#[test]
fn run_and_steps_conflict() {
    let wrapped = r#"{"run": "a", "steps": [{"run": "b"}]}"#;
    let value: serde_json::Value = serde_json::from_str(wrapped).unwrap();
    let result: Result<super::Task, _> = serde_json::from_value(value);
    assert!(result.is_err());
}

#[test]
fn parallel_excludes_depends() {
    let wrapped = r#"{"parallel": ["a", "b"], "depends": ["c"]}"#;
    let value: serde_json::Value = serde_json::from_str(wrapped).unwrap();
    let result: Result<super::Task, _> = serde_json::from_value(value);
    assert!(result.is_err());
}

#[test]
fn depends_only_has_no_body() {
    let task = task_from_yaml(r#""depends": ["base"]"#);
    assert!(!task.has_body());
    assert_eq!(task.depends(), &[DependencyItem::Single("base".to_string())]);
}

#[test]
fn depends_with_run_body() {
    let task = task_from_yaml(r#""depends": [["a", "b"]], "run": "deploy""#);
    assert!(task.has_body());
    assert_eq!(task.depends().len(), 1);
    assert_eq!(
        task.depends()[0],
        DependencyItem::Parallel(vec!["a".to_string(), "b".to_string()])
    );
    match task.body {
        TaskBody::DependsWithBody(_, super::RunOrSteps::Run(cmd)) => assert_eq!(cmd, "deploy"),
        other => panic!("expected DependsWithBody(Run), got {other:?}"),
    }
}

#[test]
fn empty_task_has_no_body() {
    let task = task_from_yaml("");
    assert!(!task.has_body());
    assert!(matches!(task.body, TaskBody::Empty));
}

#[test]
fn dependency_item_untagged_single_vs_parallel() {
    let single: DependencyItem = serde_json::from_str(r#""base""#).unwrap();
    assert_eq!(single, DependencyItem::Single("base".to_string()));

    let group: DependencyItem = serde_json::from_str(r#"["a", "b"]"#).unwrap();
    assert_eq!(group, DependencyItem::Parallel(vec!["a".to_string(), "b".to_string()]));
}
