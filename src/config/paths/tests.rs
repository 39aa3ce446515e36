// rr: remote task runner
//
// SPDX-License-Identifier: MIT

use super::find_project_config;
use std::process::Command;

fn init_repo(dir: &std::path::Path) {
    let run = |args: &[&str]| {
        Command::new("git").args(args).current_dir(dir).status().unwrap();
    };
    run(&["init", "--quiet", "-b", "main"]);
}

#[test]
fn finds_config_in_start_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".rr.yaml"), "version: 1\n").unwrap();
    assert_eq!(
        find_project_config(dir.path()),
        Some(dir.path().join(".rr.yaml"))
    );
}

#[test]
fn finds_config_in_ancestor_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".rr.yaml"), "version: 1\n").unwrap();
    let nested = dir.path().join("a/b/c");
    std::fs::create_dir_all(&nested).unwrap();
    assert_eq!(
        find_project_config(&nested),
        Some(dir.path().join(".rr.yaml"))
    );
}

#[test]
fn stops_at_git_repo_root_without_finding_config() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let nested = dir.path().join("sub");
    std::fs::create_dir_all(&nested).unwrap();
    assert_eq!(find_project_config(&nested), None);
}
