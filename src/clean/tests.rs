use std::collections::BTreeSet;

use super::*;
use crate::transport::ExecResult;
use crate::transport::mock::MockTransport;

fn vars() -> Variables {
    Variables {
        home: "/home/deploy".to_string(),
        user: "deploy".to_string(),
        project: "acme".to_string(),
        branch: "HEAD".to_string(),
    }
}

#[test]
fn quote_glob_preserves_tilde_and_trailing_star() {
    assert_eq!(quote_glob("~/rr/acme-*"), "~/rr/acme-*");
}

#[test]
fn quote_glob_escapes_unsafe_literal_characters() {
    assert_eq!(quote_glob("~/rr/a b-*"), "~/'rr/a b-'*");
}

#[tokio::test]
async fn template_without_branch_returns_none() {
    let mock = MockTransport::new();
    let transport = Transport::Mock(mock);
    let token = CancellationToken::new();
    let result = discover(&transport, "~/rr/acme", &vars(), &BTreeSet::new(), &token).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn discover_drops_active_branches_and_sizes_the_rest() {
    let mock = MockTransport::new();
    mock.script(
        "ls -d ~/rr/acme-* 2>/dev/null",
        ExecResult {
            stdout: "~/rr/acme-main\n~/rr/acme-old-feature\n".to_string(),
            ..Default::default()
        },
    );
    mock.script(
        "du -sk ~/rr/acme-old-feature 2>/dev/null | cut -f1",
        ExecResult {
            stdout: "2048\n".to_string(),
            ..Default::default()
        },
    );
    let transport = Transport::Mock(mock);
    let token = CancellationToken::new();

    let mut active = BTreeSet::new();
    active.insert("main".to_string());

    let result = discover(&transport, "~/rr/${PROJECT}-${BRANCH}", &vars(), &active, &token)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].branch, "old-feature");
    assert_eq!(result[0].size_bytes, Some(2048 * 1024));
}

#[tokio::test]
async fn discover_errors_on_transport_failure() {
    let mock = MockTransport::new();
    mock.script(
        "ls -d ~/rr/acme-* 2>/dev/null",
        ExecResult {
            exit_code: -1,
            error: Some("connection lost".to_string()),
            ..Default::default()
        },
    );
    let transport = Transport::Mock(mock);
    let token = CancellationToken::new();
    let result = discover(&transport, "~/rr/${PROJECT}-${BRANCH}", &vars(), &BTreeSet::new(), &token).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn discover_errors_on_nonzero_exit_with_output() {
    let mock = MockTransport::new();
    mock.script(
        "ls -d ~/rr/acme-* 2>/dev/null",
        ExecResult {
            stdout: "~/rr/acme-main\n".to_string(),
            stderr: "ls: cannot access '~/rr/acme-broken': Permission denied".to_string(),
            exit_code: 1,
            ..Default::default()
        },
    );
    let transport = Transport::Mock(mock);
    let token = CancellationToken::new();
    let result = discover(&transport, "~/rr/${PROJECT}-${BRANCH}", &vars(), &BTreeSet::new(), &token).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn discover_treats_nonzero_exit_with_empty_stdout_as_no_matches() {
    let mock = MockTransport::new();
    mock.script(
        "ls -d ~/rr/acme-* 2>/dev/null",
        ExecResult {
            stdout: String::new(),
            exit_code: 2,
            ..Default::default()
        },
    );
    let transport = Transport::Mock(mock);
    let token = CancellationToken::new();
    let result = discover(&transport, "~/rr/${PROJECT}-${BRANCH}", &vars(), &BTreeSet::new(), &token)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn remove_refuses_a_path_outside_the_expected_prefix() {
    let mock = MockTransport::new();
    let transport = Transport::Mock(mock.clone());
    let token = CancellationToken::new();

    let stale = vec![StaleDir {
        path: "/etc".to_string(),
        branch: "old".to_string(),
        size_bytes: None,
    }];

    let (removed, errors) = remove(&transport, &stale, Some("~/rr/"), &token).await;
    assert!(removed.is_empty());
    assert_eq!(errors.len(), 1);
    assert!(!mock.calls().iter().any(|c| c.starts_with("exec:rm -rf")));
}

#[tokio::test]
async fn remove_succeeds_for_valid_paths() {
    let mock = MockTransport::new();
    let transport = Transport::Mock(mock);
    let token = CancellationToken::new();

    let stale = vec![StaleDir {
        path: "~/rr/acme-old-feature".to_string(),
        branch: "old-feature".to_string(),
        size_bytes: Some(1024),
    }];

    let (removed, errors) = remove(&transport, &stale, Some("~/rr/"), &token).await;
    assert_eq!(removed, vec!["~/rr/acme-old-feature".to_string()]);
    assert!(errors.is_empty());
}
