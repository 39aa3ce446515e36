// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Integration tests for the distributed lock and clean scanner working
//! together end to end (`spec.md` §4.8, §4.9, §8 S1/S2).
//!
//! Module-level unit tests (`lock::tests`, `clean::tests`) cover `acquire`,
//! `force_break`, `discover`, and `remove` in isolation; these exercise the
//! public entry points those tests don't reach (`force_release`,
//! `acquire_round_robin`, `LockGuard`'s `Drop`) and the full
//! discover-then-remove pipeline `rr clean` drives.

use std::collections::BTreeSet;
use std::sync::Arc;

use rr::clean::{self, StaleDir};
use rr::config::expand::Variables;
use rr::config::types::LockConfig;
use rr::error::RrError;
use rr::lock;
use rr::transport::ExecResult;
use rr::transport::mock::MockTransport;
use rr::transport::Transport;
use tokio_util::sync::CancellationToken;

fn lock_cfg() -> LockConfig {
    LockConfig {
        dir: "/tmp/rr-locks".to_string(),
        stale_secs: 300,
        timeout_secs: 5,
        wait_timeout_secs: 15,
    }
}

fn vars() -> Variables {
    Variables {
        home: "/home/deploy".to_string(),
        user: "deploy".to_string(),
        project: "acme".to_string(),
        branch: "HEAD".to_string(),
    }
}

// =============================================================================
// force_release (spec.md §4.8 "rr host unlock")
// =============================================================================

#[tokio::test]
async fn force_release_removes_the_directory_even_while_fresh() {
    let mock = MockTransport::new();
    let transport = Transport::Mock(mock.clone());
    let token = CancellationToken::new();

    lock::force_release(&transport, &lock_cfg(), "web-1", "acme", &token).await.unwrap();

    assert!(
        mock.calls().iter().any(|c| c.contains("rm -rf /tmp/rr-locks/acme-web-1")),
        "expected the lock directory to be force-removed: {:?}",
        mock.calls()
    );
}

#[tokio::test]
async fn force_release_surfaces_a_remote_removal_failure() {
    let mock = MockTransport::new();
    mock.script(
        "rm -rf /tmp/rr-locks/acme-web-1",
        ExecResult {
            exit_code: 1,
            stderr: "permission denied".to_string(),
            ..Default::default()
        },
    );
    let transport = Transport::Mock(mock);
    let token = CancellationToken::new();

    let result = lock::force_release(&transport, &lock_cfg(), "web-1", "acme", &token).await;
    assert!(matches!(result, Err(RrError::Lock(_))));
}

// =============================================================================
// acquire_round_robin (spec.md §4.8 "Multi-host round-robin")
// =============================================================================

#[tokio::test(start_paused = true)]
async fn round_robin_skips_a_locked_host_and_acquires_the_next() {
    let web1 = MockTransport::new();
    web1.script(
        "mkdir /tmp/rr-locks/acme-web-1 2>/dev/null && echo __RR_LOCK_OK__ || echo __RR_LOCK_EXISTS__",
        ExecResult {
            stdout: "__RR_LOCK_EXISTS__\n".to_string(),
            ..Default::default()
        },
    );
    let fresh = lock::types::LockInfo::new(
        "someone-else".to_string(),
        "web-1".to_string(),
        "acme".to_string(),
        999,
        u64::MAX / 2,
        String::new(),
    );
    web1.script(
        "cat /tmp/rr-locks/acme-web-1/info.json 2>/dev/null",
        ExecResult {
            stdout: serde_json::to_string(&fresh).unwrap(),
            ..Default::default()
        },
    );

    let web2 = MockTransport::new();
    web2.script(
        "mkdir /tmp/rr-locks/acme-web-2 2>/dev/null && echo __RR_LOCK_OK__ || echo __RR_LOCK_EXISTS__",
        ExecResult {
            stdout: "__RR_LOCK_OK__\n".to_string(),
            ..Default::default()
        },
    );

    let hosts = vec!["web-1".to_string(), "web-2".to_string()];
    let token = CancellationToken::new();
    let mut cfg = lock_cfg();
    cfg.timeout_secs = 0;

    let guard = lock::acquire_round_robin(
        |host| {
            let transport = if host == "web-1" {
                Arc::new(Transport::Mock(web1.clone()))
            } else {
                Arc::new(Transport::Mock(web2.clone()))
            };
            Box::pin(async move { Ok(transport) })
        },
        &cfg,
        &hosts,
        "acme",
        &token,
    )
    .await
    .unwrap();

    assert_eq!(guard.host(), "web-2");
    guard.release().await.unwrap();
}

// =============================================================================
// LockGuard::drop (spec.md §4.8 "release is unconditional")
// =============================================================================

#[tokio::test]
async fn dropping_a_guard_without_calling_release_still_frees_the_directory() {
    let mock = MockTransport::new();
    mock.script(
        "mkdir /tmp/rr-locks/acme-web-1 2>/dev/null && echo __RR_LOCK_OK__ || echo __RR_LOCK_EXISTS__",
        ExecResult {
            stdout: "__RR_LOCK_OK__\n".to_string(),
            ..Default::default()
        },
    );
    let transport = Arc::new(Transport::Mock(mock.clone()));
    let token = CancellationToken::new();

    {
        let _guard = lock::acquire(transport, &lock_cfg(), "web-1", "acme", &token).await.unwrap();
        // guard dropped here without an explicit release() call
    }

    // Drop only spawns the cleanup task; give the runtime a turn to run it.
    for _ in 0..50 {
        if mock.calls().iter().any(|c| c.contains("rm -rf /tmp/rr-locks/acme-web-1")) {
            break;
        }
        tokio::task::yield_now().await;
    }

    assert!(
        mock.calls().iter().any(|c| c.contains("rm -rf /tmp/rr-locks/acme-web-1")),
        "Drop must still release the lock: {:?}",
        mock.calls()
    );
}

// =============================================================================
// End-to-end discover -> remove (spec.md §8 S1 "stale-dir discovery", S2
// "dangerous-path rejection")
// =============================================================================

#[tokio::test]
async fn the_full_clean_pipeline_removes_only_the_stale_entries_under_the_expected_root() {
    let mock = MockTransport::new();
    mock.script(
        "ls -d ~/rr/acme-* 2>/dev/null",
        ExecResult {
            stdout: "~/rr/acme-main\n~/rr/acme-old-feature\n~/rr/acme-another-stale\n".to_string(),
            ..Default::default()
        },
    );
    mock.script(
        "du -sk ~/rr/acme-old-feature 2>/dev/null | cut -f1",
        ExecResult {
            stdout: "512\n".to_string(),
            ..Default::default()
        },
    );
    mock.script(
        "du -sk ~/rr/acme-another-stale 2>/dev/null | cut -f1",
        ExecResult {
            stdout: "1024\n".to_string(),
            ..Default::default()
        },
    );
    let transport = Transport::Mock(mock.clone());
    let token = CancellationToken::new();

    let mut active = BTreeSet::new();
    active.insert("main".to_string());

    let stale = clean::discover(&transport, "~/rr/${PROJECT}-${BRANCH}", &vars(), &active, &token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stale.len(), 2, "only the two non-active branches are stale: {stale:?}");

    let (removed, errors) = clean::remove(&transport, &stale, Some("~/rr/"), &token).await;

    assert!(errors.is_empty());
    assert_eq!(removed.len(), 2);
    assert!(!mock.calls().iter().any(|c| c.contains("rm -rf ~/rr/acme-main")));
}

#[tokio::test]
async fn a_stale_entry_outside_the_expected_root_is_reported_but_not_removed() {
    let transport = Transport::Mock(MockTransport::new());
    let token = CancellationToken::new();

    let stale = vec![
        StaleDir {
            path: "~/rr/acme-stale".to_string(),
            branch: "stale".to_string(),
            size_bytes: None,
        },
        StaleDir {
            path: "/etc/passwd".to_string(),
            branch: "stale".to_string(),
            size_bytes: None,
        },
    ];

    let (removed, errors) = clean::remove(&transport, &stale, Some("~/rr/"), &token).await;
    assert_eq!(removed, vec!["~/rr/acme-stale".to_string()]);
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0].1, RrError::DangerousPath(_)));
}
