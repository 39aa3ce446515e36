// rr: remote task runner
//
// SPDX-License-Identifier: MIT

use super::MockTransport;
use crate::transport::ExecResult;
use std::path::Path;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn records_exec_calls_in_order() {
    let mock = MockTransport::new();
    let token = CancellationToken::new();
    mock.exec("echo a", &token).await;
    mock.exec("echo b", &token).await;
    assert_eq!(mock.calls(), vec!["exec:echo a".to_string(), "exec:echo b".to_string()]);
}

#[tokio::test]
async fn scripted_result_overrides_default() {
    let mock = MockTransport::new();
    mock.script(
        "false",
        ExecResult {
            exit_code: 1,
            stderr: "boom".to_string(),
            ..Default::default()
        },
    );
    let token = CancellationToken::new();
    let result = mock.exec("false", &token).await;
    assert_eq!(result.exit_code, 1);
    assert_eq!(result.stderr, "boom");
    assert!(!result.success());
}

#[tokio::test]
async fn unscripted_command_defaults_to_success() {
    let mock = MockTransport::new();
    let token = CancellationToken::new();
    let result = mock.exec("echo hi", &token).await;
    assert!(result.success());
}

#[tokio::test]
async fn copy_dir_and_close_are_recorded() {
    let mock = MockTransport::new();
    let sync = crate::config::types::SyncConfig::default();
    mock.copy_dir(Path::new("/local"), "~/rr/proj", &sync).await.unwrap();
    mock.close().await;
    assert_eq!(
        mock.calls(),
        vec!["copy_dir:~/rr/proj".to_string(), "close".to_string()]
    );
}
