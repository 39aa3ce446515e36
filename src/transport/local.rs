// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Direct-process [`super::Transport`] variant used for local-fallback
//! execution (`spec.md` §4.7, §4.8) and for `doctor`-style self-checks that
//! must not touch the network.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use super::ExecResult;
use crate::config::types::SyncConfig;
use crate::core::process::builder::{ProcessBuilder, ProcessFlags};
use crate::error::{RrResult, TransportError};

/// Runs commands on the invoking machine via its own shell, and copies
/// directories with a recursive `tokio::fs` walk instead of `rsync`.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    shell: String,
}

impl LocalTransport {
    #[must_use]
    pub fn new(shell: impl Into<String>) -> Self {
        Self { shell: shell.into() }
    }

    pub async fn exec(&self, cmd: &str, token: &CancellationToken) -> ExecResult {
        let mut tokens = self.shell.split_whitespace();
        let Some(program) = tokens.next() else {
            return ExecResult {
                exit_code: -1,
                error: Some("empty shell template".to_string()),
                ..Default::default()
            };
        };
        let Some(resolved) = ProcessBuilder::find(program) else {
            return ExecResult {
                exit_code: -1,
                error: Some(
                    TransportError::ToolNotFound {
                        tool: program.to_string(),
                    }
                    .to_string(),
                ),
                ..Default::default()
            };
        };

        let mut builder = ProcessBuilder::new(resolved);
        for token_str in tokens {
            builder = builder.arg(token_str);
        }
        builder = builder.arg(cmd).flag(ProcessFlags::ALLOW_FAILURE).capture_output();

        match builder.run_with_cancellation(token.clone()).await {
            Ok(output) => ExecResult {
                stdout: output.stdout().to_string(),
                stderr: output.stderr().to_string(),
                exit_code: output.exit_code(),
                error: None,
            },
            Err(err) => ExecResult {
                exit_code: -1,
                error: Some(err.to_string()),
                ..Default::default()
            },
        }
    }

    /// # Errors
    ///
    /// Returns a [`TransportError::ConnectionLost`] if the copy fails (the
    /// variant name is reused for a local I/O failure since there is no
    /// dedicated local-copy error category in `spec.md` §7).
    pub async fn copy_dir(&self, local_root: &Path, remote_root: &str, sync: &SyncConfig) -> RrResult<()> {
        let dst = PathBuf::from(remote_root);
        crate::utility::fs::copy_dir_filtered(local_root, &dst, &sync.exclude)
            .await
            .map_err(|err| TransportError::ConnectionLost {
                alias: "local".to_string(),
                message: err.to_string(),
            })?;
        Ok(())
    }

    pub async fn close(&self) {}
}
