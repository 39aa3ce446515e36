// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! The `Exec`/`CopyDir`/`Close` collaborator contract (`spec.md` §6) plus its
//! implementations.
//!
//! ```text
//! Transport::Ssh(SshTransport)     -- shells out to `ssh`/`rsync`
//! Transport::Local(LocalTransport) -- direct process spawn + recursive copy
//! Transport::Mock(MockTransport)   -- records calls, returns scripted results
//! ```
//!
//! A plain enum, not a `dyn Trait`, per `spec.md` §9's "Polymorphism" design
//! note: the three variants are capability sets with no shared state or
//! inheritance, just record-like implementations dispatched by `match`.

pub mod local;
pub mod mock;
pub mod ssh;

use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::config::types::SyncConfig;
use crate::error::RrResult;

/// Result of one `Exec` call (`spec.md` §6): captured output, exit code, and
/// an optional transport-level error (connection lost, tool missing).
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub error: Option<String>,
}

impl ExecResult {
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0 && self.error.is_none()
    }
}

/// The `Transport` collaborator: runs one remote command, synchronises a
/// directory tree, and releases any held session.
#[derive(Clone)]
pub enum Transport {
    Ssh(ssh::SshTransport),
    Local(local::LocalTransport),
    Mock(mock::MockTransport),
}

impl Transport {
    /// Runs one command through this transport. Never panics; transport
    /// failures are reported in [`ExecResult::error`], not as a `Result` err,
    /// matching the `Exec(cmd) → (stdout, stderr, exitCode, err)` contract.
    pub async fn exec(&self, cmd: &str, token: &CancellationToken) -> ExecResult {
        match self {
            Self::Ssh(t) => t.exec(cmd, token).await,
            Self::Local(t) => t.exec(cmd, token).await,
            Self::Mock(t) => t.exec(cmd, token).await,
        }
    }

    /// Synchronises `local_root` into `remote_root`, honouring the given
    /// sync preferences.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::RrError::Transport`] if the required tool
    /// is missing or the copy itself fails.
    pub async fn copy_dir(&self, local_root: &Path, remote_root: &str, sync: &SyncConfig) -> RrResult<()> {
        match self {
            Self::Ssh(t) => t.copy_dir(local_root, remote_root, sync).await,
            Self::Local(t) => t.copy_dir(local_root, remote_root, sync).await,
            Self::Mock(t) => t.copy_dir(local_root, remote_root, sync).await,
        }
    }

    /// Releases any held session. Idempotent.
    pub async fn close(&self) {
        match self {
            Self::Ssh(t) => t.close().await,
            Self::Local(t) => t.close().await,
            Self::Mock(t) => t.close().await,
        }
    }
}
