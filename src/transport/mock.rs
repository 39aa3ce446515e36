// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! In-memory [`super::Transport`] variant used across `host`, `lock`,
//! `executor`, `orchestrator`, and `clean` unit tests in place of a real SSH
//! connection (`SPEC_FULL.md` §9 "Test tooling"). Public (not
//! `#[cfg(test)]`-gated) so it can be shared across module boundaries.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::ExecResult;
use crate::config::types::SyncConfig;
use crate::error::RrResult;

/// Records every call made through it and returns scripted results keyed by
/// exact command string, falling back to a default success result.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    calls: Arc<Mutex<Vec<String>>>,
    scripted: Arc<Mutex<BTreeMap<String, ExecResult>>>,
    delays: Arc<Mutex<BTreeMap<String, Duration>>>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the result returned for an exact command string.
    pub fn script(&self, cmd: impl Into<String>, result: ExecResult) {
        self.scripted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(cmd.into(), result);
    }

    /// Makes `exec` sleep `delay` before returning its scripted result for
    /// `cmd`, used to exercise per-task timeout bounding (`spec.md` §5)
    /// under a paused `tokio::test` clock.
    pub fn script_delay(&self, cmd: impl Into<String>, delay: Duration) {
        self.delays
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(cmd.into(), delay);
    }

    /// Every call made through this transport, in order, as `"exec:<cmd>"`,
    /// `"copy_dir:<remote_root>"`, or `"close"`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub async fn exec(&self, cmd: &str, _token: &CancellationToken) -> ExecResult {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(format!("exec:{cmd}"));
        let delay = self
            .delays
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(cmd)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.scripted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(cmd)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn copy_dir(&self, _local_root: &Path, remote_root: &str, _sync: &SyncConfig) -> RrResult<()> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(format!("copy_dir:{remote_root}"));
        Ok(())
    }

    pub async fn close(&self) {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push("close".to_string());
    }
}

#[cfg(test)]
mod tests;
