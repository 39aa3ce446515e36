// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! The `info.json` payload written inside an acquired lock directory
//! (`spec.md` §4.8).

use serde::{Deserialize, Serialize};

/// Holder metadata written to `<lock-dir>/info.json` on acquisition and
/// refreshed on each heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub holder: String,
    pub host: String,
    pub project: String,
    pub pid: u32,
    pub acquired_at: u64,
    pub heartbeat_at: u64,
    pub message: String,
}

impl LockInfo {
    #[must_use]
    pub fn new(holder: String, host: String, project: String, pid: u32, now: u64, message: String) -> Self {
        Self {
            holder,
            host,
            project,
            pid,
            acquired_at: now,
            heartbeat_at: now,
            message,
        }
    }

    /// Seconds since this holder's last heartbeat, saturating at zero if the
    /// clock has moved backwards.
    #[must_use]
    pub fn age_secs(&self, now: u64) -> u64 {
        now.saturating_sub(self.heartbeat_at)
    }
}
