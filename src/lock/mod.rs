// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Distributed mutual-exclusion lock (`spec.md` §4.8): a directory-based
//! lock on the remote filesystem, atomic `mkdir` serving as the test-and-set.
//!
//! ```text
//!          ┌──── acquired ────► HELD ──refresh─► HELD
//!   IDLE ──┤
//!          └── directory exists ─► INSPECT
//!                                   │
//!                                   ├─ stale  → force-break → IDLE
//!                                   └─ fresh  → wait → retry  (up to timeout)
//!
//! acquire(transport, cfg, host, project, token) -> LockGuard
//!   LockGuard::release()   -- explicit, idempotent
//!   LockGuard::drop()      -- best-effort fire-and-forget release
//!
//! acquire_round_robin(hosts, ...) -- rotates candidates while each is held,
//!   bounded by `lock.wait_timeout_secs` (multi-host fleets only)
//! ```

pub mod types;

use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use self::types::LockInfo;
use crate::config::expand;
use crate::config::types::LockConfig;
use crate::error::{LockError, RrError, RrResult};
use crate::transport::Transport;
use crate::utility::safety;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const RETRY_INTERVAL: Duration = Duration::from_secs(2);

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs())
}

fn lock_path(cfg: &LockConfig, project: &str, host: &str) -> String {
    format!("{}/{}-{}", cfg.dir.trim_end_matches('/'), project, host)
}

/// Acquires the lock for `project` on `host`, retrying while the current
/// holder's heartbeat is fresh and force-breaking it once it goes stale,
/// bounded by `cfg.timeout_secs` (`spec.md` §4.8).
///
/// # Errors
///
/// Returns [`LockError::WaitTimeout`] if no fresh holder ever releases within
/// the timeout, or [`RrError::Cancelled`] if `token` fires first.
pub async fn acquire(
    transport: Arc<Transport>,
    cfg: &LockConfig,
    host: &str,
    project: &str,
    token: &CancellationToken,
) -> RrResult<LockGuard> {
    let dir = lock_path(cfg, project, host);
    let deadline = Instant::now() + Duration::from_secs(cfg.timeout_secs);
    let holder = expand::resolve_user();
    let pid = process::id();

    loop {
        if token.is_cancelled() {
            return Err(RrError::Cancelled);
        }

        if try_mkdir(&transport, &dir, token).await? {
            let info = LockInfo::new(holder.clone(), host.to_string(), project.to_string(), pid, now_secs(), String::new());
            write_info(&transport, &dir, &info, token).await?;
            return Ok(LockGuard::new(transport, dir, host.to_string(), project.to_string()));
        }

        match read_info(&transport, &dir, token).await {
            Some(info) if info.age_secs(now_secs()) <= cfg.stale_secs => {
                if Instant::now() >= deadline {
                    return Err(LockError::WaitTimeout {
                        host: host.to_string(),
                        project: project.to_string(),
                        waited_secs: cfg.timeout_secs,
                    }
                    .into());
                }
                debug!(%dir, holder = %info.holder, "lock held, waiting");
                tokio::select! {
                    () = tokio::time::sleep(RETRY_INTERVAL) => {}
                    () = token.cancelled() => return Err(RrError::Cancelled),
                }
            }
            Some(info) => {
                warn!(%dir, holder = %info.holder, age_secs = info.age_secs(now_secs()), "breaking stale lock");
                force_break(&transport, &dir, &cfg.dir, token).await?;
            }
            None => {
                warn!(%dir, "lock directory unreadable or missing info.json, breaking");
                force_break(&transport, &dir, &cfg.dir, token).await?;
            }
        }

        // A break that doesn't actually free the directory (another racer
        // wins every `mkdir`, or the filesystem is wedged) must not spin
        // forever; bound it by the same deadline as the fresh-holder wait.
        if Instant::now() >= deadline {
            return Err(LockError::WaitTimeout {
                host: host.to_string(),
                project: project.to_string(),
                waited_secs: cfg.timeout_secs,
            }
            .into());
        }
    }
}

/// Rotates through `hosts`, attempting [`acquire`] on each in order and
/// returning the first success, bounded overall by `cfg.wait_timeout_secs`
/// (`spec.md` §4.8 "Multi-host round-robin"; Open Question: restricted to
/// fleets with more than one candidate host).
///
/// # Errors
///
/// Returns the last host's [`LockError::Held`]-shaped error if every host is
/// locked when the round-robin's overall timeout elapses.
pub async fn acquire_round_robin(
    connect: impl Fn(&str) -> std::pin::Pin<Box<dyn std::future::Future<Output = RrResult<Arc<Transport>>> + Send>>,
    cfg: &LockConfig,
    hosts: &[String],
    project: &str,
    token: &CancellationToken,
) -> RrResult<LockGuard> {
    let deadline = Instant::now() + Duration::from_secs(cfg.wait_timeout_secs);
    let mut last_err = None;

    loop {
        for host in hosts {
            if token.is_cancelled() {
                return Err(RrError::Cancelled);
            }
            let transport = connect(host).await?;
            let attempt_budget = Duration::from_secs(cfg.timeout_secs).min(
                deadline.saturating_duration_since(Instant::now()),
            );
            let mut single_host_cfg = cfg.clone();
            single_host_cfg.timeout_secs = attempt_budget.as_secs().max(1);
            match Box::pin(acquire(transport, &single_host_cfg, host, project, token)).await {
                Ok(guard) => return Ok(guard),
                Err(err) => last_err = Some(err),
            }
        }
        if Instant::now() >= deadline {
            return Err(last_err.unwrap_or(
                LockError::WaitTimeout {
                    host: hosts.join(","),
                    project: project.to_string(),
                    waited_secs: cfg.wait_timeout_secs,
                }
                .into(),
            ));
        }
    }
}

/// Unconditionally removes the lock directory for `project` on `host`,
/// regardless of heartbeat freshness. Backs the `rr host unlock` operator
/// escape hatch (`spec.md` §6's CLI surface names `unlock` as a reserved
/// verb; this is the library-level operation it dispatches to).
///
/// # Errors
///
/// Returns [`crate::error::RrError::DangerousPath`] if the computed lock
/// directory fails [`safety::validate_removal_path`], or a
/// [`LockError::Io`]-shaped error if the remote removal itself fails.
pub async fn force_release(transport: &Transport, cfg: &LockConfig, host: &str, project: &str, token: &CancellationToken) -> RrResult<()> {
    let dir = lock_path(cfg, project, host);
    force_break(transport, &dir, &cfg.dir, token).await
}

async fn try_mkdir(transport: &Transport, dir: &str, token: &CancellationToken) -> RrResult<bool> {
    let cmd = format!(
        "mkdir {} 2>/dev/null && echo __RR_LOCK_OK__ || echo __RR_LOCK_EXISTS__",
        shell_escape::escape(dir.into())
    );
    let result = transport.exec(&cmd, token).await;
    if let Some(err) = result.error {
        return Err(LockError::Io { host: dir.to_string(), message: err }.into());
    }
    Ok(result.stdout.contains("__RR_LOCK_OK__"))
}

async fn write_info(transport: &Transport, dir: &str, info: &LockInfo, token: &CancellationToken) -> RrResult<()> {
    let json = serde_json::to_string(info).map_err(|e| LockError::Io {
        host: dir.to_string(),
        message: e.to_string(),
    })?;
    let cmd = format!(
        "cat > {}/info.json <<'RR_LOCK_EOF'\n{json}\nRR_LOCK_EOF",
        shell_escape::escape(dir.into())
    );
    let result = transport.exec(&cmd, token).await;
    if !result.success() {
        return Err(LockError::Io {
            host: dir.to_string(),
            message: result.error.unwrap_or(result.stderr),
        }
        .into());
    }
    Ok(())
}

async fn read_info(transport: &Transport, dir: &str, token: &CancellationToken) -> Option<LockInfo> {
    let cmd = format!("cat {}/info.json 2>/dev/null", shell_escape::escape(dir.into()));
    let result = transport.exec(&cmd, token).await;
    if !result.success() || result.stdout.trim().is_empty() {
        return None;
    }
    serde_json::from_str(&result.stdout).ok()
}

async fn force_break(transport: &Transport, dir: &str, lock_root: &str, token: &CancellationToken) -> RrResult<()> {
    safety::validate_removal_path(dir, Some(lock_root))?;
    let cmd = format!("rm -rf {}", shell_escape::escape(dir.into()));
    let result = transport.exec(&cmd, token).await;
    if !result.success() {
        return Err(LockError::Io {
            host: dir.to_string(),
            message: result.error.unwrap_or(result.stderr),
        }
        .into());
    }
    Ok(())
}

/// RAII handle on an acquired lock. Drives a background heartbeat while held
/// and releases unconditionally on every exit path, including panic
/// unwinding, matching `spec.md` §4.8's "release is unconditional" invariant.
///
/// Modelled on the teacher's `PartialFileGuard` (`net.rs`): an explicit
/// `release()` for the cooperative path, and a `Drop` that does its best
/// when the caller never reaches it. Unlike a local file delete, releasing
/// this lock is an async remote operation, so `Drop` can only fire a
/// detached cleanup task rather than block.
pub struct LockGuard {
    transport: Arc<Transport>,
    dir: String,
    host: String,
    project: String,
    released: Arc<AtomicBool>,
    heartbeat: Option<JoinHandle<()>>,
}

impl LockGuard {
    fn new(transport: Arc<Transport>, dir: String, host: String, project: String) -> Self {
        let released = Arc::new(AtomicBool::new(false));
        let heartbeat = spawn_heartbeat(Arc::clone(&transport), dir.clone(), Arc::clone(&released));
        Self {
            transport,
            dir,
            host,
            project,
            released,
            heartbeat: Some(heartbeat),
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Releases the lock, stopping the heartbeat and removing its directory.
    /// Idempotent: a second call is a no-op.
    pub async fn release(mut self) -> RrResult<()> {
        self.release_inner().await
    }

    async fn release_inner(&mut self) -> RrResult<()> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
        let token = CancellationToken::new();
        let cmd = format!("rm -rf {}", shell_escape::escape(self.dir.clone().into()));
        let result = self.transport.exec(&cmd, &token).await;
        if !result.success() {
            return Err(LockError::Io {
                host: self.host.clone(),
                message: result.error.unwrap_or(result.stderr),
            }
            .into());
        }
        Ok(())
    }
}

fn spawn_heartbeat(transport: Arc<Transport>, dir: String, released: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let token = CancellationToken::new();
        loop {
            tokio::time::sleep(HEARTBEAT_INTERVAL).await;
            if released.load(Ordering::SeqCst) {
                return;
            }
            if let Some(mut info) = read_info(&transport, &dir, &token).await {
                info.heartbeat_at = now_secs();
                let _ = write_info(&transport, &dir, &info, &token).await;
            }
        }
    })
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
        let transport = Arc::clone(&self.transport);
        let dir = self.dir.clone();
        tokio::spawn(async move {
            let token = CancellationToken::new();
            let cmd = format!("rm -rf {}", shell_escape::escape(dir.into()));
            let _ = transport.exec(&cmd, &token).await;
        });
    }
}
