// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Host selection and connection pooling (`spec.md` §4.4).
//!
//! ```text
//! Selector::new(resolved)
//!   resolve_host(preferred)      -- preferred > project host/hosts > priority > lexicographic
//!   ordered_host_names()         -- priority list, then lexicographic tiebreak
//!   eligible_host_names(task)    -- filtered by the task's host-restriction list
//!   host_info()                  -- display snapshot
//!   connection(name)             -- lazy, probes aliases in order, caches first success
//!   teardown()                   -- closes every cached connection
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use super::prober::{self, ProbeOutcome};
use crate::config::merge::ResolvedConfig;
use crate::config::types::{Host, Task};
use crate::error::{RrResult, TaskError};
use crate::transport::Transport;
use crate::transport::ssh::SshTransport;

/// Display snapshot of one configured host (`spec.md` §4.4 `HostInfo()`).
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub name: String,
    pub aliases: Vec<String>,
    pub dir: String,
    pub tags: Vec<String>,
}

/// Owns the configured hosts and lazily-constructed connections, reused
/// across tasks within one run (`spec.md` §3 "Ownership and lifecycle":
/// connection objects are owned by the Selector, closed exactly once on
/// teardown).
pub struct Selector {
    resolved: Arc<ResolvedConfig>,
    connections: Mutex<BTreeMap<String, Arc<Transport>>>,
}

impl Selector {
    #[must_use]
    pub fn new(resolved: Arc<ResolvedConfig>) -> Self {
        Self {
            resolved,
            connections: Mutex::new(BTreeMap::new()),
        }
    }

    /// `resolveHost(preferred)` (`spec.md` §4.4): preferred, then the
    /// project's configured host, then priority order, then lexicographic.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NoHosts`] when zero hosts are configured and
    /// local fallback is disabled.
    pub fn resolve_host(&self, preferred: Option<&str>) -> RrResult<String> {
        if let Some(name) = preferred
            && self.resolved.host(name).is_some()
        {
            return Ok(name.to_string());
        }

        for name in self.resolved.candidate_hosts() {
            if self.resolved.host(&name).is_some() {
                return Ok(name);
            }
        }

        if let Some(name) = self.ordered_host_names().into_iter().next() {
            return Ok(name);
        }

        if self.resolved.local_fallback() {
            return Ok(String::new());
        }

        Err(TaskError::NoHosts.into())
    }

    /// Deterministic iteration order: the fleet's configured priority list
    /// first, then any remaining hosts lexicographically.
    #[must_use]
    pub fn ordered_host_names(&self) -> Vec<String> {
        let priority = &self.resolved.global.defaults.host_priority;
        let mut ordered = Vec::new();
        for name in priority {
            if self.resolved.host(name).is_some() {
                ordered.push(name.clone());
            }
        }
        let mut rest: Vec<String> = self
            .resolved
            .hosts()
            .keys()
            .filter(|name| !ordered.contains(name))
            .cloned()
            .collect();
        rest.sort();
        ordered.extend(rest);
        ordered
    }

    /// Snapshot of every configured host, for display (`rr host status`).
    #[must_use]
    pub fn host_info(&self) -> Vec<HostInfo> {
        self.ordered_host_names()
            .into_iter()
            .filter_map(|name| {
                self.resolved.host(&name).map(|host| HostInfo {
                    name: name.clone(),
                    aliases: host.aliases.clone(),
                    dir: host.dir.clone(),
                    tags: host.tags.clone(),
                })
            })
            .collect()
    }

    /// Hosts eligible for `task`: every configured host if the task's
    /// restriction list is empty, otherwise only the named hosts
    /// (`spec.md` §4.4 "Tag filtering").
    #[must_use]
    pub fn eligible_host_names(&self, task: &Task) -> Vec<String> {
        if task.hosts.is_empty() {
            return self.ordered_host_names();
        }
        self.ordered_host_names()
            .into_iter()
            .filter(|name| task.hosts.contains(name))
            .collect()
    }

    /// Lazily establishes (or returns the cached) connection for `host_name`,
    /// probing aliases in listed order and keeping the transport built from
    /// the first alias that answers successfully.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::RrError::Probe`] if every alias fails, or
    /// [`TaskError::NotFound`] if `host_name` is not configured.
    pub async fn connection(&self, host_name: &str) -> RrResult<Arc<Transport>> {
        {
            let cached = self.connections.lock().await;
            if let Some(transport) = cached.get(host_name) {
                return Ok(Arc::clone(transport));
            }
        }

        let host = self
            .resolved
            .host(host_name)
            .ok_or_else(|| TaskError::NotFound(host_name.to_string()))?;

        let transport = Arc::new(self.establish(host).await?);

        let mut cached = self.connections.lock().await;
        Ok(Arc::clone(
            cached.entry(host_name.to_string()).or_insert(transport),
        ))
    }

    async fn establish(&self, host: &Host) -> RrResult<Transport> {
        let timeout = Duration::from_secs(self.resolved.global.defaults.probe_timeout_secs);
        let shell = host.shell_or_default().to_string();
        let results = prober::probe_aliases(&host.aliases, &shell, timeout, |alias, shell| {
            Transport::Ssh(SshTransport::new(alias, shell))
        })
        .await;

        for result in &results {
            if result.outcome.is_success() {
                return Ok(Transport::Ssh(SshTransport::new(result.alias.clone(), shell.clone())));
            }
        }

        let last_failure = results.into_iter().rev().find_map(|result| match result.outcome {
            ProbeOutcome::Failure { kind, message } => Some(crate::error::ProbeError {
                alias: result.alias,
                kind,
                message,
            }),
            ProbeOutcome::Success { .. } => None,
        });

        Err(last_failure.map_or_else(
            || TaskError::NoHosts.into(),
            std::convert::Into::into,
        ))
    }

    /// Closes every cached connection. Guarantees release on every exit path
    /// including panic unwinding, since it only iterates already-owned
    /// `Arc<Transport>`s with no fallible operations.
    pub async fn teardown(&self) {
        let mut cached = self.connections.lock().await;
        for (_, transport) in cached.iter() {
            transport.close().await;
        }
        cached.clear();
    }
}

#[cfg(test)]
mod tests;
