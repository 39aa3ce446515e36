// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Combines the two config layers into one resolved view (`spec.md` §3
//! "Resolved config = {global, project, source-tag}").

use super::types::{ConfigSource, GlobalConfig, Host, ProjectConfig, Task};
use std::collections::BTreeMap;

/// The merged view of global (fleet-wide) and project (per-directory)
/// configuration used by every downstream component (C2-C9).
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub global: GlobalConfig,
    pub project: ProjectConfig,
    pub source: ConfigSource,
}

impl ResolvedConfig {
    #[must_use]
    pub fn new(global: GlobalConfig, project: ProjectConfig, source: ConfigSource) -> Self {
        Self {
            global,
            project,
            source,
        }
    }

    #[must_use]
    pub fn hosts(&self) -> &BTreeMap<String, Host> {
        &self.global.hosts
    }

    #[must_use]
    pub fn host(&self, name: &str) -> Option<&Host> {
        self.global.hosts.get(name)
    }

    #[must_use]
    pub fn tasks(&self) -> &BTreeMap<String, Task> {
        &self.project.tasks
    }

    #[must_use]
    pub fn task(&self, name: &str) -> Option<&Task> {
        self.project.tasks.get(name)
    }

    /// Candidate host names for this project: `host` if set, else `hosts`.
    #[must_use]
    pub fn candidate_hosts(&self) -> Vec<String> {
        self.project.host.clone().map_or_else(
            || self.project.hosts.clone(),
            |preferred| vec![preferred],
        )
    }

    #[must_use]
    pub const fn local_fallback(&self) -> bool {
        self.global.defaults.local_fallback || self.project.local_fallback
    }
}

#[cfg(test)]
mod tests;
