// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Types for environment variable management.
//!
//! ```text
//! EnvFlags: Replace | Append | Prepend
//! EnvData:  BTreeMap<String, String> for deterministic order
//! ```

use std::collections::BTreeMap;

/// Flags for environment variable operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvFlags {
    /// Replace the existing value (default)
    #[default]
    Replace,
    /// Append to the existing value
    Append,
    /// Prepend to the existing value
    Prepend,
}

/// Backing storage for [`super::container::Env`].
#[derive(Debug, Clone, Default)]
pub(super) struct EnvData {
    vars: BTreeMap<String, String>,
}

impl EnvData {
    pub(super) const fn new() -> Self {
        Self {
            vars: BTreeMap::new(),
        }
    }

    pub(super) fn from_vars(vars: BTreeMap<String, String>) -> Self {
        Self { vars }
    }

    pub(super) const fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    pub(super) fn vars_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.vars
    }
}
