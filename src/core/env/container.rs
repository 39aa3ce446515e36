// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Environment variable struct and copy-on-write implementation.
//!
//! ```text
//! Env (copy-on-write)
//! data: Option<Arc<EnvData>> + owned flag
//! clone shares Arc until copy_for_write()
//! ```

use super::types::{EnvData, EnvFlags};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A set of environment variables with copy-on-write semantics.
///
/// This struct provides efficient cloning by sharing data between copies
/// until a modification is made.
///
/// # Thread Safety
/// `Env` is `Send` and `Sync` due to its use of `Arc`.
#[derive(Debug, Clone)]
pub struct Env {
    data: Option<Arc<EnvData>>,
    owned: bool,
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl Env {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: None,
            owned: false,
        }
    }

    /// Creates an environment from a map of variables.
    #[must_use]
    pub fn from_map(vars: BTreeMap<String, String>) -> Self {
        Self {
            data: Some(Arc::new(EnvData::from_vars(vars))),
            owned: true,
        }
    }

    /// Merges `overlay` on top of `self`, with entries in `overlay` winning on
    /// key collision. Used for the host ≺ project ≺ task environment
    /// precedence (`spec.md` §4.6).
    #[must_use]
    pub fn merged(&self, overlay: &Self) -> Self {
        let mut result = self.to_map();
        for (k, v) in overlay.iter() {
            result.insert(k.to_string(), v.to_string());
        }
        Self::from_map(result)
    }

    /// Sets an environment variable.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.set_with_flags(key, value, EnvFlags::Replace)
    }

    /// Sets an environment variable with specific flags.
    pub fn set_with_flags(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        flags: EnvFlags,
    ) -> &mut Self {
        self.copy_for_write();
        let key = key.into();
        let value = value.into();

        if let Some(ref mut data) = self.data {
            let data = Arc::make_mut(data);

            match flags {
                EnvFlags::Replace => {
                    data.vars_mut().insert(key, value);
                }
                EnvFlags::Append => {
                    if let Some(existing) = data.vars_mut().get_mut(&key) {
                        existing.push_str(&value);
                    } else {
                        data.vars_mut().insert(key, value);
                    }
                }
                EnvFlags::Prepend => {
                    if let Some(existing) = data.vars_mut().get_mut(&key) {
                        let mut new_value = value;
                        new_value.push_str(existing);
                        *existing = new_value;
                    } else {
                        data.vars_mut().insert(key, value);
                    }
                }
            }
        }

        self
    }

    /// Gets an environment variable value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.vars().get(key).map(std::string::String::as_str))
    }

    /// Removes an environment variable.
    pub fn remove(&mut self, key: &str) -> &mut Self {
        self.copy_for_write();
        if let Some(ref mut data) = self.data {
            let data = Arc::make_mut(data);
            data.vars_mut().remove(key);
        }
        self
    }

    /// Returns all environment variables as a map.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.data
            .as_ref()
            .map(|d| d.vars().clone())
            .unwrap_or_default()
    }

    /// Returns an iterator over environment variables.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.data
            .iter()
            .flat_map(|d| d.vars().iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Returns true if no variables are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.as_ref().is_none_or(|d| d.vars().is_empty())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.vars().len())
    }

    /// Ensures we have exclusive ownership of the data for modification.
    pub fn copy_for_write(&mut self) {
        if self.owned {
            return;
        }

        match &self.data {
            Some(data) => {
                self.data = Some(Arc::new((**data).clone()));
            }
            None => {
                self.data = Some(Arc::new(EnvData::new()));
            }
        }

        self.owned = true;
    }
}
