// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Environment variable management.
//!
//! ```text
//! Env (copy-on-write BTreeMap<String, String>)
//! Sources: current_env(), Env::empty()
//! Ops: set/get/merged (host ≺ project ≺ task precedence)
//! ```
//!
//! - **Copy-on-write**: Clones share data until modified
//! - **Deterministic order**: backed by `BTreeMap`

pub mod container;
pub mod types;


/// Captures the current process environment.
#[must_use]
pub fn current_env() -> container::Env {
    let vars = std::env::vars().collect();
    container::Env::from_map(vars)
}
