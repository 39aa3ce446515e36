// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Host liveness probing and selection (`spec.md` §4.3, §4.4).
//!
//! ```text
//! prober::probe_aliases(aliases, shell, timeout) -> Vec<ProbeResult>
//! selector::Selector
//!   resolve_host() / ordered_host_names() / host_info() / eligible_host_names()
//!   connection()   -- lazy, cached per host name
//!   teardown()     -- closes every cached connection
//! ```

pub mod prober;
pub mod selector;
