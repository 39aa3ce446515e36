// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Parallel connectivity probing across connection aliases (`spec.md` §4.3).
//!
//! ```text
//! probe_aliases(aliases, shell, timeout, make_transport)
//!   one tokio task per alias, each with its own deadline
//!   joined in *input order*, not completion order (§5 "Probe results
//!   preserve input alias order regardless of completion order")
//! ```

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::ProbeErrorKind;
use crate::transport::Transport;

/// Outcome of probing one alias.
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    Success { latency: Duration },
    Failure { kind: ProbeErrorKind, message: String },
}

impl ProbeOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Result of probing a single alias, preserving the alias it came from.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub alias: String,
    pub outcome: ProbeOutcome,
}

/// A trivial command a live host can always answer quickly; only the exit
/// status and any transport error matter, not the output.
const PROBE_COMMAND: &str = "true";

/// Probes every alias in parallel, one suspension point per alias, bounded
/// by `timeout`. Returns one [`ProbeResult`] per input alias, in the same
/// order the aliases were given — the probes race, but the join does not.
pub async fn probe_aliases(
    aliases: &[String],
    shell: &str,
    timeout: Duration,
    make_transport: impl Fn(&str, &str) -> Transport,
) -> Vec<ProbeResult> {
    if aliases.is_empty() {
        return Vec::new();
    }

    let mut handles = Vec::with_capacity(aliases.len());
    for alias in aliases {
        let transport = make_transport(alias, shell);
        let alias = alias.clone();
        handles.push(tokio::spawn(async move { probe_one(alias, &transport, timeout).await }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for (alias, handle) in aliases.iter().zip(handles) {
        let result = handle.await.unwrap_or_else(|join_err| ProbeResult {
            alias: alias.clone(),
            outcome: ProbeOutcome::Failure {
                kind: ProbeErrorKind::Unknown,
                message: format!("probe task panicked: {join_err}"),
            },
        });
        results.push(result);
    }
    results
}

async fn probe_one(alias: String, transport: &Transport, timeout: Duration) -> ProbeResult {
    let token = CancellationToken::new();
    let start = Instant::now();

    let outcome = match tokio::time::timeout(timeout, transport.exec(PROBE_COMMAND, &token)).await {
        Ok(result) => {
            if let Some(message) = result.error {
                ProbeOutcome::Failure {
                    kind: ProbeErrorKind::classify(&message),
                    message,
                }
            } else if result.exit_code == 0 {
                ProbeOutcome::Success {
                    latency: start.elapsed(),
                }
            } else {
                ProbeOutcome::Failure {
                    kind: ProbeErrorKind::Unknown,
                    message: format!("probe command exited with code {}", result.exit_code),
                }
            }
        }
        Err(_elapsed) => ProbeOutcome::Failure {
            kind: ProbeErrorKind::Timeout,
            message: format!("probe timed out after {timeout:?}"),
        },
    };

    ProbeResult { alias, outcome }
}
