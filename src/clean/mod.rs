// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Clean scanner (`spec.md` §4.9): finds remote branch-suffixed working
//! directories whose branch is no longer "active" and removes them.
//!
//! ```text
//! discover(transport, template, vars, active_branches, token)
//!   expand template to a glob (§4.1); nil if it lacks ${BRANCH}
//!   `ls -d <glob> 2>/dev/null`           -- nonzero exit is an error
//!   extract_branch_from_path() per entry -- drop active branches
//!   `du -sk <path>` per stale candidate
//!
//! remove(transport, stale, lock_dir, token) -> (removed, errors)
//!   validate_removal_path() before every `rm -rf`
//! ```

use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;

use crate::config::expand::{self, Variables};
use crate::error::{RrError, RrResult};
use crate::transport::Transport;
use crate::utility::safety;

/// One remote working directory whose branch segment is not in the active
/// set.
#[derive(Debug, Clone)]
pub struct StaleDir {
    pub path: String,
    pub branch: String,
    pub size_bytes: Option<u64>,
}

/// Discovers stale directories under `template` (`spec.md` §4.9 steps 1-4).
///
/// Returns `Ok(None)` if `template` lacks `${BRANCH}` (nothing to scan).
///
/// # Errors
///
/// Returns [`crate::error::TransportError`]-shaped errors if the remote
/// listing exits non-zero.
pub async fn discover(
    transport: &Transport,
    template: &str,
    vars: &Variables,
    active_branches: &BTreeSet<String>,
    token: &CancellationToken,
) -> RrResult<Option<Vec<StaleDir>>> {
    let (glob, had_branch) = expand::expand_glob(template, vars);
    if !had_branch {
        return Ok(None);
    }

    let cmd = format!("ls -d {} 2>/dev/null", quote_glob(&glob));
    let listing = transport.exec(&cmd, token).await;
    // A non-zero exit with empty stdout is the glob's "no matches" case
    // (`spec.md` §4.9 step 2); a non-zero exit that still produced output,
    // or a transport-level error, is a genuine listing failure (step 3).
    if !listing.success() && (listing.error.is_some() || !listing.stdout.trim().is_empty()) {
        return Err(RrError::Other(
            listing.error.unwrap_or(listing.stderr).into_boxed_str(),
        ));
    }

    let mut stale = Vec::new();
    for path in listing.stdout.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let Some(branch) = expand::extract_branch_from_path(template, path) else {
            continue;
        };
        if active_branches.contains(&branch) {
            continue;
        }
        let size_bytes = remote_dir_size(transport, path, token).await;
        stale.push(StaleDir {
            path: path.to_string(),
            branch,
            size_bytes,
        });
    }

    Ok(Some(stale))
}

/// Shell-quotes the literal portion of a glob while preserving a leading
/// `~/` and the trailing unescaped `*` (`spec.md` §4.9 step 2).
#[must_use]
pub fn quote_glob(glob: &str) -> String {
    let (prefix, home_relative) = glob.strip_prefix("~/").map_or((glob, false), |rest| (rest, true));
    let (literal, star) = prefix.strip_suffix('*').map_or((prefix, false), |rest| (rest, true));

    let mut out = String::new();
    if home_relative {
        out.push_str("~/");
    }
    out.push_str(&shell_escape::escape(literal.into()));
    if star {
        out.push('*');
    }
    out
}

async fn remote_dir_size(transport: &Transport, path: &str, token: &CancellationToken) -> Option<u64> {
    let cmd = format!("du -sk {} 2>/dev/null | cut -f1", shell_escape::escape(path.into()));
    let result = transport.exec(&cmd, token).await;
    if !result.success() {
        return None;
    }
    result.stdout.trim().parse::<u64>().ok().map(|kb| kb * 1024)
}

/// Removes every entry in `stale`, refusing any path outside `lock_dir`'s
/// sibling working-directory root via [`safety::validate_removal_path`]
/// (`spec.md` §4.9 step 5, §4.8 "Safety").
///
/// Returns the paths actually removed and a parallel list of per-entry
/// errors; one bad path does not abort the others.
pub async fn remove(
    transport: &Transport,
    stale: &[StaleDir],
    expected_prefix: Option<&str>,
    token: &CancellationToken,
) -> (Vec<String>, Vec<(String, RrError)>) {
    let mut removed = Vec::new();
    let mut errors = Vec::new();

    for dir in stale {
        if let Err(err) = safety::validate_removal_path(&dir.path, expected_prefix) {
            errors.push((dir.path.clone(), err));
            continue;
        }
        let cmd = format!("rm -rf {}", shell_escape::escape(dir.path.clone().into()));
        let result = transport.exec(&cmd, token).await;
        if result.success() {
            removed.push(dir.path.clone());
        } else {
            errors.push((
                dir.path.clone(),
                RrError::Other(result.error.unwrap_or(result.stderr).into_boxed_str()),
            ));
        }
    }

    (removed, errors)
}

#[cfg(test)]
mod tests;
