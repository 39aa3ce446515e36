// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Minimal read-only git queries backing `${PROJECT}` and `${BRANCH}`
//! variable resolution (`spec.md` §4.1).
//!
//! ```text
//! discover(path) --> gix::Repository (no subprocess)
//!   current_branch()  -- None on detached HEAD
//!   toplevel()         -- worktree root
//!   remote_url("origin")
//! ```
//!
//! Only read access is needed: `rr` never mutates the local repository, it
//! only reads it to fill in config template variables.

use std::path::{Path, PathBuf};

/// Returns true if `path` is inside a git work tree.
#[must_use]
pub fn is_git_repo(path: &Path) -> bool {
    gix::discover(path).is_ok()
}

/// Current branch name, or `None` when `HEAD` is detached or `path` is not
/// inside a repository.
#[must_use]
pub fn current_branch(path: &Path) -> Option<String> {
    let repo = gix::discover(path).ok()?;
    let head = repo.head_name().ok()??;
    Some(head.shorten().to_string())
}

/// Absolute path to the repository's worktree root, or `None` if `path` is
/// not inside a repository or the repository is bare.
#[must_use]
pub fn toplevel(path: &Path) -> Option<PathBuf> {
    let repo = gix::discover(path).ok()?;
    repo.workdir().map(Path::to_path_buf)
}

/// URL of the named remote (e.g. `"origin"`), or `None` if unset or `path`
/// is not inside a repository.
///
/// Parses `$GIT_DIR/config` directly rather than going through gix's typed
/// config API, since the only thing needed here is one `url =` value under
/// `[remote "name"]`.
#[must_use]
pub fn remote_url(path: &Path, name: &str) -> Option<String> {
    let repo = gix::discover(path).ok()?;
    let config_path = repo.git_dir().join("config");
    let contents = std::fs::read_to_string(config_path).ok()?;
    find_remote_url(&contents, name)
}

/// Finds the `url = ...` value under a `[remote "name"]` section in a git
/// config file's text.
fn find_remote_url(config_text: &str, name: &str) -> Option<String> {
    let header = format!("[remote \"{name}\"]");
    let mut in_section = false;
    for line in config_text.lines() {
        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case(&header) {
            in_section = true;
            continue;
        }
        if trimmed.starts_with('[') {
            in_section = false;
            continue;
        }
        if in_section
            && let Some(rest) = trimmed.strip_prefix("url")
            && let Some(value) = rest.trim_start().strip_prefix('=')
        {
            return Some(value.trim().to_string());
        }
    }
    None
}

/// Derives a repository name from a remote URL, stripping a trailing `.git`
/// and any path/scheme prefix (`spec.md` §4.1's first `${PROJECT}` source).
///
/// Handles both SSH-style (`git@host:org/repo.git`) and URL-style
/// (`https://host/org/repo.git`) remotes.
#[must_use]
pub fn repo_name_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() { None } else { Some(name.to_string()) }
}
