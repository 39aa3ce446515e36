// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Variable expansion (`spec.md` §4.1).
//!
//! ```text
//! expand_local(template)   -- ${HOME} ${USER} ${PROJECT} ${BRANCH}, ~ untouched
//! expand_remote(template)  -- ${HOME} -> ~, others substituted, ~ untouched
//! expand_glob(template)    -- ${BRANCH} -> '*', reports presence
//! extract_branch_from_path(template, path) -- reverse of expand_remote
//! sanitize_branch(name)    -- / \ : * ? " < > | -> '-', idempotent
//! resolve_project(cwd)     -- remote URL repo name > toplevel basename > cwd basename > "project"
//! resolve_user()           -- $USER/$USERNAME/$LOGNAME -> whoami
//! resolve_branch(cwd)      -- current_branch() sanitised, "HEAD" if detached/non-repo
//! ```

use std::path::{Path, PathBuf};

use crate::core::process::builder::ProcessBuilder;
use crate::git;

/// Characters the filesystem sanitiser replaces with `-` (`spec.md` §4.1).
const UNSAFE_BRANCH_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Replaces filesystem-unsafe characters in a branch name with `-`.
/// Idempotent: `sanitize_branch(sanitize_branch(x)) == sanitize_branch(x)`
/// (invariant 6).
#[must_use]
pub fn sanitize_branch(name: &str) -> String {
    name.chars()
        .map(|c| if UNSAFE_BRANCH_CHARS.contains(&c) { '-' } else { c })
        .collect()
}

/// `${PROJECT}` resolution chain (`spec.md` §4.1): remote URL repo name,
/// then toplevel basename, then cwd basename, then the literal `"project"`.
#[must_use]
pub fn resolve_project(cwd: &Path) -> String {
    if let Some(url) = git::remote_url(cwd, "origin")
        && let Some(name) = git::repo_name_from_url(&url)
    {
        return name;
    }
    if let Some(toplevel) = git::toplevel(cwd)
        && let Some(name) = toplevel.file_name()
    {
        return name.to_string_lossy().into_owned();
    }
    if let Some(name) = cwd.file_name() {
        return name.to_string_lossy().into_owned();
    }
    "project".to_string()
}

/// `${USER}` resolution: three environment variables, then `whoami`
/// (`spec.md` §4.1).
#[must_use]
pub fn resolve_user() -> String {
    for var in ["USER", "USERNAME", "LOGNAME"] {
        if let Ok(value) = std::env::var(var)
            && !value.is_empty()
        {
            return value;
        }
    }
    whoami_fallback()
}

fn whoami_fallback() -> String {
    if let Some(path) = ProcessBuilder::find("whoami") {
        if let Ok(output) = std::process::Command::new(path).output()
            && output.status.success()
        {
            return String::from_utf8_lossy(&output.stdout).trim().to_string();
        }
    }
    String::new()
}

/// `${BRANCH}` resolution: current branch, sanitised; `"HEAD"` when detached
/// or outside a repository (`spec.md` §4.1).
#[must_use]
pub fn resolve_branch(cwd: &Path) -> String {
    git::current_branch(cwd).map_or_else(|| "HEAD".to_string(), |b| sanitize_branch(&b))
}

/// The four substitution values used by [`expand_local`]/[`expand_remote`].
#[derive(Debug, Clone)]
pub struct Variables {
    pub home: String,
    pub user: String,
    pub project: String,
    pub branch: String,
}

impl Variables {
    /// Resolves all four variables from the current process/repository
    /// state relative to `cwd`.
    #[must_use]
    pub fn resolve(cwd: &Path) -> Self {
        Self {
            home: std::env::var("HOME").unwrap_or_default(),
            user: resolve_user(),
            project: resolve_project(cwd),
            branch: resolve_branch(cwd),
        }
    }
}

fn substitute(template: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (var, value) in pairs {
        out = out.replace(var, value);
    }
    out
}

/// Local expansion: `${HOME}`, `${USER}`, `${PROJECT}`, `${BRANCH}` are
/// substituted with their current-process values; `~` is left untouched.
#[must_use]
pub fn expand_local(template: &str, vars: &Variables) -> String {
    substitute(
        template,
        &[
            ("${HOME}", &vars.home),
            ("${USER}", &vars.user),
            ("${PROJECT}", &vars.project),
            ("${BRANCH}", &vars.branch),
        ],
    )
}

/// Remote expansion: `${PROJECT}`, `${USER}`, `${BRANCH}` are substituted;
/// `${HOME}` becomes `~` so the remote shell expands it at execution time.
/// `~` is preserved.
#[must_use]
pub fn expand_remote(template: &str, vars: &Variables) -> String {
    substitute(
        template,
        &[
            ("${HOME}", "~"),
            ("${USER}", &vars.user),
            ("${PROJECT}", &vars.project),
            ("${BRANCH}", &vars.branch),
        ],
    )
}

/// Glob expansion used by the clean scanner: like [`expand_remote`] but
/// `${BRANCH}` becomes `*`. Returns the expanded glob and whether
/// `${BRANCH}` was present in the template.
#[must_use]
pub fn expand_glob(template: &str, vars: &Variables) -> (String, bool) {
    let had_branch = template.contains("${BRANCH}");
    let expanded = substitute(
        template,
        &[
            ("${HOME}", "~"),
            ("${USER}", &vars.user),
            ("${PROJECT}", &vars.project),
            ("${BRANCH}", "*"),
        ],
    );
    (expanded, had_branch)
}

/// Reverses [`expand_remote`] for the `${BRANCH}` variable: given the
/// original template and a concrete expanded path, returns the segment that
/// occupied `${BRANCH}`.
///
/// Returns `None` if the template does not contain exactly one `${BRANCH}`
/// occurrence, or if `path` does not match the template's prefix/suffix.
/// When `path` is absolute, matching uses only the portion after `~/`
/// (templates may start with `~`).
#[must_use]
pub fn extract_branch_from_path(template: &str, path: &str) -> Option<String> {
    if template.matches("${BRANCH}").count() != 1 {
        return None;
    }
    let (prefix, suffix) = template.split_once("${BRANCH}")?;

    let (prefix, path) = if let Some(rest) = prefix.strip_prefix('~') {
        let path = path.strip_prefix('~').unwrap_or(path);
        (rest, path)
    } else {
        (prefix, path)
    };

    let after_prefix = path.strip_prefix(prefix)?;
    let branch = after_prefix.strip_suffix(suffix)?;
    if branch.is_empty() {
        None
    } else {
        Some(branch.to_string())
    }
}

/// Joins a remote-expanded path against `~` into an absolute-ish display
/// form, purely for logging; the remote shell is what actually expands `~`.
#[must_use]
pub fn display_remote_path(expanded: &str, home_hint: &str) -> PathBuf {
    expanded
        .strip_prefix("~/")
        .map_or_else(|| PathBuf::from(expanded), |rest| Path::new(home_hint).join(rest))
}
