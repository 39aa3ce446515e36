// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Locates the two configuration files (`spec.md` §6 "Config file layout").
//!
//! ```text
//! global_config_path()  -- <home>/.rr/config.yaml
//! find_project_config(start)
//!   walk start, start/.., start/../.. , ...
//!     found .rr.yaml?        --> stop, return it
//!     found git repo root?   --> stop (no project file found)
//!     reached $HOME?         --> stop (no project file found)
//! ```

use std::path::{Path, PathBuf};

use crate::git;

/// Name of the per-project config file searched for in each directory.
pub const PROJECT_CONFIG_FILE_NAME: &str = ".rr.yaml";

/// Global fleet config path: `<home>/.rr/config.yaml`.
#[must_use]
pub fn global_config_path() -> Option<PathBuf> {
    dirs_home().map(|home| home.join(".rr").join("config.yaml"))
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Walks upward from `start` looking for `.rr.yaml`, stopping at the first
/// of: a discovered project file, the git repository root, or `$HOME`
/// (`spec.md` §4.1 ambient loading mechanics, §6).
#[must_use]
pub fn find_project_config(start: &Path) -> Option<PathBuf> {
    let home = dirs_home();
    let repo_root = git::toplevel(start);

    let mut dir = Some(start.to_path_buf());
    while let Some(current) = dir {
        let candidate = current.join(PROJECT_CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }

        if repo_root.as_deref() == Some(current.as_path()) {
            return None;
        }
        if home.as_deref() == Some(current.as_path()) {
            return None;
        }

        dir = current.parent().map(Path::to_path_buf);
    }
    None
}

#[cfg(test)]
mod tests;
