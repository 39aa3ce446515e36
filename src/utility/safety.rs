// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Dangerous-path denylist shared by [`crate::lock`]'s force-break and
//! [`crate::clean`]'s removal (`spec.md` §4.8 "Safety", invariant 9).

use crate::error::RrError;

/// Refuses to operate on an empty, root, or home path, and optionally
/// requires a specific prefix.
///
/// # Errors
///
/// Returns [`RrError::DangerousPath`] if `path` (after trimming) is empty,
/// `"/"`, `"~"`, or does not start with `expected_prefix` when one is given.
pub fn validate_removal_path(path: &str, expected_prefix: Option<&str>) -> Result<(), RrError> {
    let trimmed = path.trim();
    if trimmed.is_empty() || trimmed == "/" || trimmed == "~" {
        return Err(RrError::DangerousPath(trimmed.to_string().into_boxed_str()));
    }
    if let Some(prefix) = expected_prefix
        && !trimmed.starts_with(prefix)
    {
        return Err(RrError::DangerousPath(trimmed.to_string().into_boxed_str()));
    }
    Ok(())
}
