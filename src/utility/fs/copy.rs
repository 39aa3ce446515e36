// rr: remote task runner
//
// SPDX-License-Identifier: MIT

use crate::error::Result;
use anyhow::Context;
use std::path::Path;
use tokio::fs;
use wax::Program as _;

/// Recursively copies `src` into `dst`, skipping entries whose path relative
/// to `src` matches one of `excludes` (glob patterns, `wax` syntax).
///
/// Used by [`crate::transport::local::LocalTransport`] to stand in for the
/// `rsync`-style syncer in tests and in the local-fallback execution path.
///
/// # Errors
///
/// Returns an error if any directory cannot be created or any file cannot be
/// read or written.
pub async fn copy_dir_filtered(src: &Path, dst: &Path, excludes: &[String]) -> Result<()> {
    let globs: Vec<wax::Glob<'_>> = excludes
        .iter()
        .filter_map(|p| wax::Glob::new(p).ok())
        .collect();
    copy_dir_filtered_inner(src, src, dst, &globs).await
}

async fn copy_dir_filtered_inner(
    root: &Path,
    src: &Path,
    dst: &Path,
    excludes: &[wax::Glob<'_>],
) -> Result<()> {
    fs::create_dir_all(dst)
        .await
        .with_context(|| format!("failed to create directory {}", dst.display()))?;

    let mut entries = fs::read_dir(src)
        .await
        .with_context(|| format!("failed to read directory {}", src.display()))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed to read entry from {}", src.display()))?
    {
        let src_path = entry.path();
        let relative = src_path.strip_prefix(root).unwrap_or(&src_path);
        if excludes.iter().any(|g| g.is_match(relative)) {
            continue;
        }

        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            Box::pin(copy_dir_filtered_inner(root, &src_path, &dst_path, excludes)).await?;
        } else {
            fs::copy(&src_path, &dst_path).await.with_context(|| {
                format!(
                    "failed to copy {} to {}",
                    src_path.display(),
                    dst_path.display()
                )
            })?;
        }
    }

    Ok(())
}
