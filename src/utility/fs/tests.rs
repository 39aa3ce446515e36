// rr: remote task runner
//
// SPDX-License-Identifier: MIT

use super::copy::copy_dir_filtered;
use tempfile::TempDir;

fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("failed to create temp dir")
}

#[tokio::test]
async fn copies_nested_tree() {
    let src = temp_dir();
    let dst = temp_dir();

    std::fs::create_dir(src.path().join("subdir")).unwrap();
    std::fs::write(src.path().join("file1.txt"), "a").unwrap();
    std::fs::write(src.path().join("subdir/file2.txt"), "b").unwrap();

    copy_dir_filtered(src.path(), dst.path(), &[]).await.unwrap();

    assert_eq!(std::fs::read_to_string(dst.path().join("file1.txt")).unwrap(), "a");
    assert_eq!(
        std::fs::read_to_string(dst.path().join("subdir/file2.txt")).unwrap(),
        "b"
    );
}

#[tokio::test]
async fn excludes_matching_paths() {
    let src = temp_dir();
    let dst = temp_dir();

    std::fs::create_dir(src.path().join(".git")).unwrap();
    std::fs::write(src.path().join(".git/HEAD"), "ref: refs/heads/main").unwrap();
    std::fs::write(src.path().join("main.rs"), "fn main() {}").unwrap();

    copy_dir_filtered(src.path(), dst.path(), &[".git/**".to_string()])
        .await
        .unwrap();

    assert!(dst.path().join("main.rs").exists());
    assert!(!dst.path().join(".git/HEAD").exists());
}
