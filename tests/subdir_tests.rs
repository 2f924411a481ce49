mod common;

use anyhow::Result;
use common::*;
use gitsync::SyncOptions;
use tempfile::tempdir;

#[test]
fn test_subdir_projection_reroots_files() -> Result<()> {
    let source = tempdir()?;
    let target = tempdir()?;
    init_test_repo(source.path())?;
    init_test_repo(target.path())?;

    create_file_and_commit(source.path(), "package-name/package.txt", "content", "add package.txt")?;

    let options = SyncOptions {
        source_dir: "package-name".to_string(),
        ..Default::default()
    };
    run_sync(source.path(), target.path(), options)?;

    assert!(target.path().join("package.txt").exists());
    assert!(!target.path().join("package-name").exists());
    Ok(())
}

#[test]
fn test_commits_outside_subdir_are_dropped() -> Result<()> {
    let source = tempdir()?;
    let target = tempdir()?;
    init_test_repo(source.path())?;
    init_test_repo(target.path())?;

    create_file_and_commit(source.path(), "package-name/package.txt", "content", "add package.txt")?;
    create_file_and_commit(source.path(), "unrelated.txt", "outside", "add unrelated.txt")?;

    let options = SyncOptions {
        source_dir: "package-name".to_string(),
        ..Default::default()
    };
    run_sync(source.path(), target.path(), options)?;

    assert!(target.path().join("package.txt").exists());
    assert!(!target.path().join("unrelated.txt").exists());
    assert_eq!(commit_count(target.path(), "HEAD")?, 1);
    Ok(())
}

#[test]
fn test_projection_into_target_subdir() -> Result<()> {
    let source = tempdir()?;
    let target = tempdir()?;
    init_test_repo(source.path())?;
    init_test_repo(target.path())?;

    // Target carries its own file outside the synced subtree.
    create_file_and_commit(target.path(), "local.txt", "keep me", "target local file")?;

    create_file_and_commit(source.path(), "lib.txt", "library", "add lib.txt")?;

    let options = SyncOptions {
        target_dir: "vendor".to_string(),
        ..Default::default()
    };
    run_sync(source.path(), target.path(), options)?;

    assert!(target.path().join("vendor/lib.txt").exists());
    // Files outside the target subdir are never touched.
    assert_eq!(std::fs::read_to_string(target.path().join("local.txt"))?, "keep me");
    Ok(())
}

#[test]
fn test_filter_pathspec_scopes_the_sync() -> Result<()> {
    let source = tempdir()?;
    let target = tempdir()?;
    init_test_repo(source.path())?;
    init_test_repo(target.path())?;

    create_file_and_commit(source.path(), "pkg/src/kept.txt", "kept", "add kept")?;
    create_file_and_commit(source.path(), "pkg/docs/dropped.txt", "dropped", "add dropped")?;

    let options = SyncOptions {
        source_dir: "pkg".to_string(),
        filters: vec!["src".to_string()],
        ..Default::default()
    };
    run_sync(source.path(), target.path(), options)?;

    assert!(target.path().join("src/kept.txt").exists());
    assert!(!target.path().join("docs").exists());
    assert_eq!(commit_count(target.path(), "HEAD")?, 1);
    Ok(())
}

#[test]
fn test_executable_bit_survives_projection() -> Result<()> {
    let source = tempdir()?;
    let target = tempdir()?;
    init_test_repo(source.path())?;
    init_test_repo(target.path())?;

    std::fs::write(source.path().join("run.sh"), "#!/bin/sh\necho ok\n")?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(source.path().join("run.sh"), std::fs::Permissions::from_mode(0o755))?;
    }
    std::fs::write(source.path().join("data.txt"), "plain")?;
    run_git(source.path(), &["add", "."])?;
    run_git(source.path(), &["commit", "-m", "add script and data"])?;

    run_sync(source.path(), target.path(), SyncOptions::default())?;

    let listing = git_out(target.path(), &["ls-files", "-s"])?;
    assert!(listing.contains("100755"), "expected executable entry in: {}", listing);
    assert!(listing.contains("100644"), "expected plain entry in: {}", listing);
    Ok(())
}
