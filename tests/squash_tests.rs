mod common;

use anyhow::Result;
use common::*;
use gitsync::logs::squash_subject;
use gitsync::SyncOptions;
use tempfile::tempdir;

const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

#[test]
fn test_squash_to_new_repo() -> Result<()> {
    let source = tempdir()?;
    let target = tempdir()?;
    init_test_repo(source.path())?;
    init_test_repo(target.path())?;

    create_file_and_commit(source.path(), "one.txt", "1", "add one")?;
    create_file_and_commit(source.path(), "two.txt", "2", "add two")?;
    create_file_and_commit(source.path(), "three.txt", "3", "add three")?;

    let options = SyncOptions {
        squash: true,
        target_dir: "package-name".to_string(),
        ..Default::default()
    };
    run_sync(source.path(), target.path(), options)?;

    assert_eq!(commit_count(target.path(), "HEAD")?, 1);

    let source_tip = get_commit_hash(source.path(), "master")?;
    assert_eq!(
        get_last_commit_message(target.path(), "HEAD")?,
        squash_subject(EMPTY_TREE, &source_tip)
    );

    assert!(target.path().join("package-name/one.txt").exists());
    assert!(target.path().join("package-name/two.txt").exists());
    assert!(target.path().join("package-name/three.txt").exists());
    Ok(())
}

#[test]
fn test_squash_appends_new_range_on_rerun() -> Result<()> {
    let source = tempdir()?;
    let target = tempdir()?;
    init_test_repo(source.path())?;
    init_test_repo(target.path())?;

    create_file_and_commit(source.path(), "one.txt", "1", "add one")?;
    create_file_and_commit(source.path(), "two.txt", "2", "add two")?;

    let options = SyncOptions {
        squash: true,
        ..Default::default()
    };
    run_sync(source.path(), target.path(), options.clone())?;
    assert_eq!(commit_count(target.path(), "HEAD")?, 1);

    create_file_and_commit(source.path(), "three.txt", "3", "add three")?;
    run_sync(source.path(), target.path(), options.clone())?;

    assert_eq!(commit_count(target.path(), "HEAD")?, 2);
    assert!(target.path().join("three.txt").exists());

    // A further run with nothing new stays put.
    run_sync(source.path(), target.path(), options)?;
    assert_eq!(commit_count(target.path(), "HEAD")?, 2);
    Ok(())
}

#[test]
fn test_squash_round_trip_reproduces_content() -> Result<()> {
    let source = tempdir()?;
    let target = tempdir()?;
    init_test_repo(source.path())?;
    init_test_repo(target.path())?;

    create_file_and_commit(source.path(), "one.txt", "1", "add one")?;
    create_file_and_commit(source.path(), "two.txt", "2", "add two")?;
    create_file_and_commit(source.path(), "three.txt", "3", "add three")?;

    let options = SyncOptions {
        squash: true,
        ..Default::default()
    };
    run_sync(source.path(), target.path(), options)?;
    assert_eq!(commit_count(target.path(), "HEAD")?, 1);

    // Syncing back from the squashed side: the marker subject expands to
    // the original range, so nothing is re-projected.
    let source_tip = get_commit_hash(source.path(), "master")?;
    run_sync(target.path(), source.path(), SyncOptions::default())?;
    assert_eq!(get_commit_hash(source.path(), "master")?, source_tip);
    assert_eq!(commit_count(source.path(), "master")?, 3);
    Ok(())
}

#[test]
fn test_squash_resolves_tags_inside_the_range() -> Result<()> {
    let source = tempdir()?;
    let target = tempdir()?;
    init_test_repo(source.path())?;
    init_test_repo(target.path())?;

    create_file_and_commit(source.path(), "one.txt", "1", "add one")?;
    run_git(source.path(), &["tag", "mid-range"])?;
    create_file_and_commit(source.path(), "two.txt", "2", "add two")?;

    let options = SyncOptions {
        squash: true,
        ..Default::default()
    };
    run_sync(source.path(), target.path(), options)?;

    // The tagged commit was collapsed away; the tag lands on the squash
    // commit covering it.
    assert!(git_tag_exists(target.path(), "mid-range")?);
    assert_eq!(
        git_out(target.path(), &["rev-parse", "mid-range^{commit}"])?,
        git_out(target.path(), &["rev-parse", "HEAD"])?
    );
    Ok(())
}

#[test]
fn test_squash_base_branch_missing_fails() -> Result<()> {
    let source = tempdir()?;
    let target = tempdir()?;
    init_test_repo(source.path())?;
    init_test_repo(target.path())?;

    create_file_and_commit(source.path(), "a.txt", "a", "add a")?;

    let options = SyncOptions {
        squash: true,
        squash_base_branch: "trunk".to_string(),
        ..Default::default()
    };
    let err = run_sync(source.path(), target.path(), options).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Squash base branch \"trunk\" not found in source repository."
    );
    Ok(())
}
