use anyhow::Result;
use std::fs;
use std::path::Path;
use std::process::Command;

use gitsync::{GitRepo, Sync, SyncOptions};

/// Helper to run git commands directly (bypassing the engine)
pub fn run_git(dir: &Path, args: &[&str]) -> Result<std::process::Output> {
    Ok(Command::new("git").args(args).current_dir(dir).output()?)
}

/// Helper to run git and capture trimmed stdout
pub fn git_out(dir: &Path, args: &[&str]) -> Result<String> {
    let output = run_git(dir, args)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Helper to initialize a test git repository
pub fn init_test_repo(dir: &Path) -> Result<()> {
    Command::new("git")
        .args(["init", "-b", "master"])
        .current_dir(dir)
        .output()?;

    Command::new("git")
        .args(["config", "user.name", "Test User"])
        .current_dir(dir)
        .output()?;

    Command::new("git")
        .args(["config", "user.email", "test@example.com"])
        .current_dir(dir)
        .output()?;

    // Prevent editors from blocking tests
    Command::new("git")
        .args(["config", "core.editor", "true"])
        .current_dir(dir)
        .output()?;

    Ok(())
}

/// Helper to create a file (with parent directories) and commit it
pub fn create_file_and_commit(dir: &Path, filename: &str, content: &str, message: &str) -> Result<()> {
    let path = dir.join(filename);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    run_git(dir, &["add", "."])?;
    run_git(dir, &["commit", "-m", message])?;
    Ok(())
}

/// Helper to get current git branch
#[allow(dead_code)]
pub fn get_current_branch(dir: &Path) -> Result<String> {
    git_out(dir, &["branch", "--show-current"])
}

/// Helper to get last commit subject of a ref
#[allow(dead_code)]
pub fn get_last_commit_message(dir: &Path, reference: &str) -> Result<String> {
    git_out(dir, &["log", "-1", "--pretty=format:%s", reference])
}

/// Helper to get commit hash for a ref
#[allow(dead_code)]
pub fn get_commit_hash(dir: &Path, reference: &str) -> Result<String> {
    git_out(dir, &["rev-parse", reference])
}

/// Helper to count commits reachable from a ref
#[allow(dead_code)]
pub fn commit_count(dir: &Path, reference: &str) -> Result<usize> {
    let out = git_out(dir, &["rev-list", "--count", reference])?;
    Ok(out.parse()?)
}

/// Helper to check if branch exists in git
#[allow(dead_code)]
pub fn git_branch_exists(dir: &Path, name: &str) -> Result<bool> {
    let output = run_git(dir, &["rev-parse", "--verify", &format!("refs/heads/{}", name)])?;
    Ok(output.status.success())
}

/// Helper to check if a tag exists
#[allow(dead_code)]
pub fn git_tag_exists(dir: &Path, name: &str) -> Result<bool> {
    let output = run_git(dir, &["rev-parse", "--verify", &format!("refs/tags/{}", name)])?;
    Ok(output.status.success())
}

/// Run a sync between two repositories with the given options
pub fn run_sync(source: &Path, target: &Path, options: SyncOptions) -> Result<()> {
    let mut sync = Sync::new(GitRepo::open(source), GitRepo::open(target), options)?;
    sync.run()
}
