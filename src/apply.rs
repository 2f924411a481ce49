//! Commit projection: the per-commit hot path.
//!
//! Non-merge commits are reapplied as patches (`git log -p` piped into
//! `git apply -3`), merge commits are rebuilt with `git merge --no-commit`
//! over their resolved parents. When a patch does not land, the outcome
//! depends on whether the source supersets the target: overwrite the
//! worktree from a source checkout, or divert to a conflict branch.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::Sync;
use crate::logs::{parse_key, LogEntry};
use crate::pathspec::PathSpec;
use crate::repo::{GitRepo, EMPTY_TREE};

impl Sync {
    /// Project one scanned commit into the target.
    pub(crate) fn apply_entry(&mut self, entry: &LogEntry) -> Result<()> {
        let key = entry.key.clone();
        let (hash, parents) = parse_key(&key);

        self.select_branch(entry.on_current_line, &parents)?;

        if parents.len() > 1 {
            self.apply_merge(hash, &parents)?;
        } else {
            self.apply_patch(hash, &parents)?;
        }

        let head = self.target.rev_parse("HEAD")?;
        self.oracle.record(hash, &head);
        Ok(())
    }

    /// Put the target HEAD where this commit belongs: a temp branch at the
    /// first parent's projection for off-trunk rows, the trunk branch
    /// otherwise.
    fn select_branch(&mut self, on_current_line: bool, parents: &[&str]) -> Result<()> {
        // A root commit has nowhere to branch from; it lands on the trunk.
        if !on_current_line && parents[0] != EMPTY_TREE {
            let parent_target = self.oracle.resolve_required(parents[0])?;
            let temp = format!("sync-{}", parents[0]);
            self.target.run(&["checkout", "-B", &temp, &parent_target])?;
            self.temp_branches.insert(temp.clone());
            self.cur_branch = temp;
        } else if self.cur_branch != self.default_branch {
            self.target.run(&["checkout", &self.default_branch])?;
            self.cur_branch = self.default_branch.clone();
        }
        Ok(())
    }

    /// Rebuild a merge commit over its resolved parents.
    fn apply_merge(&mut self, hash: &str, parents: &[&str]) -> Result<()> {
        let mut resolved = Vec::with_capacity(parents.len());
        for parent in parents {
            resolved.push(self.oracle.resolve_required(parent)?);
        }

        let mut args = vec!["merge", "--no-ff", "--no-commit"];
        args.extend(resolved.iter().map(|s| s.as_str()));
        // The merge is allowed to fail: the tree is settled below, and the
        // MERGE_HEAD it leaves behind is what gives the commit its parents.
        let _ = self.target.cmd(&args).mute().run();

        if self.is_contains && !self.is_historical {
            self.overwrite_from_source(hash, parents)?;
        } else {
            self.divert(hash)?;
        }
        self.commit_projected(hash, None)
    }

    /// Reapply a non-merge commit as a patch.
    fn apply_patch(&mut self, hash: &str, parents: &[&str]) -> Result<()> {
        if self.try_apply(hash)?.is_err() {
            self.resolve_patch_failure(hash, parents)?;
        }
        self.commit_projected(hash, None)
    }

    /// Build the patch and feed it to `git apply -3`.
    ///
    /// The outer Result is an engine failure; the inner one is the apply
    /// verdict the conflict shim acts on.
    pub(crate) fn try_apply(&self, hash: &str) -> Result<Result<(), ()>> {
        let patch = self.build_patch(hash)?;
        if patch.trim().is_empty() {
            // Empty source commit: nothing to apply, commit stays empty.
            return Ok(Ok(()));
        }

        let depth = format!("-p{}", self.paths.apply_depth());
        let mut args = vec!["apply", "-3", "--ignore-whitespace", depth.as_str()];
        let directory;
        if self.paths.target_dir != "./" {
            directory = self.paths.target_dir.trim_end_matches('/').to_string();
            args.push("--directory");
            args.push(&directory);
        }

        match self.target.cmd(&args).stdin(patch).mute().run() {
            Ok(_) => Ok(Ok(())),
            Err(_) => Ok(Err(())),
        }
    }

    fn build_patch(&self, hash: &str) -> Result<String> {
        let mut args: Vec<String> = vec![
            "log".into(),
            "-p".into(),
            "--reverse".into(),
            "-m".into(),
            "--stat".into(),
            "--binary".into(),
            "-1".into(),
            "--color=never".into(),
            "--format=%n".into(),
            hash.into(),
        ];
        PathSpec::append(&mut args, &self.paths.source_paths);
        let argv: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        let patch = self.source.run(&argv)?;
        // git-apply chokes on a patch that ends mid-diagnostic (truncated
        // binary hunks, fake-ancestor notes); the extra blank lines keep it
        // parsing to the end.
        Ok(format!("{}\n\n", patch))
    }

    /// The conflict-resolution shim for a failed patch.
    pub(crate) fn resolve_patch_failure(&mut self, hash: &str, parents: &[&str]) -> Result<()> {
        if self.is_contains && self.is_historical {
            self.divert(hash)?;
        } else if self.is_contains {
            self.overwrite_from_source(hash, parents)?;
        } else if !self.has_diverted() {
            self.divert(hash)?;
            // The fresh conflict branch roots at the last shared commit,
            // so the patch usually lands on retry. When even that fails
            // the source checkout is authoritative.
            if self.try_apply(hash)?.is_err() {
                self.overwrite_from_source(hash, parents)?;
            }
        } else {
            self.divert(hash)?;
        }
        Ok(())
    }

    fn has_diverted(&self) -> bool {
        !self.conflict_branches.is_empty()
    }

    /// Stage and commit the projected state, carrying the source commit's
    /// message and (optionally) identity.
    pub(crate) fn commit_projected(&mut self, source_hash: &str, message: Option<&str>) -> Result<()> {
        self.target.run(&["add", "-u"])?;
        self.plugins
            .before_commit(&self.source.dir, &self.target.dir, &self.options)?;

        let meta = self.source.run(&[
            "show",
            "-s",
            "--format=%an|%ae|%ai|%cn|%ce|%ci|%B",
            source_hash,
        ])?;
        let mut fields = meta.splitn(7, '|');
        let author_name = fields.next().unwrap_or_default();
        let author_email = fields.next().unwrap_or_default();
        let author_date = fields.next().unwrap_or_default();
        let committer_name = fields.next().unwrap_or_default();
        let committer_email = fields.next().unwrap_or_default();
        let committer_date = fields.next().unwrap_or_default();
        let body = fields.next().unwrap_or_default();
        let message = message.unwrap_or(body);

        let mut cmd = self.target.cmd(&["commit", "--allow-empty", "-am", message]);
        if self.options.preserve_commit {
            cmd = cmd
                .env("GIT_AUTHOR_NAME", author_name)
                .env("GIT_AUTHOR_EMAIL", author_email)
                .env("GIT_AUTHOR_DATE", author_date)
                .env("GIT_COMMITTER_NAME", committer_name)
                .env("GIT_COMMITTER_EMAIL", committer_email)
                .env("GIT_COMMITTER_DATE", committer_date);
        }
        // Propagated so a sibling post-commit hook can tell engine commits
        // from user commits and not recurse.
        if let Ok(update) = std::env::var("GITSYNC_UPDATE") {
            cmd = cmd.env("GITSYNC_UPDATE", update);
        }
        cmd.run()?;
        Ok(())
    }

    /// Overwrite the target worktree from a detached source checkout.
    ///
    /// `diff-tree` against each parent yields the changed set; deletions go
    /// first so a rename's delete half cannot clobber the moved file.
    pub(crate) fn overwrite_from_source(&mut self, hash: &str, parents: &[&str]) -> Result<()> {
        let mut deletions: Vec<String> = Vec::new();
        let mut updates: Vec<String> = Vec::new();
        for parent in parents {
            let mut args: Vec<String> = vec![
                "diff-tree".into(),
                "--name-status".into(),
                "-r".into(),
                parent.to_string(),
                hash.to_string(),
            ];
            PathSpec::append(&mut args, &self.paths.source_paths);
            let argv: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
            let out = self.source.run(&argv)?;
            for line in out.lines() {
                let Some((status, path)) = line.split_once('\t') else { continue };
                let bucket = if status.starts_with('D') {
                    &mut deletions
                } else {
                    &mut updates
                };
                if !bucket.iter().any(|p| p == path) {
                    bucket.push(path.to_string());
                }
            }
        }

        if deletions.is_empty() && updates.is_empty() {
            return Ok(());
        }

        if !updates.is_empty() {
            let worktree = self.ensure_worktree()?;
            let wt_repo = GitRepo::open(&worktree);
            let mut args = vec!["checkout", "-f", hash, "--"];
            args.extend(updates.iter().map(|s| s.as_str()));
            wt_repo.run(&args)?;

            for path in &deletions {
                let target_path = self.target.dir.join(self.paths.to_target_path(path));
                let _ = fs::remove_file(target_path);
            }

            for path in &updates {
                let from = worktree.join(path);
                let to = self.target.dir.join(self.paths.to_target_path(path));
                if let Some(parent) = to.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create {}", parent.display()))?;
                }
                move_file(&from, &to)?;
            }
        } else {
            for path in &deletions {
                let target_path = self.target.dir.join(self.paths.to_target_path(path));
                let _ = fs::remove_file(target_path);
            }
        }

        let mut args: Vec<String> = vec!["add".into()];
        if self.paths.target_paths.len() == 1 && self.paths.target_paths[0] == "./" {
            args.push(".".into());
        } else {
            args.push("--".into());
            args.extend(self.paths.target_paths.iter().cloned());
        }
        let argv: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        self.target.run(&argv)?;
        Ok(())
    }

    /// Detached, checkout-less worktree of the source, created on first
    /// use and removed in teardown.
    fn ensure_worktree(&mut self) -> Result<PathBuf> {
        if let Some(dir) = &self.worktree {
            return Ok(dir.clone());
        }
        let dir = self.source.dir.join(".git").join("gitsync-worktree");
        let dir_str = dir.to_string_lossy().to_string();
        self.source
            .run(&["worktree", "add", "-f", &dir_str, "--no-checkout", "--detach"])?;
        self.worktree = Some(dir.clone());
        Ok(dir)
    }
}

/// Move a file across directories, falling back to copy-and-remove when a
/// plain rename cannot cross the filesystem boundary.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
    fs::remove_file(from).with_context(|| format!("Failed to remove {}", from.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_move_file_creates_destination() -> Result<()> {
        let dir = tempdir()?;
        let from = dir.path().join("from.txt");
        let to = dir.path().join("nested").join("to.txt");
        fs::write(&from, "payload")?;
        fs::create_dir_all(to.parent().unwrap())?;

        move_file(&from, &to)?;
        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to)?, "payload");
        Ok(())
    }
}
