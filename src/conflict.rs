//! Conflict diversion.
//!
//! When a patch cannot be applied and the target genuinely diverged, the
//! engine parks the projection on a `<branch>-gitsync-conflict` branch
//! rooted at the last commit both sides agree on. Subsequent commits keep
//! applying on that branch until the run ends; the run then fails with the
//! literal error `conflict` and a manual-recovery recipe.

use anyhow::Result;

use crate::engine::Sync;
use crate::pathspec::PathSpec;

/// Suffix of every conflict branch. Repositories carrying such branches on
/// entry are rejected.
pub const CONFLICT_SUFFIX: &str = "-gitsync-conflict";

impl Sync {
    /// Divert projection onto a conflict branch.
    ///
    /// No-op when projection already sits on one: later commits pile onto
    /// the same branch.
    pub(crate) fn divert(&mut self, source_hash: &str) -> Result<()> {
        if self.cur_branch.ends_with(CONFLICT_SUFFIX) {
            return Ok(());
        }

        // Resolve any half-merged state before moving refs around.
        let _ = self.target.cmd(&["checkout", "--theirs", "."]).mute().run();

        // The conflict branch roots at the target counterpart of the
        // previous source commit on the subpath; when both sides share no
        // such commit, the current HEAD is the best anchor available.
        let root = self
            .prior_counterpart(source_hash)
            .or_else(|| self.target.try_rev_parse("HEAD"));

        self.target.run(&["reset", "--hard", "HEAD"])?;

        let conflict_name = format!("{}{}", self.cur_branch, CONFLICT_SUFFIX);
        let mut args = vec!["checkout", "-B", conflict_name.as_str()];
        if let Some(root) = &root {
            args.push(root);
        }
        self.target.run(&args)?;

        self.conflict_branches.push(self.cur_branch.clone());
        self.cur_branch = conflict_name.clone();
        self.default_branch = conflict_name;
        Ok(())
    }

    /// Target counterpart of the source commit preceding `hash` on the
    /// synced subpath.
    fn prior_counterpart(&self, source_hash: &str) -> Option<String> {
        let mut args: Vec<String> = vec![
            "log".into(),
            "--skip=1".into(),
            "--format=%ct %B".into(),
            "-1".into(),
            source_hash.into(),
        ];
        PathSpec::append(&mut args, &self.paths.source_paths);
        let argv: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        let out = self.source.cmd(&argv).mute().run().ok()?;
        let first_line = out.lines().next()?;
        let (committer_ts, search_key) = first_line.split_once(' ')?;
        self.oracle.locate_by_time(committer_ts, search_key)
    }
}

/// Render the manual-recovery recipe shown when a run ends in conflict.
pub fn conflict_summary(target_dir: &str, target_subdir: &str, conflict_branches: &[String]) -> String {
    let mut out = String::new();
    out.push_str("The target repository contains conflict branch[es], which need to be resolved manually.\n");
    out.push('\n');
    out.push_str("The conflict branch[es]:\n");
    out.push('\n');
    for name in conflict_branches {
        out.push_str(&format!("    {} conflict with {}{}\n", name, name, CONFLICT_SUFFIX));
    }
    out.push('\n');
    out.push_str("Please follow the steps to resolve the conflicts:\n");
    out.push('\n');
    let location = if target_subdir == "./" {
        target_dir.to_string()
    } else {
        format!("{}/{}", target_dir, target_subdir.trim_end_matches('/'))
    };
    out.push_str(&format!("    1. cd {}\n", location));
    out.push_str("    2. git checkout BRANCH-NAME // Replace BRANCH-NAME to your branch name\n");
    out.push_str("    3. git merge BRANCH-NAME-gitsync-conflict\n");
    out.push_str("    4. // Follow the tips to resolve the conflicts\n");
    out.push_str("    5. git branch -d BRANCH-NAME-gitsync-conflict // Remove temp branch\n");
    out.push_str("    6. \"gitsync ...\" to sync changes back to current repository\n");
    out
}
