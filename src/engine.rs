//! Orchestration of a sync run.
//!
//! The engine drives both repositories strictly sequentially: every git
//! invocation completes before the next begins, because the sequence is an
//! implicit HEAD state machine. The target is required clean on entry and
//! is left clean on exit unless the run aborts; teardown (temp branches,
//! auxiliary worktree) runs on success and failure alike.

use anyhow::{bail, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::conflict::conflict_summary;
use crate::logs::{self, ScanLimits, Scanner};
use crate::options::SyncOptions;
use crate::oracle::IdentityOracle;
use crate::pathspec::PathSpec;
use crate::plugin::PluginRegistry;
use crate::refs;
use crate::repo::GitRepo;
use crate::ui;

/// One sync run over a source and a target repository.
pub struct Sync {
    pub(crate) source: GitRepo,
    pub(crate) target: GitRepo,
    pub(crate) options: SyncOptions,
    pub(crate) paths: PathSpec,
    pub(crate) oracle: IdentityOracle,
    pub(crate) plugins: PluginRegistry,

    /// Target tip at entry, for the recovery hint.
    pub(crate) init_hash: Option<String>,
    /// Target branch to restore on exit.
    pub(crate) orig_branch: String,
    /// Branch commits are currently applied on.
    pub(crate) cur_branch: String,
    /// Branch chosen for trunk projection.
    pub(crate) default_branch: String,
    /// Source commit set strictly supersets the target's.
    pub(crate) is_contains: bool,
    /// The run prepends older commits rather than appending newer ones.
    pub(crate) is_historical: bool,
    /// Original names of branches whose projection diverted.
    pub(crate) conflict_branches: Vec<String>,
    /// `sync-<hash>` branches to delete in teardown.
    pub(crate) temp_branches: HashSet<String>,
    /// Auxiliary source worktree, created on first overwrite.
    pub(crate) worktree: Option<PathBuf>,
    pub(crate) synced_count: usize,
}

impl Sync {
    pub fn new(source: GitRepo, target: GitRepo, options: SyncOptions) -> Result<Self> {
        let paths = PathSpec::new(&options.source_dir, &options.target_dir, &options.filters);
        let oracle = IdentityOracle::new(&source, &target, &paths.target_paths);
        let plugins = PluginRegistry::load(&options.plugins)?;
        Ok(Self {
            source,
            target,
            options,
            paths,
            oracle,
            plugins,
            init_hash: None,
            orig_branch: String::new(),
            cur_branch: String::new(),
            default_branch: String::new(),
            is_contains: false,
            is_historical: false,
            conflict_branches: Vec::new(),
            temp_branches: HashSet::new(),
            worktree: None,
            synced_count: 0,
        })
    }

    /// Target tip recorded at entry, if the target had commits.
    pub fn init_hash(&self) -> Option<&str> {
        self.init_hash.as_deref()
    }

    pub fn target_dir(&self) -> &Path {
        &self.target.dir
    }

    /// Run the sync. Teardown happens on both success and failure.
    pub fn run(&mut self) -> Result<()> {
        let result = self.execute();
        self.teardown();
        result
    }

    fn execute(&mut self) -> Result<()> {
        let status = self.target.status_short()?;
        if !status.is_empty() {
            bail!(
                "Target repository \"{}\" has uncommitted changes, please commit or remove changes before syncing.",
                self.target.dir.display()
            );
        }

        self.plugins
            .prepare(&self.source.dir, &self.target.dir, &self.options)?;

        self.init_hash = self.target.try_rev_parse("HEAD");
        self.orig_branch = self.target.current_branch()?;
        self.cur_branch = self.orig_branch.clone();
        self.default_branch = self.orig_branch.clone();

        self.delete_develop_branches()?;

        let source_branches = refs::branches(
            &self.source,
            &self.options.include_branches,
            &self.options.exclude_branches,
        )?;
        let target_branches = refs::branches(&self.target, &[], &[])?;

        if self.options.squash {
            self.squash_branches(&source_branches, target_branches.len())?;
        } else {
            self.project_commits(&source_branches, target_branches.len())?;
        }

        if self.target.branch_exists(&self.orig_branch) {
            let _ = self.target.cmd(&["checkout", &self.orig_branch]).mute().run();
            self.cur_branch = self.orig_branch.clone();
        }

        if !self.conflict_branches.is_empty() {
            print!(
                "{}",
                conflict_summary(
                    &self.target.dir.to_string_lossy(),
                    &self.paths.target_dir,
                    &self.conflict_branches
                )
            );
            bail!("conflict");
        }

        if !self.options.no_tags {
            self.reconcile_tags()?;
        }
        Ok(())
    }

    /// Scan both sides, compute the new-commit set, and project it.
    fn project_commits(&mut self, source_branches: &[String], target_branch_count: usize) -> Result<()> {
        let limits = ScanLimits {
            after: self.options.after,
            max_count: self.options.max_count,
        };
        let spin = ui::spinner("Scanning commits...");
        let scanner = Scanner {
            repo: &self.source,
            paths: &self.paths.source_paths,
            other: &self.target,
            other_paths: &self.paths.target_paths,
        };
        let mut first_hash: Option<String> = None;
        let source_logs = scanner.scan(source_branches, &limits, |hash| {
            first_hash = Some(hash.to_string());
        })?;

        let target_scanner = Scanner {
            repo: &self.target,
            paths: &self.paths.target_paths,
            other: &self.source,
            other_paths: &self.paths.source_paths,
        };
        let target_logs = target_scanner.scan(&[], &ScanLimits::default(), |_| {})?;
        ui::spinner_success(
            spin,
            &format!(
                "Scanned {} source and {} target commits",
                source_logs.len(),
                target_logs.len()
            ),
        );

        let fresh = logs::new_entries(&source_logs, &target_logs);
        println!(
            "Commits: new: {}, exists: {}, source: {}, target: {}",
            fresh.len(),
            source_logs.len() - fresh.len(),
            source_logs.len(),
            target_logs.len()
        );

        self.is_contains =
            source_logs.len() as i64 - target_logs.len() as i64 == fresh.len() as i64;
        self.is_historical = match (fresh.first(), source_logs.first()) {
            (Some(newest_fresh), Some(source_tip)) => newest_fresh.key != source_tip.key,
            _ => false,
        };

        if !fresh.is_empty() {
            if let Some(first) = first_hash.clone() {
                self.select_default_branch(&first)?;
            }

            let bar = ui::progress_bar(fresh.len() as u64, "Syncing commits");
            // Oldest first: a parent is always projected before its children.
            for entry in fresh.iter().rev() {
                self.apply_entry(entry)?;
                self.synced_count += 1;
                ui::progress_inc(&bar);
            }
            ui::progress_finish(bar);
        }

        println!(
            "Synced {} commit{}.",
            self.synced_count,
            if self.synced_count == 1 { "" } else { "s" }
        );

        self.reconcile_branches(source_branches, target_branch_count)
    }

    /// Pick the trunk branch from the first scanned source hash and put
    /// the target on it.
    fn select_default_branch(&mut self, first_hash: &str) -> Result<()> {
        let listing = self
            .source
            .cmd(&["branch", "--no-color", "--contains", first_hash])
            .mute()
            .run()
            .unwrap_or_default();

        let mut chosen: Option<String> = None;
        for line in listing.lines() {
            let Some(name) = line.get(2..).map(str::trim) else { continue };
            if name.is_empty() || name.starts_with('(') {
                continue;
            }
            if line.starts_with('*') {
                chosen = Some(name.to_string());
                break;
            }
            if chosen.is_none() {
                chosen = Some(name.to_string());
            }
        }
        let Some(branch) = chosen else {
            return Ok(());
        };
        let branch = branch.strip_prefix("origin/").unwrap_or(&branch).to_string();

        self.default_branch = branch.clone();
        if self.cur_branch == branch {
            return Ok(());
        }
        if self.target.branch_exists(&branch) {
            self.target.run(&["checkout", &branch])?;
        } else if self.target.current_branch().map(|b| b == branch).unwrap_or(false) {
            // Unborn branch already pointed at by HEAD.
        } else {
            self.target.run(&["checkout", "-b", &branch])?;
        }
        self.cur_branch = branch;
        Ok(())
    }

    /// Force-delete develop branches in the target so they are recreated
    /// from scratch this run.
    fn delete_develop_branches(&mut self) -> Result<()> {
        if self.options.develop_branches.is_empty() {
            return Ok(());
        }
        let source_branches = refs::branches(&self.source, &[], &[])?;
        let matched = refs::filter_refs(&source_branches, &self.options.develop_branches, &[])?;

        let mut deleted_any = false;
        for branch in matched {
            let local_name = branch.strip_prefix("origin/").unwrap_or(&branch);
            if !self.target.branch_exists(local_name) {
                continue;
            }
            if self.target.current_branch()? == local_name {
                bail!(
                    "Cannot delete develop branch \"{}\" checked out in target repository.",
                    local_name
                );
            }
            self.target.run(&["branch", "-D", local_name])?;
            deleted_any = true;
        }

        if deleted_any {
            // Reset remote-tracking refs so re-syncs of deleted branches
            // start from scratch. Not atomic: a failure between the two
            // calls leaves the target without an origin remote.
            if let Ok(url) = self.target.cmd(&["config", "--get", "remote.origin.url"]).mute().run() {
                if !url.is_empty() {
                    self.target.run(&["remote", "rm", "origin"])?;
                    self.target.run(&["remote", "add", "origin", &url])?;
                }
            }
        }
        Ok(())
    }

    fn teardown(&mut self) {
        for temp in std::mem::take(&mut self.temp_branches) {
            let _ = self.target.cmd(&["branch", "-D", &temp]).mute().run();
        }
        if let Some(dir) = self.worktree.take() {
            let dir = dir.to_string_lossy().to_string();
            let _ = self.source.cmd(&["worktree", "remove", "-f", &dir]).mute().run();
        }
    }
}
