//! Squash mode: collapse each source-branch range into one target commit.
//!
//! The squash commit's subject encodes the collapsed range, which is what
//! keeps squashed projections round-trippable: the opposite side's scanner
//! re-expands the marker, and the oracle resolves mid-range hashes through
//! the recorded range keys.

use anyhow::{bail, Result};

use crate::engine::Sync;
use crate::logs::{self, parse_key, Scanner};
use crate::pathspec::PathSpec;
use crate::repo::EMPTY_TREE;
use crate::ui;

impl Sync {
    pub(crate) fn squash_branches(
        &mut self,
        source_branches: &[String],
        target_branch_count: usize,
    ) -> Result<()> {
        let base = self.options.squash_base_branch.clone();
        let base_local = base.strip_prefix("origin/").unwrap_or(&base).to_string();
        if !source_branches
            .iter()
            .any(|b| b == &base || b.strip_prefix("origin/").unwrap_or(b) == base_local)
        {
            bail!("Squash base branch \"{}\" not found in source repository.", base);
        }

        // Base branch first: the others are rooted at its target tip.
        let mut ordered: Vec<&String> = Vec::with_capacity(source_branches.len());
        ordered.extend(source_branches.iter().filter(|b| {
            b.strip_prefix("origin/").unwrap_or(b) == base_local
        }));
        ordered.extend(source_branches.iter().filter(|b| {
            b.strip_prefix("origin/").unwrap_or(b) != base_local
        }));

        let mut new_count = 0;
        let mut exists_count = 0;
        for branch in ordered {
            let local_name = branch.strip_prefix("origin/").unwrap_or(branch).to_string();
            let source_tip = self.source.rev_parse(branch)?;

            if !self.target.branch_exists(&local_name) {
                let start = if local_name == base_local {
                    // The base squashes its whole history from nothing.
                    self.target.run(&["checkout", "-b", &local_name])?;
                    EMPTY_TREE.to_string()
                } else {
                    let base_target_tip = self.target.rev_parse(&base_local)?;
                    self.target
                        .run(&["checkout", "-b", &local_name, &base_target_tip])?;
                    self.source.rev_parse(&base)?
                };
                self.cur_branch = local_name;
                if start != source_tip {
                    self.emit_squash(&start, &source_tip)?;
                    new_count += 1;
                }
                continue;
            }

            exists_count += 1;
            self.target.run(&["checkout", &local_name])?;
            self.cur_branch = local_name.clone();

            let spin = ui::spinner(&format!("Scanning branch \"{}\"...", local_name));
            let branch_refs = vec![branch.clone()];
            let scanner = Scanner {
                repo: &self.source,
                paths: &self.paths.source_paths,
                other: &self.target,
                other_paths: &self.paths.target_paths,
            };
            let source_logs = scanner.scan(&branch_refs, &Default::default(), |_| {})?;

            let target_refs = vec![local_name.clone()];
            let target_scanner = Scanner {
                repo: &self.target,
                paths: &self.paths.target_paths,
                other: &self.source,
                other_paths: &self.paths.source_paths,
            };
            let target_logs = target_scanner.scan(&target_refs, &Default::default(), |_| {})?;
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
            if fresh.is_empty() {
                ui::step(&format!("Branch \"{}\" is up to date", ui::branch_style(&local_name)));
                continue;
            }

            // The oldest new commit's parent is where this range begins.
            let oldest = fresh.last().expect("non-empty");
            let (_, parents) = parse_key(&oldest.key);
            let start = parents[0].to_string();
            self.emit_squash(&start, &source_tip)?;
            new_count += 1;
        }

        println!(
            "Branches: new: {}, exists: {}, source: {}, target: {}",
            new_count,
            exists_count,
            source_branches.len(),
            target_branch_count
        );
        println!(
            "Synced {} commit{}.",
            self.synced_count,
            if self.synced_count == 1 { "" } else { "s" }
        );
        Ok(())
    }

    /// Emit one squash commit spanning `start..end` onto the current
    /// target branch, and record the collapsed range for later lookups.
    fn emit_squash(&mut self, start: &str, end: &str) -> Result<()> {
        let mut args: Vec<String> = vec![
            "diff".into(),
            "--stat".into(),
            "--binary".into(),
            "--color=never".into(),
            format!("{}..{}", start, end),
        ];
        PathSpec::append(&mut args, &self.paths.source_paths);
        let argv: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        let patch = format!("{}\n\n", self.source.run(&argv)?);

        if !patch.trim().is_empty() {
            let depth = format!("-p{}", self.paths.apply_depth());
            let mut apply_args = vec!["apply", "-3", "--ignore-whitespace", depth.as_str()];
            let directory;
            if self.paths.target_dir != "./" {
                directory = self.paths.target_dir.trim_end_matches('/').to_string();
                apply_args.push("--directory");
                apply_args.push(&directory);
            }
            if self.target.cmd(&apply_args).stdin(patch).mute().run().is_err() {
                // Known limitation: a failed squash patch overwrites in
                // place instead of diverting to a conflict branch.
                self.overwrite_from_source(end, &[start])?;
            }
        }

        let subject = logs::squash_subject(start, end);
        self.commit_projected(end, Some(&subject))?;

        let target_hash = self.target.rev_parse("HEAD")?;
        let scanner = Scanner {
            repo: &self.source,
            paths: &self.paths.source_paths,
            other: &self.target,
            other_paths: &self.paths.target_paths,
        };
        let range = scanner.scan_range(start, end)?;
        self.oracle
            .record_squash(&target_hash, range.iter().map(|e| e.key.clone()).collect());
        self.oracle.record(end, &target_hash);
        self.synced_count += 1;
        Ok(())
    }
}
