//! Branch reconciliation.
//!
//! After commit projection, every included source branch is walked and its
//! tip resolved through the identity oracle. The target branch is then
//! created, fast-forwarded or force-moved into place; genuine divergence
//! is parked on a conflict branch for manual merging.

use anyhow::Result;

use crate::conflict::CONFLICT_SUFFIX;
use crate::engine::Sync;
use crate::ui;

impl Sync {
    pub(crate) fn reconcile_branches(
        &mut self,
        source_branches: &[String],
        target_branch_count: usize,
    ) -> Result<()> {
        let mut new_count = 0;
        let mut exists_count = 0;

        for branch in source_branches {
            // A local projection of origin/X is named X.
            let local_name = branch.strip_prefix("origin/").unwrap_or(branch).to_string();

            if self.conflict_branches.contains(&local_name) {
                // Its divergence is already parked; the summary covers it.
                continue;
            }

            let source_tip = self.source.rev_parse(branch)?;
            let resolved = match self.oracle.resolve(&source_tip)? {
                Some(hash) => hash,
                None => {
                    ui::warning(&format!("Commit not found in target repository, branch: {}", branch));
                    continue;
                }
            };

            if !self.target.branch_exists(&local_name) {
                if self.options.skip_even_branch {
                    if let Some(other) = self.even_branch(&local_name, &resolved) {
                        ui::bullet(&format!(
                            "Skip creating branch \"{}\", which is even with: {}",
                            ui::branch_style(&local_name),
                            ui::branch_style(&other)
                        ));
                        continue;
                    }
                }
                self.move_branch(&local_name, &resolved)?;
                new_count += 1;
                continue;
            }

            exists_count += 1;
            let target_tip = self.target.rev_parse(&local_name)?;
            if target_tip == resolved {
                ui::step(&format!("Branch \"{}\" is up to date", ui::branch_style(&local_name)));
                continue;
            }

            let base = self
                .target
                .cmd(&["merge-base", &target_tip, &resolved])
                .mute()
                .run()
                .unwrap_or_default();
            if base == target_tip {
                // Target strictly behind: fast-forward.
                self.move_branch(&local_name, &resolved)?;
            } else if base == resolved {
                // Target has commits ahead of the projection; leave it.
                ui::step(&format!(
                    "Branch \"{}\" is ahead of source, skipping",
                    ui::branch_style(&local_name)
                ));
            } else if local_name == self.default_branch
                || format!("{}{}", local_name, CONFLICT_SUFFIX) == self.default_branch
            {
                // The projection branch itself; its state is the projection.
            } else {
                let conflict_name = format!("{}{}", local_name, CONFLICT_SUFFIX);
                self.target.run(&["branch", "-f", &conflict_name, &resolved])?;
                self.conflict_branches.push(local_name);
            }
        }

        println!(
            "Branches: new: {}, exists: {}, source: {}, target: {}",
            new_count,
            exists_count,
            source_branches.len(),
            target_branch_count
        );
        Ok(())
    }

    /// Point a branch at a commit, via reset when it is checked out.
    fn move_branch(&self, name: &str, hash: &str) -> Result<()> {
        let current = self.target.current_branch().unwrap_or_default();
        if current == name {
            self.target.run(&["reset", "--hard", hash])?;
        } else {
            self.target.run(&["branch", "-f", name, hash])?;
        }
        Ok(())
    }

    /// An existing target branch whose tip already equals `hash`, if any.
    fn even_branch(&self, except: &str, hash: &str) -> Option<String> {
        let listing = self.target.cmd(&["branch", "--no-color"]).mute().run().ok()?;
        for line in listing.lines() {
            let Some(name) = line.get(2..).map(str::trim) else { continue };
            if name.is_empty() || name == except || name.starts_with('(') {
                continue;
            }
            if self.target.try_rev_parse(&format!("refs/heads/{}", name)).as_deref() == Some(hash) {
                return Some(name.to_string());
            }
        }
        None
    }
}
