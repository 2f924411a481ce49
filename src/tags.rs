//! Tag reconciliation.
//!
//! Source tags are projected by name with optional prefix transforms.
//! Annotated tags stay annotated with their annotation body intact;
//! lightweight tags stay lightweight.

use anyhow::Result;
use std::collections::HashSet;

use crate::engine::Sync;
use crate::refs;
use crate::ui;

impl Sync {
    pub(crate) fn reconcile_tags(&mut self) -> Result<()> {
        let source_tags = refs::tags(&self.source)?;
        let target_tags = refs::tags(&self.target)?;
        let target_names: HashSet<&str> = target_tags.iter().map(|t| t.name.as_str()).collect();

        // Stripping a prefix only makes sense for tags that carry it.
        let mut include = self.options.include_tags.clone();
        if !self.options.remove_tag_prefix.is_empty() {
            include.push(format!("{}*", self.options.remove_tag_prefix));
        }
        let names: Vec<String> = source_tags.iter().map(|t| t.name.clone()).collect();
        let kept = refs::filter_refs(&names, &include, &self.options.exclude_tags)?;

        let mut new_count = 0;
        let mut exists_count = 0;
        for tag in &source_tags {
            if !kept.contains(&tag.name) {
                continue;
            }
            let stripped = tag
                .name
                .strip_prefix(&self.options.remove_tag_prefix)
                .unwrap_or(&tag.name);
            let final_name = format!("{}{}", self.options.add_tag_prefix, stripped);
            if target_names.contains(final_name.as_str()) {
                exists_count += 1;
                continue;
            }

            let resolved = match self.oracle.resolve(&tag.commit)? {
                Some(hash) => hash,
                None => {
                    ui::warning(&format!("Commit not found in target repository, tag: {}", tag.name));
                    continue;
                }
            };

            if tag.annotated {
                let body = self
                    .source
                    .run(&["tag", "-l", "--format=%(contents)", &tag.name])?;
                self.target.run(&["tag", "-m", &body, &final_name, &resolved])?;
            } else {
                self.target.run(&["tag", &final_name, &resolved])?;
            }
            new_count += 1;
        }

        println!(
            "Tags: new: {}, exists: {}, source: {}, target: {}",
            new_count,
            exists_count,
            source_tags.len(),
            target_tags.len()
        );
        Ok(())
    }
}
