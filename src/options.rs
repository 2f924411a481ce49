//! Run configuration for a single sync.
//!
//! A `SyncOptions` value is immutable for the duration of a run. The CLI
//! builds one from its arguments; tests build them directly.

use serde::Serialize;
use std::path::PathBuf;

/// Immutable configuration for one sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOptions {
    /// Subdirectory of the source repository to project from.
    /// `"."` or `""` means the repository root.
    pub source_dir: String,
    /// Subdirectory of the target repository to project into.
    pub target_dir: String,

    /// Branch include globs. Empty keeps all branches.
    pub include_branches: Vec<String>,
    /// Branch exclude globs.
    pub exclude_branches: Vec<String>,

    /// Tag include globs. Empty keeps all tags.
    pub include_tags: Vec<String>,
    /// Tag exclude globs.
    pub exclude_tags: Vec<String>,
    /// Prefix prepended to every projected tag name.
    pub add_tag_prefix: String,
    /// Prefix stripped from every source tag name before projection.
    /// Setting this implicitly restricts the sync to tags carrying it.
    pub remove_tag_prefix: String,
    /// Skip tag reconciliation entirely.
    pub no_tags: bool,

    /// Only consider source commits after this unix timestamp.
    pub after: Option<u64>,
    /// Limit the number of scanned source commits.
    pub max_count: Option<u32>,

    /// Copy author/committer identity and timestamps onto projected commits.
    pub preserve_commit: bool,

    /// Additional pathspec filters (git pathspec notation) scoping the sync.
    pub filters: Vec<String>,

    /// Collapse each source-branch range into a single target commit.
    pub squash: bool,
    /// Branch squashed first; other branches are based on its target tip.
    pub squash_base_branch: String,

    /// Globs naming branches that are force-deleted in the target and
    /// recreated on every run (branches humans force-rebase).
    pub develop_branches: Vec<String>,

    /// Skip creating a branch whose projected tip coincides with an
    /// existing target branch tip.
    pub skip_even_branch: bool,

    /// Plugin executables given hook points into the run.
    pub plugins: Vec<PathBuf>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            source_dir: ".".to_string(),
            target_dir: ".".to_string(),
            include_branches: Vec::new(),
            exclude_branches: Vec::new(),
            include_tags: Vec::new(),
            exclude_tags: Vec::new(),
            add_tag_prefix: String::new(),
            remove_tag_prefix: String::new(),
            no_tags: false,
            after: None,
            max_count: None,
            preserve_commit: true,
            filters: Vec::new(),
            squash: false,
            squash_base_branch: "master".to_string(),
            develop_branches: Vec::new(),
            skip_even_branch: false,
            plugins: Vec::new(),
        }
    }
}
