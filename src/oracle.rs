//! Identity oracle: maps a source commit hash to its projected target
//! commit hash.
//!
//! Resolution is content-and-time correspondence, not tree identity: the
//! projected commit keeps the first line of the source message and the
//! author timestamp, so those two fields are the search key. Resolutions
//! are cached and never rewritten within a run.

use anyhow::{bail, Result};
use std::collections::HashMap;

use crate::logs::{parse_key, parse_squash_subject};
use crate::pathspec::PathSpec;
use crate::repo::GitRepo;

pub struct IdentityOracle {
    source: GitRepo,
    target: GitRepo,
    target_paths: Vec<String>,
    /// source hash → target hash, grow-only
    cache: HashMap<String, String>,
    /// squash target hash → source log keys it collapsed, grow-only
    squash_ranges: HashMap<String, Vec<String>>,
}

impl IdentityOracle {
    pub fn new(source: &GitRepo, target: &GitRepo, target_paths: &[String]) -> Self {
        Self {
            source: source.clone(),
            target: target.clone(),
            target_paths: target_paths.to_vec(),
            cache: HashMap::new(),
            squash_ranges: HashMap::new(),
        }
    }

    /// Record a projection. First write wins; a projected commit's
    /// identity never changes within a run.
    pub fn record(&mut self, source_hash: &str, target_hash: &str) {
        self.cache
            .entry(source_hash.to_string())
            .or_insert_with(|| target_hash.to_string());
    }

    /// Record the source log keys collapsed into one squash commit, so
    /// later lookups can resolve into the middle of the range.
    pub fn record_squash(&mut self, target_hash: &str, source_keys: Vec<String>) {
        self.squash_ranges.entry(target_hash.to_string()).or_insert(source_keys);
    }

    /// Resolve a source hash, failing when no counterpart exists.
    pub fn resolve_required(&mut self, source_hash: &str) -> Result<String> {
        match self.resolve(source_hash)? {
            Some(hash) => Ok(hash),
            None => bail!("Commit not found in target repository: {}", source_hash),
        }
    }

    /// Resolve a source hash to the target hash of its projection.
    pub fn resolve(&mut self, source_hash: &str) -> Result<Option<String>> {
        if let Some(hit) = self.cache.get(source_hash) {
            return Ok(Some(hit.clone()));
        }

        let raw = self
            .source
            .run(&["log", "--format=%ct %at %B", "-1", source_hash])?;
        let first_line = raw.lines().next().unwrap_or("");
        let mut fields = first_line.splitn(3, ' ');
        let committer_ts = fields.next().unwrap_or("").to_string();
        let author_ts = fields.next().unwrap_or("").to_string();
        let search_key = fields.next().unwrap_or("").to_string();

        // A squash marker names its own pre-squash endpoint; that endpoint
        // is the counterpart in the repository the squash came from.
        if let Some((_, end)) = parse_squash_subject(&search_key) {
            self.cache.insert(source_hash.to_string(), end.clone());
            return Ok(Some(end));
        }

        let resolved = self.search(&committer_ts, &author_ts, &search_key)?;
        let resolved = match resolved {
            Some(hash) => Some(hash),
            None => self.search_squash_ranges(source_hash),
        };
        if let Some(hash) = &resolved {
            self.cache.insert(source_hash.to_string(), hash.clone());
        }
        Ok(resolved)
    }

    /// First target commit in the committer-second window whose message
    /// contains the search key, across all refs. Used by the conflict
    /// diverter to root conflict branches.
    pub(crate) fn locate_by_time(&self, committer_ts: &str, search_key: &str) -> Option<String> {
        self.window_query(committer_ts, search_key)
            .first()
            .map(|h| h.to_string())
    }

    fn window_query(&self, committer_ts: &str, search_key: &str) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "log".into(),
            format!("--after={}", committer_ts),
            format!("--before={}", committer_ts),
            format!("--grep={}", search_key),
            "--fixed-strings".into(),
            "--format=%H".into(),
            "--all".into(),
        ];
        PathSpec::append(&mut args, &self.target_paths);
        let argv: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        let out = self.target.cmd(&argv).mute().run().unwrap_or_default();
        out.lines().filter(|l| !l.is_empty()).map(|l| l.to_string()).collect()
    }

    /// Content-and-time search in the target.
    fn search(&self, committer_ts: &str, author_ts: &str, search_key: &str) -> Result<Option<String>> {
        let hits = self.window_query(committer_ts, search_key);

        if hits.len() == 1 {
            return Ok(Some(hits[0].to_string()));
        }

        // The committer-date window misses rebased commits (rebase rewrites
        // the committer date) and commits listed out of date order, where
        // git log short-circuits. Drop the window and pin the author
        // timestamp instead, which projection preserves.
        let mut args: Vec<String> = vec![
            "log".into(),
            format!("--grep={}", search_key),
            "--fixed-strings".into(),
            "--format=%H %at".into(),
            "--all".into(),
        ];
        PathSpec::append(&mut args, &self.target_paths);
        let argv: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        let out = self.target.cmd(&argv).mute().run().unwrap_or_default();

        let matched: Vec<&str> = out
            .lines()
            .filter_map(|line| line.split_once(' '))
            .filter(|(_, at)| *at == author_ts)
            .map(|(hash, _)| hash)
            .collect();

        match matched.len() {
            0 => Ok(None),
            1 => Ok(Some(matched[0].to_string())),
            _ => bail!(
                "Expected to return one commit, but returned more than one commit with the same message in the same second: \"{}\"",
                matched.join("\", \"")
            ),
        }
    }

    /// Find the squash commit whose collapsed range covers this hash.
    fn search_squash_ranges(&self, source_hash: &str) -> Option<String> {
        for (target_hash, keys) in &self.squash_ranges {
            if keys.iter().any(|key| parse_key(key).0 == source_hash) {
                return Some(target_hash.clone());
            }
        }
        None
    }
}
