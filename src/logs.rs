//! Log scanning: ordered, path-filtered graph listings of commits.
//!
//! Each scanned commit is keyed by `#<hash> <parents>` with a value of
//! `<author_ts> <subject>`. New commits are computed by value-level set
//! difference against the other side, because projected commits keep the
//! message and author timestamp while their hashes differ.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::pathspec::PathSpec;
use crate::repo::{GitRepo, EMPTY_TREE};

/// Subject format for squash commits. The hashes let an already-squashed
/// side be re-expanded to the pre-squash granularity.
static SQUASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^chore\(sync\): squash commits from ([0-9a-f]{40}) to ([0-9a-f]{40})$").unwrap());

/// Render the squash-commit subject for a source range.
pub fn squash_subject(start: &str, end: &str) -> String {
    format!("chore(sync): squash commits from {} to {}", start, end)
}

/// Extract `(start, end)` if the subject is a squash marker.
pub fn parse_squash_subject(subject: &str) -> Option<(String, String)> {
    let caps = SQUASH_RE.captures(subject.trim())?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// One row of a scanned log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// `#<hash> <space-separated parents>`
    pub key: String,
    /// `<author_ts> <subject>`
    pub value: String,
    /// Whether the row sat on the trunk of the `--graph` output.
    pub on_current_line: bool,
}

impl LogEntry {
    pub fn hash(&self) -> &str {
        parse_key(&self.key).0
    }

    /// Parent hashes; a root commit reports the empty tree.
    pub fn parents(&self) -> Vec<&str> {
        parse_key(&self.key).1
    }

    pub fn author_ts(&self) -> &str {
        self.value.split_once(' ').map(|(ts, _)| ts).unwrap_or(&self.value)
    }

    pub fn subject(&self) -> &str {
        self.value.split_once(' ').map(|(_, s)| s).unwrap_or("")
    }
}

/// Split a log key into hash and parents.
pub fn parse_key(key: &str) -> (&str, Vec<&str>) {
    let body = key.strip_prefix('#').unwrap_or(key);
    let mut fields = body.split_whitespace();
    let hash = fields.next().unwrap_or("");
    let parents: Vec<&str> = fields.collect();
    if parents.is_empty() {
        (hash, vec![EMPTY_TREE])
    } else {
        (hash, parents)
    }
}

/// Limits applied to a scan.
#[derive(Debug, Clone, Default)]
pub struct ScanLimits {
    pub after: Option<u64>,
    pub max_count: Option<u32>,
}

/// A log scanner over one repository, aware of the opposite side so that
/// squash markers can be expanded to the pre-squash commit range.
pub struct Scanner<'a> {
    pub repo: &'a GitRepo,
    pub paths: &'a [String],
    pub other: &'a GitRepo,
    pub other_paths: &'a [String],
}

impl<'a> Scanner<'a> {
    /// Scan the given refs (all refs when empty), oldest entries last.
    ///
    /// `on_first` receives the first hash seen before any squash
    /// expansion; the orchestrator uses it to pick the trunk branch.
    pub fn scan(
        &self,
        refs: &[String],
        limits: &ScanLimits,
        mut on_first: impl FnMut(&str),
    ) -> Result<Vec<LogEntry>> {
        let mut args = base_args(limits);
        if refs.is_empty() {
            args.push("--all".to_string());
        } else {
            args.extend(refs.iter().cloned());
        }
        PathSpec::append(&mut args, self.paths);

        let argv: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        let raw = self.repo.cmd(&argv).mute().run().unwrap_or_default();

        let mut entries = Vec::new();
        let mut first = true;
        for line in raw.lines() {
            let Some(entry) = parse_row(line) else { continue };
            if first {
                on_first(entry.hash());
                first = false;
            }
            self.push_expanded(entry, &mut entries)?;
        }
        Ok(entries)
    }

    /// Scan a commit range in this scanner's repository.
    pub fn scan_range(&self, start: &str, end: &str) -> Result<Vec<LogEntry>> {
        let mut args = base_args(&ScanLimits::default());
        if start == EMPTY_TREE {
            args.push(end.to_string());
        } else {
            args.push(format!("{}..{}", start, end));
        }
        PathSpec::append(&mut args, self.paths);

        let argv: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        let raw = self.repo.cmd(&argv).mute().run().unwrap_or_default();

        let mut entries = Vec::new();
        for line in raw.lines() {
            let Some(entry) = parse_row(line) else { continue };
            self.push_expanded(entry, &mut entries)?;
        }
        Ok(entries)
    }

    /// Append an entry, replacing squash markers with the pre-squash
    /// range scanned from the other repository.
    fn push_expanded(&self, entry: LogEntry, out: &mut Vec<LogEntry>) -> Result<()> {
        if let Some((start, end)) = parse_squash_subject(entry.subject()) {
            let other = Scanner {
                repo: self.other,
                paths: self.other_paths,
                other: self.repo,
                other_paths: self.paths,
            };
            let expanded = other
                .scan_range(&start, &end)
                .with_context(|| format!("Failed to expand squash range {}..{}", start, end))?;
            out.extend(expanded);
        } else {
            out.push(entry);
        }
        Ok(())
    }
}

fn base_args(limits: &ScanLimits) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "log".into(),
        "--graph".into(),
        "--format=#%H %P-%at %s".into(),
        "--full-history".into(),
        "--simplify-merges".into(),
    ];
    if let Some(after) = limits.after {
        args.push(format!("--after={}", after));
    }
    if let Some(n) = limits.max_count {
        args.push(format!("-{}", n));
    }
    args
}

/// Parse one `--graph` row. Rows without a `*` marker are graph plumbing.
fn parse_row(line: &str) -> Option<LogEntry> {
    let hash_pos = line.find('#')?;
    if !line[..hash_pos].contains('*') {
        return None;
    }
    let content = &line[hash_pos..];
    let (key, value) = content.split_once('-')?;
    Some(LogEntry {
        key: key.trim_end().to_string(),
        value: value.to_string(),
        on_current_line: line.starts_with('*'),
    })
}

/// Entries of `source` whose value does not appear in `target`.
///
/// The comparison is value-level: a projected commit has a different hash
/// but the same author timestamp and subject.
pub fn new_entries(source: &[LogEntry], target: &[LogEntry]) -> Vec<LogEntry> {
    let seen: HashSet<&str> = target.iter().map(|e| e.value.as_str()).collect();
    source
        .iter()
        .filter(|e| !seen.contains(e.value.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_key_with_parents() {
        let (hash, parents) = parse_key("#abc123 def456 789abc");
        assert_eq!(hash, "abc123");
        assert_eq!(parents, vec!["def456", "789abc"]);
    }

    #[test]
    fn test_parse_key_root_commit_uses_empty_tree() {
        let (hash, parents) = parse_key("#abc123");
        assert_eq!(hash, "abc123");
        assert_eq!(parents, vec![EMPTY_TREE]);

        let (_, parents) = parse_key("#abc123 ");
        assert_eq!(parents, vec![EMPTY_TREE]);
    }

    #[test]
    fn test_parse_row_trunk_and_branch_lines() {
        let entry = parse_row("* #abc 123-1700000000 add feature").unwrap();
        assert!(entry.on_current_line);
        assert_eq!(entry.key, "#abc 123");
        assert_eq!(entry.value, "1700000000 add feature");

        let entry = parse_row("| * #def 456-1700000001 side work").unwrap();
        assert!(!entry.on_current_line);

        assert!(parse_row("|/").is_none());
        assert!(parse_row("| |").is_none());
    }

    #[test]
    fn test_parse_row_subject_with_dash() {
        let entry = parse_row("* #abc 123-1700000000 fix: re-order steps").unwrap();
        assert_eq!(entry.subject(), "fix: re-order steps");
        assert_eq!(entry.author_ts(), "1700000000");
    }

    #[test]
    fn test_squash_subject_round_trip() {
        let start = EMPTY_TREE;
        let end = "1234567890123456789012345678901234567890";
        let subject = squash_subject(start, end);
        let (a, b) = parse_squash_subject(&subject).unwrap();
        assert_eq!(a, start);
        assert_eq!(b, end);
    }

    #[test]
    fn test_parse_squash_subject_rejects_other_subjects() {
        assert!(parse_squash_subject("add feature").is_none());
        assert!(parse_squash_subject("chore(sync): squash commits from x to y").is_none());
    }

    #[test]
    fn test_new_entries_is_value_level() {
        let source = vec![
            LogEntry {
                key: "#a1".into(),
                value: "100 one".into(),
                on_current_line: true,
            },
            LogEntry {
                key: "#a2 a1".into(),
                value: "200 two".into(),
                on_current_line: true,
            },
        ];
        // Target hash differs but value matches: commit exists.
        let target = vec![LogEntry {
            key: "#b1".into(),
            value: "100 one".into(),
            on_current_line: true,
        }];
        let fresh = new_entries(&source, &target);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].value, "200 two");
    }

    #[test]
    fn test_scan_real_repo() -> Result<()> {
        let dir = tempdir()?;
        let repo = GitRepo::open(dir.path());
        repo.run(&["init", "-b", "master"])?;
        repo.run(&["config", "user.name", "Test User"])?;
        repo.run(&["config", "user.email", "test@example.com"])?;
        fs::write(dir.path().join("a.txt"), "a")?;
        repo.run(&["add", "a.txt"])?;
        repo.run(&["commit", "-m", "first"])?;
        fs::write(dir.path().join("a.txt"), "b")?;
        repo.run(&["commit", "-am", "second"])?;

        let paths = vec!["./".to_string()];
        let scanner = Scanner {
            repo: &repo,
            paths: &paths,
            other: &repo,
            other_paths: &paths,
        };
        let mut first_hash = String::new();
        let entries = scanner.scan(&["master".to_string()], &ScanLimits::default(), |h| {
            first_hash = h.to_string();
        })?;

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].subject(), "second");
        assert_eq!(entries[1].subject(), "first");
        assert_eq!(first_hash, repo.rev_parse("HEAD")?);
        assert_eq!(entries[1].parents(), vec![EMPTY_TREE]);
        Ok(())
    }
}
