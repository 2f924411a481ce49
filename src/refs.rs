//! Ref inventory: branch and tag enumeration with include/exclude globs.

use anyhow::{bail, Context, Result};
use glob::Pattern;

use crate::conflict::CONFLICT_SUFFIX;
use crate::repo::GitRepo;

/// A tag as enumerated from `git show-ref --tags -d`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagInfo {
    pub name: String,
    /// Commit the tag points at (peeled for annotated tags).
    pub commit: String,
    pub annotated: bool,
}

/// Filter names through include/exclude glob lists.
///
/// An empty include list keeps everything. A name survives when at least
/// one include pattern matches and no exclude pattern does.
pub fn filter_refs(names: &[String], include: &[String], exclude: &[String]) -> Result<Vec<String>> {
    let include: Vec<Pattern> = if include.is_empty() {
        vec![Pattern::new("**").expect("literal pattern")]
    } else {
        include
            .iter()
            .map(|p| Pattern::new(p).with_context(|| format!("Invalid include pattern \"{}\"", p)))
            .collect::<Result<_>>()?
    };
    let exclude: Vec<Pattern> = exclude
        .iter()
        .map(|p| Pattern::new(p).with_context(|| format!("Invalid exclude pattern \"{}\"", p)))
        .collect::<Result<_>>()?;

    Ok(names
        .iter()
        .filter(|name| include.iter().any(|p| p.matches(name)))
        .filter(|name| !exclude.iter().any(|p| p.matches(name)))
        .cloned()
        .collect())
}

/// Enumerate the branches of a repository.
///
/// Local branches keep their name; remote-tracked branches are listed as
/// `origin/<name>`, suppressed when a local branch of the same name exists.
/// Repositories still carrying conflict branches from an aborted run are
/// rejected outright.
pub fn branches(repo: &GitRepo, include: &[String], exclude: &[String]) -> Result<Vec<String>> {
    let listing = repo.cmd(&["branch", "-a", "--no-color"]).mute().run().unwrap_or_default();

    let mut names: Vec<String> = Vec::new();
    for line in listing.lines() {
        // Two-character status prefix: "* ", "+ " or "  "
        let name = if line.len() > 2 { &line[2..] } else { continue };
        if name.starts_with("remotes/origin/HEAD") {
            continue;
        }
        let name = match name.strip_prefix("remotes/origin/") {
            Some(short) => format!("origin/{}", short),
            None => name.to_string(),
        };
        if !names.contains(&name) {
            names.push(name);
        }
    }

    // origin/X duplicates of a local X are projection noise
    let locals: Vec<String> = names.iter().filter(|n| !n.starts_with("origin/")).cloned().collect();
    names.retain(|name| match name.strip_prefix("origin/") {
        Some(short) => !locals.iter().any(|l| l == short),
        None => true,
    });

    let conflicted: Vec<&String> = names.iter().filter(|n| n.ends_with(CONFLICT_SUFFIX)).collect();
    if !conflicted.is_empty() {
        let joined = conflicted
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join("\", \"");
        bail!(
            "Repository \"{}\" has unmerged conflict branches \"{}\", please merge or remove branches before syncing.",
            repo.dir.display(),
            joined
        );
    }

    filter_refs(&names, include, exclude)
}

/// Enumerate tags with their target commits and annotated-ness.
///
/// `show-ref -d` appends a `^{}` line per annotated tag carrying the
/// peeled commit; its presence is what marks the tag annotated.
pub fn tags(repo: &GitRepo) -> Result<Vec<TagInfo>> {
    let listing = repo.cmd(&["show-ref", "--tags", "-d"]).mute().run().unwrap_or_default();

    let mut tags: Vec<TagInfo> = Vec::new();
    for line in listing.lines() {
        let Some((hash, refname)) = line.split_once(' ') else {
            continue;
        };
        let Some(name) = refname.strip_prefix("refs/tags/") else {
            continue;
        };
        match name.strip_suffix("^{}") {
            Some(base) => {
                // Peeled entry: rewrite the tag as annotated, pointing at
                // the dereferenced commit.
                if let Some(tag) = tags.iter_mut().find(|t| t.name == base) {
                    tag.commit = hash.to_string();
                    tag.annotated = true;
                }
            }
            None => tags.push(TagInfo {
                name: name.to_string(),
                commit: hash.to_string(),
                annotated: false,
            }),
        }
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_filter_refs_empty_include_keeps_all() -> Result<()> {
        let names = strings(&["master", "feature/x", "origin/dev"]);
        let kept = filter_refs(&names, &[], &[])?;
        assert_eq!(kept, names);
        Ok(())
    }

    #[test]
    fn test_filter_refs_include_glob() -> Result<()> {
        let names = strings(&["master", "feature/x", "feature/y", "dev"]);
        let kept = filter_refs(&names, &strings(&["feature/*"]), &[])?;
        assert_eq!(kept, strings(&["feature/x", "feature/y"]));
        Ok(())
    }

    #[test]
    fn test_filter_refs_exclude_wins() -> Result<()> {
        let names = strings(&["master", "dev", "wip"]);
        let kept = filter_refs(&names, &[], &strings(&["wip"]))?;
        assert_eq!(kept, strings(&["master", "dev"]));
        Ok(())
    }

    fn repo_with_commit() -> Result<(tempfile::TempDir, GitRepo)> {
        let dir = tempdir()?;
        let repo = GitRepo::open(dir.path());
        repo.run(&["init", "-b", "master"])?;
        repo.run(&["config", "user.name", "Test User"])?;
        repo.run(&["config", "user.email", "test@example.com"])?;
        fs::write(dir.path().join("a.txt"), "a")?;
        repo.run(&["add", "a.txt"])?;
        repo.run(&["commit", "-m", "initial"])?;
        Ok((dir, repo))
    }

    #[test]
    fn test_branches_lists_locals() -> Result<()> {
        let (_dir, repo) = repo_with_commit()?;
        repo.run(&["branch", "dev"])?;

        let names = branches(&repo, &[], &[])?;
        assert_eq!(names, strings(&["dev", "master"]));
        Ok(())
    }

    #[test]
    fn test_branches_rejects_conflict_branches() -> Result<()> {
        let (_dir, repo) = repo_with_commit()?;
        repo.run(&["branch", "master-gitsync-conflict"])?;

        let err = branches(&repo, &[], &[]).unwrap_err();
        assert!(err.to_string().contains("unmerged conflict branches"));
        assert!(err.to_string().contains("master-gitsync-conflict"));
        Ok(())
    }

    #[test]
    fn test_tags_annotated_and_lightweight() -> Result<()> {
        let (_dir, repo) = repo_with_commit()?;
        repo.run(&["tag", "light"])?;
        repo.run(&["tag", "-a", "annot", "-m", "release notes"])?;

        let mut tags = tags(&repo)?;
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "annot");
        assert!(tags[0].annotated);
        assert_eq!(tags[1].name, "light");
        assert!(!tags[1].annotated);

        let head = repo.rev_parse("HEAD")?;
        assert_eq!(tags[0].commit, head, "annotated tag must be peeled to the commit");
        assert_eq!(tags[1].commit, head);
        Ok(())
    }

    #[test]
    fn test_tags_none() -> Result<()> {
        let (_dir, repo) = repo_with_commit()?;
        assert!(tags(&repo)?.is_empty());
        Ok(())
    }
}
