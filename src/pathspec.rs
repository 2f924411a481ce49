//! Path-spec translation.
//!
//! Converts the user-facing subdirectories plus pathspec filters into the
//! two parallel path lists that scope every `git log`, `git diff-tree` and
//! `git apply` the engine issues. Pathspec magic prefixes (`:^`, `:!`,
//! `:/`, `:(...)`) survive the translation; only the path tail is
//! re-rooted under the subdirectory.

/// Parallel source/target pathspec lists for one run.
#[derive(Debug, Clone)]
pub struct PathSpec {
    /// Normalized source subdirectory, ending in `/` (`./` for root).
    pub source_dir: String,
    /// Normalized target subdirectory, same shape.
    pub target_dir: String,
    /// Pathspecs scoping source-side commands.
    pub source_paths: Vec<String>,
    /// Pathspecs scoping target-side commands.
    pub target_paths: Vec<String>,
}

/// Normalize a user-supplied subdirectory.
///
/// `##` unescapes to a literal `#`; a single `#` starts an alias suffix
/// which is split off (it names a config entry for outer collaborators,
/// the engine ignores it). The directory itself is returned ending in `/`,
/// with `./` standing for the repository root.
pub fn normalize_subdir(raw: &str) -> (String, Option<String>) {
    let mut dir = String::new();
    let mut alias = None;
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '#' {
            if chars.peek() == Some(&'#') {
                chars.next();
                dir.push('#');
            } else {
                alias = Some(chars.collect::<String>());
                break;
            }
        } else {
            dir.push(c);
        }
    }

    let dir = dir.trim();
    let dir = dir.strip_prefix("./").unwrap_or(dir);
    let dir = dir.trim_end_matches('/');
    let normalized = if dir.is_empty() || dir == "." {
        "./".to_string()
    } else {
        format!("{}/", dir)
    };
    (normalized, alias)
}

/// Split a git pathspec into its magic prefix and path tail.
fn split_magic(filter: &str) -> (&str, &str) {
    for prefix in [":^", ":!"] {
        if let Some(tail) = filter.strip_prefix(prefix) {
            return (prefix, tail);
        }
    }
    if filter.starts_with(":(") {
        if let Some(end) = filter.find(')') {
            return filter.split_at(end + 1);
        }
    }
    if let Some(tail) = filter.strip_prefix(":/") {
        return (":/", tail);
    }
    ("", filter)
}

/// Prepend a subdirectory to a filter tail, preserving root as-is.
fn rejoin(dir: &str, tail: &str) -> String {
    if dir == "./" {
        tail.to_string()
    } else {
        format!("{}{}", dir, tail)
    }
}

impl PathSpec {
    /// Build the parallel path lists from raw subdirectories and filters.
    pub fn new(source_dir_raw: &str, target_dir_raw: &str, filters: &[String]) -> Self {
        let (source_dir, _) = normalize_subdir(source_dir_raw);
        let (target_dir, _) = normalize_subdir(target_dir_raw);

        let (source_paths, target_paths) = if filters.is_empty() {
            (vec![source_dir.clone()], vec![target_dir.clone()])
        } else {
            let mut source_paths = Vec::with_capacity(filters.len());
            let mut target_paths = Vec::with_capacity(filters.len());
            for filter in filters {
                let (magic, tail) = split_magic(filter);
                source_paths.push(format!("{}{}", magic, rejoin(&source_dir, tail)));
                target_paths.push(format!("{}{}", magic, rejoin(&target_dir, tail)));
            }
            (source_paths, target_paths)
        };

        Self {
            source_dir,
            target_dir,
            source_paths,
            target_paths,
        }
    }

    /// `-p<N>` strip depth for `git apply`: one for the `a/` prefix plus
    /// one per source-subdirectory segment.
    pub fn apply_depth(&self) -> usize {
        1 + segment_count(&self.source_dir)
    }

    /// Append `-- <paths>` to an argv unless the single path is the root.
    ///
    /// Root-scoped logs deliberately omit the terminator: a path filter
    /// would drop empty-tree merge commits from the listing.
    pub fn append(args: &mut Vec<String>, paths: &[String]) {
        if paths.len() == 1 && paths[0] == "./" {
            return;
        }
        args.push("--".to_string());
        args.extend(paths.iter().cloned());
    }

    /// Rebase a source-relative file path onto the target subdirectory.
    pub fn to_target_path(&self, source_file: &str) -> String {
        let rel = if self.source_dir == "./" {
            source_file
        } else {
            source_file.strip_prefix(&self.source_dir).unwrap_or(source_file)
        };
        rejoin(&self.target_dir, rel)
    }
}

fn segment_count(dir: &str) -> usize {
    if dir == "./" {
        0
    } else {
        dir.trim_end_matches('/').split('/').count()
    }
}
