//! Git driver: the only module that invokes the external git binary.
//!
//! Every git touch in the engine goes through [`GitRepo`], which spawns
//! `git` inside the repository directory and hands back trimmed stdout.
//! Failures carry the stderr payload; there are no retries. Commands that
//! are expected to fail (merge, apply) run muted so their stderr does not
//! leak into the output while the caller handles the error.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::context::ExecutionContext;
use crate::ui;

/// Hash of the git empty tree, used as the parent sentinel for root commits.
pub const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// Echo a git command if verbose mode is enabled
fn verbose_cmd(dir: &Path, args: &[String]) {
    if ExecutionContext::is_verbose() {
        eprintln!(
            "  {} {}",
            ui::dim_style(format!("[cmd] git -C {}", dir.display())),
            ui::cmd_style(args.join(" "))
        );
    }
}

/// A working git repository the engine drives.
#[derive(Debug, Clone)]
pub struct GitRepo {
    /// Repository directory (working tree root)
    pub dir: PathBuf,
}

/// One git invocation under construction.
pub struct GitCmd<'a> {
    repo: &'a GitRepo,
    args: Vec<String>,
    stdin: Option<String>,
    env: HashMap<String, String>,
    mute: bool,
}

impl<'a> GitCmd<'a> {
    /// Feed the given bytes to git's stdin.
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Overlay an environment variable onto the child process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Suppress stderr reporting on failure. The error still propagates,
    /// carrying the stderr payload, for callers that expect failure.
    pub fn mute(mut self) -> Self {
        self.mute = true;
        self
    }

    /// Spawn git and wait for it, returning trimmed stdout.
    pub fn run(self) -> Result<String> {
        verbose_cmd(&self.repo.dir, &self.args);

        let mut cmd = Command::new("git");
        cmd.args(&self.args)
            .current_dir(&self.repo.dir)
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn git {}", self.args.join(" ")))?;

        if let Some(input) = &self.stdin {
            child
                .stdin
                .as_mut()
                .context("Failed to open git stdin")?
                .write_all(input.as_bytes())
                .context("Failed to write to git stdin")?;
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("Failed to run git {}", self.args.join(" ")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
            if !self.mute && !stderr.is_empty() {
                ui::error_stderr(&stderr);
            }
            bail!("git {} failed: {}", self.args.join(" "), stderr);
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}

impl GitRepo {
    /// Wrap an existing repository directory.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Start building a git invocation.
    pub fn cmd(&self, args: &[&str]) -> GitCmd<'_> {
        GitCmd {
            repo: self,
            args: args.iter().map(|s| s.to_string()).collect(),
            stdin: None,
            env: HashMap::new(),
            mute: false,
        }
    }

    /// Run a git command with no stdin and no environment overlay.
    pub fn run(&self, args: &[&str]) -> Result<String> {
        self.cmd(args).run()
    }

    /// Resolve a ref to a full hash.
    pub fn rev_parse(&self, reference: &str) -> Result<String> {
        self.cmd(&["rev-parse", reference]).mute().run()
    }

    /// Resolve a ref to a full hash, or None if it does not resolve.
    pub fn try_rev_parse(&self, reference: &str) -> Option<String> {
        self.cmd(&["rev-parse", reference])
            .mute()
            .run()
            .ok()
            .filter(|h| !h.is_empty())
    }

    /// Whether the repository has at least one commit on any ref.
    pub fn has_commits(&self) -> bool {
        self.cmd(&["rev-list", "-n", "1", "--all"])
            .mute()
            .run()
            .map(|out| !out.is_empty())
            .unwrap_or(false)
    }

    /// Porcelain-short status output; empty when the worktree is clean.
    pub fn status_short(&self) -> Result<String> {
        self.run(&["status", "--short"])
    }

    /// Name of the currently checked-out branch.
    ///
    /// Falls back to the symbolic HEAD for repositories with no commits,
    /// where `git branch` prints nothing.
    pub fn current_branch(&self) -> Result<String> {
        let listing = self.cmd(&["branch", "--no-color"]).mute().run().unwrap_or_default();
        for line in listing.lines() {
            if let Some(name) = line.strip_prefix("* ") {
                if !name.starts_with('(') {
                    return Ok(name.trim().to_string());
                }
            }
        }
        self.cmd(&["symbolic-ref", "--short", "HEAD"])
            .mute()
            .run()
            .context("Failed to determine current branch")
    }

    /// Whether a local branch exists.
    pub fn branch_exists(&self, name: &str) -> bool {
        self.try_rev_parse(&format!("refs/heads/{}", name)).is_some()
    }
}
