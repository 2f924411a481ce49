//! Plugin hook points.
//!
//! A plugin is an executable sidecar speaking a line-less JSON protocol on
//! stdin. At registry construction each plugin is asked to describe
//! itself; the answer is the list of hooks it implements. Only `prepare`
//! (before scanning) and `beforeCommit` (immediately before each `git
//! commit`) are recognized; anything else is rejected at construction.
//!
//! Hooks run in declared order, one at a time. A hook message carries the
//! repository directories and the run options; the projection state stays
//! inside the engine.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::options::SyncOptions;

pub const HOOK_PREPARE: &str = "prepare";
pub const HOOK_BEFORE_COMMIT: &str = "beforeCommit";

#[derive(Serialize)]
struct HookMessage<'a> {
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<&'a SyncOptions>,
}

#[derive(Debug)]
struct Plugin {
    path: PathBuf,
    hooks: Vec<String>,
}

/// The loaded plugin set for one run.
#[derive(Default, Debug)]
pub struct PluginRegistry {
    plugins: Vec<Plugin>,
}

impl PluginRegistry {
    /// Load plugins, validating their exported hook names up front.
    pub fn load(paths: &[PathBuf]) -> Result<Self> {
        let mut plugins = Vec::with_capacity(paths.len());
        for path in paths {
            let answer = invoke(
                path,
                &HookMessage {
                    method: "describe",
                    source: None,
                    target: None,
                    options: None,
                },
            )?;
            let hooks: Vec<String> = serde_json::from_str(&answer)
                .with_context(|| format!("Plugin \"{}\" returned malformed hook list", path.display()))?;
            for hook in &hooks {
                if hook != HOOK_PREPARE && hook != HOOK_BEFORE_COMMIT {
                    bail!(
                        "Unsupported method \"{}\" in plugin \"{}\", please remove it from export",
                        hook,
                        path.display()
                    );
                }
            }
            plugins.push(Plugin {
                path: path.clone(),
                hooks,
            });
        }
        Ok(Self { plugins })
    }

    /// Run the `prepare` hooks, in declared order.
    pub fn prepare(&self, source: &Path, target: &Path, options: &SyncOptions) -> Result<()> {
        self.run_hook(HOOK_PREPARE, source, target, options)
    }

    /// Run the `beforeCommit` hooks, in declared order.
    pub fn before_commit(&self, source: &Path, target: &Path, options: &SyncOptions) -> Result<()> {
        self.run_hook(HOOK_BEFORE_COMMIT, source, target, options)
    }

    fn run_hook(&self, method: &str, source: &Path, target: &Path, options: &SyncOptions) -> Result<()> {
        let source = source.to_string_lossy();
        let target = target.to_string_lossy();
        for plugin in &self.plugins {
            if !plugin.hooks.iter().any(|h| h == method) {
                continue;
            }
            invoke(
                &plugin.path,
                &HookMessage {
                    method,
                    source: Some(&source),
                    target: Some(&target),
                    options: Some(options),
                },
            )?;
        }
        Ok(())
    }
}

/// Spawn a plugin once, feed it one JSON message, return its stdout.
fn invoke(path: &Path, message: &HookMessage) -> Result<String> {
    let payload = serde_json::to_string(message).context("Failed to serialize hook message")?;

    let mut child = Command::new(path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to spawn plugin \"{}\"", path.display()))?;

    child
        .stdin
        .as_mut()
        .context("Failed to open plugin stdin")?
        .write_all(payload.as_bytes())
        .context("Failed to write to plugin stdin")?;

    let output = child
        .wait_with_output()
        .with_context(|| format!("Failed to run plugin \"{}\"", path.display()))?;

    if !output.status.success() {
        bail!(
            "Plugin \"{}\" failed on \"{}\": {}",
            path.display(),
            message.method,
            String::from_utf8_lossy(&output.stderr).trim_end()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[cfg(unix)]
    fn write_plugin(dir: &Path, name: &str, hooks_json: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        fs::write(
            &path,
            format!("#!/bin/sh\nread -r _msg\nprintf '%s' '{}'\n", hooks_json),
        )
        .unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    #[cfg(unix)]
    fn test_load_accepts_known_hooks() -> Result<()> {
        let dir = tempdir()?;
        let path = write_plugin(dir.path(), "ok-plugin", r#"["prepare","beforeCommit"]"#);
        let registry = PluginRegistry::load(&[path])?;

        let options = SyncOptions::default();
        registry.prepare(dir.path(), dir.path(), &options)?;
        registry.before_commit(dir.path(), dir.path(), &options)?;
        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn test_load_rejects_unknown_hook() {
        let dir = tempdir().unwrap();
        let path = write_plugin(dir.path(), "bad-plugin", r#"["prepare","afterCommit"]"#);
        let err = PluginRegistry::load(&[path]).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("Unsupported method \"afterCommit\""));
        assert!(text.contains("please remove it from export"));
    }

    #[test]
    fn test_empty_registry_is_a_noop() -> Result<()> {
        let dir = tempdir()?;
        let registry = PluginRegistry::load(&[])?;
        registry.prepare(dir.path(), dir.path(), &SyncOptions::default())?;
        Ok(())
    }
}
