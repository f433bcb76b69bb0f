//! Git adapter for corpus checkouts.
//!
//! This crate is intentionally thin: it shells out to `git` and keeps no
//! opinion about which repositories are checked out or why. A checkout
//! directory is mutated in place, so callers must not share one directory
//! between concurrent runs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Errors from interacting with git.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("git executable is not available in PATH")]
    NotInstalled,

    #[error("command failed: git {args} ({message})")]
    CommandFailed { args: String, message: String },

    #[error("unable to parse git output: {0}")]
    Parse(String),
}

/// Where a checkout ended up and which commit it points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSnapshot {
    pub path: PathBuf,
    pub git_ref: String,
    pub head: String,
}

/// Thin client around the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitClient {
    program: PathBuf,
}

impl Default for GitClient {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }
}

impl GitClient {
    /// Client that runs a specific git executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Returns true if git is available.
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Bring `path` to exactly `git_ref` of `uri`.
    ///
    /// A missing directory is cloned; an existing one is fetched and
    /// cleaned. Either way the ref is checked out, hard-reset and cleaned
    /// again so no local state survives.
    pub fn checkout(
        &self,
        uri: &str,
        git_ref: &str,
        path: impl AsRef<Path>,
    ) -> Result<CheckoutSnapshot, GitError> {
        let path = path.as_ref();
        if path.exists() {
            info!(path = %path.display(), "updating existing checkout");
            self.run(path, &["fetch", "--tags", "origin"])?;
            self.run(path, &["clean", "--force", "-d", "-x"])?;
        } else {
            info!(uri, path = %path.display(), "cloning");
            let parent = path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(parent).map_err(|e| GitError::CommandFailed {
                args: format!("clone {uri}"),
                message: format!("cannot create {}: {e}", parent.display()),
            })?;
            let name = path
                .file_name()
                .ok_or_else(|| GitError::Parse(format!("no directory name in {}", path.display())))?
                .to_string_lossy();
            self.run(parent, &["clone", uri, name.as_ref()])?;
        }
        self.run(path, &["checkout", "--force", git_ref])?;
        self.run(path, &["reset", "--hard"])?;
        self.run(path, &["clean", "--force", "-d", "-x"])?;
        let head = self.head(path)?;
        debug!(path = %path.display(), git_ref, head = %head, "checkout ready");
        Ok(CheckoutSnapshot {
            path: path.to_path_buf(),
            git_ref: git_ref.to_string(),
            head,
        })
    }

    /// Commit id at `HEAD`.
    pub fn head(&self, path: impl AsRef<Path>) -> Result<String, GitError> {
        let stdout = self.run(path.as_ref(), &["rev-parse", "HEAD"])?;
        first_nonempty_line(&stdout)
            .map(ToOwned::to_owned)
            .ok_or_else(|| GitError::Parse("git rev-parse returned empty output".to_string()))
    }

    fn run(&self, cwd: &Path, args: &[&str]) -> Result<String, GitError> {
        debug!(cwd = %cwd.display(), "git {}", args.join(" "));
        let output = Command::new(&self.program)
            .args(args)
            .current_dir(cwd)
            .output()
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    GitError::NotInstalled
                } else {
                    GitError::CommandFailed {
                        args: args.join(" "),
                        message: err.to_string(),
                    }
                }
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                "unknown error".to_string()
            } else {
                stderr
            };
            Err(GitError::CommandFailed {
                args: args.join(" "),
                message,
            })
        }
    }
}

fn first_nonempty_line(input: &str) -> Option<&str> {
    input.lines().map(str::trim).find(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_nonempty_line_finds_trimmed_line() {
        let s = "\n\n  abc123  \n";
        assert_eq!(first_nonempty_line(s), Some("abc123"));
    }

    #[test]
    fn first_nonempty_line_none_for_blank_input() {
        assert_eq!(first_nonempty_line(" \n\t\n"), None);
    }

    #[test]
    fn missing_program_is_not_installed() {
        let client = GitClient::with_program("roundtrip-no-such-git-binary");
        assert!(!client.is_available());
        let err = client.head(".").unwrap_err();
        assert!(matches!(err, GitError::NotInstalled));
    }

    fn git(cwd: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(cwd)
            .status()
            .expect("git should run");
        assert!(status.success(), "git {args:?} failed");
    }

    #[test]
    fn checkout_clones_then_resets_local_changes() {
        let client = GitClient::default();
        if !client.is_available() {
            return;
        }
        let root = tempfile::tempdir().expect("tempdir");
        let upstream = root.path().join("upstream");
        std::fs::create_dir_all(&upstream).unwrap();
        git(&upstream, &["init", "--quiet"]);
        git(&upstream, &["config", "user.email", "corpus@example.com"]);
        git(&upstream, &["config", "user.name", "corpus"]);
        std::fs::write(upstream.join("a.toy"), "1 + 2\n").unwrap();
        git(&upstream, &["add", "."]);
        git(&upstream, &["commit", "--quiet", "-m", "init"]);
        git(&upstream, &["tag", "v1"]);

        let uri = upstream.display().to_string();
        let target = root.path().join("work/project");
        let first = client.checkout(&uri, "v1", &target).expect("clone");
        assert_eq!(first.head.len(), 40);

        std::fs::write(target.join("a.toy"), "garbage").unwrap();
        std::fs::write(target.join("untracked.toy"), "x").unwrap();
        let second = client.checkout(&uri, "v1", &target).expect("update");
        assert_eq!(second.head, first.head);
        assert_eq!(std::fs::read_to_string(target.join("a.toy")).unwrap(), "1 + 2\n");
        assert!(!target.join("untracked.toy").exists());
    }

    #[test]
    fn unknown_ref_echoes_failing_command() {
        let client = GitClient::default();
        if !client.is_available() {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        git(dir.path(), &["init", "--quiet"]);
        let err = client
            .checkout("unused", "no-such-ref", dir.path())
            .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("command failed: git "), "{message}");
    }
}
