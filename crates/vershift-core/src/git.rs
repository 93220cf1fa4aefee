//! Git history lookups.
//!
//! Shells out to `git` for all operations. This ensures we inherit the user's
//! configuration and whatever checkout the CI runner prepared (including
//! shallow clones, which are the usual reason a parent commit is missing).

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Revision the previous content is read from.
pub const PARENT_REV: &str = "HEAD~1";

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git subcommand that failed (e.g., "show").
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// The version-control queries needed to find a file's previous content.
///
/// [`Git`] is the real implementation; tests substitute their own.
pub trait History {
    /// Whether the current commit has a parent.
    fn has_parent_commit(&self) -> GitResult<bool>;

    /// Paths changed between the parent commit and the current commit.
    fn changed_paths(&self) -> GitResult<Vec<String>>;

    /// Full text of `path` as recorded in the parent commit.
    fn show_at_parent(&self, path: &str) -> GitResult<String>;
}

/// [`History`] backed by the `git` executable.
#[derive(Debug, Clone, Default)]
pub struct Git {
    dir: Option<Utf8PathBuf>,
}

impl Git {
    /// Run git in the current working directory.
    pub const fn new() -> Self {
        Self { dir: None }
    }

    /// Run git in `dir` instead of the current working directory.
    pub fn in_dir<P: AsRef<Utf8Path>>(dir: P) -> Self {
        Self {
            dir: Some(dir.as_ref().to_path_buf()),
        }
    }

    /// Run a git command and return its stdout.
    fn git(&self, args: &[&str]) -> GitResult<String> {
        let mut command = Command::new("git");
        if let Some(ref dir) = self.dir {
            command.current_dir(dir);
        }
        let output = command.args(args).output()?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

            // Detect "not a git repo" specifically
            if stderr.contains("not a git repository") {
                return Err(GitError::NotARepo);
            }

            Err(GitError::Command {
                command: args.first().unwrap_or(&"").to_string(),
                stderr,
            })
        }
    }
}

impl History for Git {
    #[instrument(skip(self))]
    fn has_parent_commit(&self) -> GitResult<bool> {
        let rev = format!("{PARENT_REV}^{{commit}}");
        match self.git(&["rev-parse", "--verify", "--quiet", &rev]) {
            Ok(_) => Ok(true),
            Err(GitError::Command { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    fn changed_paths(&self) -> GitResult<Vec<String>> {
        let range = format!("{PARENT_REV}..HEAD");
        let output = self.git(&["diff", "--name-only", &range])?;
        let paths: Vec<String> = output
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        debug!(count = paths.len(), "changed paths");
        Ok(paths)
    }

    #[instrument(skip(self))]
    fn show_at_parent(&self, path: &str) -> GitResult<String> {
        self.git(&["show", &format!("{PARENT_REV}:{path}")])
    }
}

/// Outcome of looking up a file's content in the parent commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviousContent {
    /// The file changed in the last commit; this is its previous text.
    Found(String),
    /// The file was not touched by the last commit.
    NotChanged,
    /// History could not be consulted.
    Unavailable(String),
}

/// Strip a single leading `./` from a path.
pub fn normalize_path(path: &str) -> &str {
    path.strip_prefix("./").unwrap_or(path)
}

/// Fetch the content `path` had before the most recent commit.
///
/// Never fails: every git problem is logged and reported as
/// [`PreviousContent::Unavailable`].
#[instrument(skip(history))]
pub fn fetch_previous<H: History + ?Sized>(history: &H, path: &str) -> PreviousContent {
    let normalized = normalize_path(path);

    match lookup(history, path, normalized) {
        Ok(content) => content,
        Err(err @ GitError::NotARepo) => {
            warn!("{err}; cannot look up the previous version of {normalized}");
            PreviousContent::Unavailable(err.to_string())
        }
        Err(err) => {
            debug!(error = %err, "could not get previous file content");
            PreviousContent::Unavailable(err.to_string())
        }
    }
}

fn lookup<H: History + ?Sized>(
    history: &H,
    original: &str,
    normalized: &str,
) -> GitResult<PreviousContent> {
    if !history.has_parent_commit()? {
        warn!(
            "parent commit {PARENT_REV} is not reachable; the checkout may be shallow (fetch-depth: 0 or 2 fixes this)"
        );
        return Ok(PreviousContent::Unavailable(format!(
            "{PARENT_REV} not reachable"
        )));
    }

    let changed = history.changed_paths()?;
    if !changed.iter().any(|p| p == normalized || p == original) {
        info!("File {normalized} was not changed in the last commit");
        return Ok(PreviousContent::NotChanged);
    }

    let content = history.show_at_parent(normalized)?;
    debug!(bytes = content.len(), "previous content retrieved");
    Ok(PreviousContent::Found(content))
}
