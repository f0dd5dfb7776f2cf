//! Git operations for cached plugin sources
//!
//! Network fetches go through the `git` binary; inspection of the checked-out
//! cache uses libgit2 (git2 crate). Failures of the external tool are
//! returned as warnings so a refresh never aborts the whole CLI invocation.

use git2::Repository;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::process;

/// Error type for git operations
#[derive(Debug, Error)]
pub enum GitError {
    /// Not a git repository
    #[error("not a git repository: {0}")]
    NotARepository(String),
    /// Git operation failed
    #[error("git operation failed: {0}")]
    OperationFailed(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<git2::Error> for GitError {
    fn from(e: git2::Error) -> Self {
        GitError::OperationFailed(e.message().to_string())
    }
}

/// A pinned revision: either a tag or a fixed commit, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitRef {
    Tag(String),
    Commit(String),
}

impl GitRef {
    /// Argument handed to `git checkout --detach`.
    pub fn checkout_target(&self) -> String {
        match self {
            GitRef::Tag(tag) => format!("refs/tags/{}", tag),
            GitRef::Commit(commit) => commit.clone(),
        }
    }
}

impl std::fmt::Display for GitRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitRef::Tag(tag) => write!(f, "tag {}", tag),
            GitRef::Commit(commit) => write!(f, "commit {}", commit),
        }
    }
}

/// An opened checkout, read through libgit2.
pub struct GitRepo {
    repo: Repository,
}

impl GitRepo {
    /// Open the repository containing `path`, searching upward.
    pub fn discover(path: &Path) -> Result<Self, GitError> {
        let repo = Repository::discover(path)
            .map_err(|_| GitError::NotARepository(path.display().to_string()))?;
        if repo.workdir().is_none() {
            return Err(GitError::NotARepository("bare repository".to_string()));
        }
        Ok(Self { repo })
    }

    /// Get the current HEAD commit hash
    pub fn head_commit(&self) -> Result<String, GitError> {
        let head = self.repo.head()?;
        let commit = head.peel_to_commit()?;
        Ok(commit.id().to_string())
    }
}

fn git_program() -> PathBuf {
    PathBuf::from("git")
}

/// Sibling directory a fresh checkout is staged in before replacing `dest`.
fn staging_dir(dest: &Path) -> PathBuf {
    match dest.file_name() {
        Some(name) => dest.with_file_name(format!("{}.tmp", name.to_string_lossy())),
        None => dest.with_extension("tmp"),
    }
}

fn discard(dir: &Path) -> Result<(), GitError> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    Ok(())
}

/// Clone `url` and detach at `reference`, then replace `dest` with the result.
///
/// The checkout is staged next to `dest`; a failed clone or checkout leaves
/// the previous contents of `dest` in place. Returns warnings for steps that
/// failed; an empty list means `dest` now holds the requested revision.
pub fn fetch_and_checkout(
    url: &str,
    reference: &GitRef,
    dest: &Path,
) -> Result<Vec<String>, GitError> {
    let mut warnings = Vec::new();

    let staging = staging_dir(dest);
    discard(&staging)?;
    if let Some(parent) = staging.parent() {
        fs::create_dir_all(parent)?;
    }

    let clone_args = vec![
        "clone".to_string(),
        "--quiet".to_string(),
        "--".to_string(),
        url.to_string(),
        staging.display().to_string(),
    ];
    let clone = match process::run(&git_program(), &clone_args, None) {
        Ok(status) => status,
        Err(e) => {
            warnings.push(format!("could not run git: {}", e));
            return Ok(warnings);
        }
    };
    if let Some(warning) = clone.warning() {
        warn!(url, cache = %dest.display(), "git clone failed; keeping previous cache");
        warnings.push(warning);
        discard(&staging)?;
        return Ok(warnings);
    }

    let checkout_args = vec![
        "checkout".to_string(),
        "--quiet".to_string(),
        "--detach".to_string(),
        reference.checkout_target(),
    ];
    let checkout = process::run(&git_program(), &checkout_args, Some(&staging))?;
    if let Some(warning) = checkout.warning() {
        warn!(url, %reference, "git checkout failed; keeping previous cache");
        warnings.push(warning);
        discard(&staging)?;
        return Ok(warnings);
    }

    let head = GitRepo::discover(&staging)?.head_commit()?;
    if let GitRef::Commit(pinned) = reference
        && !head.starts_with(pinned.as_str())
    {
        warnings.push(format!(
            "{} checked out at {} instead of pinned commit {}",
            url, head, pinned
        ));
    }

    discard(dest)?;
    fs::rename(&staging, dest)?;
    info!(url, %reference, head = %head, cache = %dest.display(), "plugin cache refreshed");

    Ok(warnings)
}
