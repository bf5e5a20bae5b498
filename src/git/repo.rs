//! Operations on the Git repository. The engine never links against a Git
//! library; every query goes through the `git` executable so that the exact
//! commands issued stay auditable.

use std::path::{Path, PathBuf};

use bstr::{ByteSlice, ByteVec};
use thiserror::Error;
use tracing::instrument;

use super::run::{self, GitRunInfo};
use super::status::{parse_status_output, ParseStatusError, StatusEntry};

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Git(#[from] run::Error),

    #[error(transparent)]
    ParseStatus(#[from] ParseStatusError),

    #[error("could not decode git output as a path: {output:?}")]
    DecodePath { output: String },

    #[error("could not decode git output: {output:?}")]
    DecodeOutput { output: String },
}

#[allow(missing_docs)]
pub type Result<T> = std::result::Result<T, Error>;

/// A Git repository on disk, identified by the root of its working copy and
/// by its metadata directory (where `HEAD` and the `MERGE_*` files live).
#[derive(Clone, Debug)]
pub struct Repo {
    working_copy_path: PathBuf,
    git_dir: PathBuf,
}

impl Repo {
    /// Construct a repository from already-resolved paths.
    pub fn from_paths(working_copy_path: PathBuf, git_dir: PathBuf) -> Self {
        Repo {
            working_copy_path,
            git_dir,
        }
    }

    /// Resolve the repository containing the invoker's working directory by
    /// asking Git for the working-tree root and the metadata directory.
    #[instrument]
    pub fn discover(git_run_info: &GitRunInfo) -> Result<Self> {
        let working_copy_path = run_for_line(git_run_info, &["rev-parse", "--show-toplevel"])?;
        let git_dir = run_for_line(git_run_info, &["rev-parse", "--absolute-git-dir"])?;
        Ok(Repo {
            working_copy_path: PathBuf::from(working_copy_path),
            git_dir: PathBuf::from(git_dir),
        })
    }

    /// Get the path to the root of the working copy.
    pub fn get_working_copy_path(&self) -> &Path {
        &self.working_copy_path
    }

    /// Get the path to the repository metadata directory.
    pub fn get_git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Query the statuses of all changed files, in the order that `git
    /// status` reports them.
    #[instrument]
    pub fn get_status_entries(&self, git_run_info: &GitRunInfo) -> Result<Vec<StatusEntry>> {
        let stdout = git_run_info.run(&["status", "--porcelain"])?;
        Ok(parse_status_output(&stdout)?)
    }

    /// Query the files that have both staged and unstaged changes.
    #[instrument]
    pub fn get_partially_staged_files(
        &self,
        git_run_info: &GitRunInfo,
    ) -> Result<Vec<StatusEntry>> {
        Ok(self
            .get_status_entries(git_run_info)?
            .into_iter()
            .filter(|entry| entry.is_partially_staged())
            .collect())
    }

    /// Query the files deleted from the working tree but not yet staged as
    /// deleted, as absolute paths.
    #[instrument]
    pub fn get_deleted_files(&self, git_run_info: &GitRunInfo) -> Result<Vec<PathBuf>> {
        let stdout = git_run_info.run(&["ls-files", "--deleted"])?;
        stdout
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| {
                let path = decode_path(line)?;
                Ok(self.working_copy_path.join(path))
            })
            .collect()
    }

    /// Query the staged files that a commit would include (added, copied,
    /// modified, or renamed; deletions carry no content for tasks to check),
    /// as repo-relative paths.
    #[instrument]
    pub fn get_staged_files(&self, git_run_info: &GitRunInfo) -> Result<Vec<PathBuf>> {
        let stdout = git_run_info.run(&[
            "diff",
            "--name-only",
            "-z",
            "--diff-filter=ACMR",
            "--staged",
        ])?;
        stdout
            .split_str("\0")
            .filter(|name| !name.is_empty())
            .map(decode_path)
            .collect()
    }
}

fn decode_path(bytes: &[u8]) -> Result<PathBuf> {
    bytes
        .to_vec()
        .into_path_buf()
        .map_err(|_| Error::DecodePath {
            output: String::from_utf8_lossy(bytes).into_owned(),
        })
}

fn run_for_line(git_run_info: &GitRunInfo, args: &[&str]) -> Result<String> {
    let stdout = git_run_info.run(args)?;
    let line = stdout
        .lines()
        .next()
        .ok_or_else(|| Error::DecodeOutput {
            output: String::from_utf8_lossy(&stdout).into_owned(),
        })?
        .to_str()
        .map_err(|_| Error::DecodeOutput {
            output: String::from_utf8_lossy(&stdout).into_owned(),
        })?
        .to_owned();
    Ok(line)
}
