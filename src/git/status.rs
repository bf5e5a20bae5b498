use std::path::PathBuf;

use bstr::{ByteSlice, ByteVec};
use lazy_static::lazy_static;
use regex::bytes::Regex;
use thiserror::Error;
use tracing::warn;

/// An error raised when a `git status --porcelain` line cannot be parsed.
#[derive(Debug, Error)]
#[error("could not parse status line {line:?}")]
pub struct ParseStatusError {
    /// The offending line, lossily decoded for display.
    pub line: String,
}

/// A Git file status indicator from the porcelain short format.
/// See <https://git-scm.com/docs/git-status#_short_format>.
#[allow(missing_docs)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FileStatus {
    Unmodified,
    Modified,
    TypeChanged,
    Added,
    Deleted,
    Renamed,
    Copied,
    Unmerged,
    Untracked,
    Ignored,
}

impl FileStatus {
    /// Determine if this status corresponds to a difference against the
    /// comparison base (the index for the first status column, the working
    /// tree for the second).
    pub fn is_changed(&self) -> bool {
        match self {
            FileStatus::Added
            | FileStatus::Copied
            | FileStatus::Deleted
            | FileStatus::Modified
            | FileStatus::Renamed
            | FileStatus::TypeChanged
            | FileStatus::Unmerged => true,
            FileStatus::Ignored | FileStatus::Unmodified | FileStatus::Untracked => false,
        }
    }
}

impl From<u8> for FileStatus {
    fn from(status: u8) -> Self {
        match status {
            b' ' => FileStatus::Unmodified,
            b'M' => FileStatus::Modified,
            b'T' => FileStatus::TypeChanged,
            b'A' => FileStatus::Added,
            b'D' => FileStatus::Deleted,
            b'R' => FileStatus::Renamed,
            b'C' => FileStatus::Copied,
            b'U' => FileStatus::Unmerged,
            b'?' => FileStatus::Untracked,
            b'!' => FileStatus::Ignored,
            _ => {
                warn!(?status, "invalid status indicator");
                FileStatus::Untracked
            }
        }
    }
}

/// The status of a file in the repository, as reported by one line of
/// `git status --porcelain` output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusEntry {
    /// The status of the file in the index.
    pub index_status: FileStatus,
    /// The status of the file in the working tree.
    pub working_tree_status: FileStatus,
    /// The file path. For renames, the new path.
    pub path: PathBuf,
    /// The original path of the file (for renamed files).
    pub orig_path: Option<PathBuf>,
}

impl StatusEntry {
    /// Determine whether the file has both staged and unstaged differences
    /// at the same time.
    pub fn is_partially_staged(&self) -> bool {
        self.index_status.is_changed() && self.working_tree_status.is_changed()
    }

    /// Returns the paths associated with the status entry.
    ///
    /// With `include_orig_path`, a renamed entry yields both its original
    /// and its current path, in that order; the original path is still part
    /// of the index, so diffing must cover it. Without it, only the current
    /// path is yielded; the original path no longer exists on disk, so a
    /// checkout must not name it.
    pub fn paths(&self, include_orig_path: bool) -> Vec<PathBuf> {
        match &self.orig_path {
            Some(orig_path) if include_orig_path => {
                vec![orig_path.clone(), self.path.clone()]
            }
            _ => vec![self.path.clone()],
        }
    }
}

impl TryFrom<&[u8]> for StatusEntry {
    type Error = ParseStatusError;

    fn try_from(line: &[u8]) -> std::result::Result<StatusEntry, ParseStatusError> {
        lazy_static! {
            /// Parses an entry of the git porcelain short status format: two
            /// status bytes, a space, then the path, with renames written as
            /// `orig -> path`.
            static ref STATUS_PORCELAIN_REGEXP: Regex = Regex::new(concat!(
                r#"(?-u)^(?P<index_status>.)(?P<working_tree_status>.) "#,
                r#"((?P<orig_path>[^\x00]+) -> )?"#,
                r#"(?P<path>[^\x00]+)$"#
            ))
            .expect("porcelain status line regex");
        }

        let parse_error = || ParseStatusError {
            line: String::from_utf8_lossy(line).into_owned(),
        };

        let status_line_parts = STATUS_PORCELAIN_REGEXP
            .captures(line)
            .ok_or_else(parse_error)?;

        let status_at = |name: &str| -> Option<FileStatus> {
            status_line_parts
                .name(name)
                .and_then(|m| m.as_bytes().first().copied())
                .map(FileStatus::from)
        };
        let index_status = status_at("index_status").ok_or_else(parse_error)?;
        let working_tree_status = status_at("working_tree_status").ok_or_else(parse_error)?;

        let path_at = |name: &str| -> Option<std::result::Result<PathBuf, ParseStatusError>> {
            status_line_parts.name(name).map(|m| {
                m.as_bytes()
                    .to_vec()
                    .into_path_buf()
                    .map_err(|_| parse_error())
            })
        };
        let path = path_at("path").ok_or_else(parse_error)??;
        let orig_path = path_at("orig_path").transpose()?;

        Ok(StatusEntry {
            index_status,
            working_tree_status,
            path,
            orig_path,
        })
    }
}

/// Parse the full output of `git status --porcelain` into entries, in the
/// order that `status` reported them.
pub fn parse_status_output(
    output: &[u8],
) -> std::result::Result<Vec<StatusEntry>, ParseStatusError> {
    output
        .lines()
        .filter(|line| !line.is_empty())
        .map(StatusEntry::try_from)
        .collect()
}
