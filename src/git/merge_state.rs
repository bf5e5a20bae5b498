//! Backup and restore of the sentinel files that record an in-progress
//! merge. `git stash` erases them, so the workflow snapshots their raw bytes
//! before stashing and writes them back afterwards.

use std::fs;
use std::io;
use std::path::Path;

use tracing::instrument;

const MERGE_HEAD: &str = "MERGE_HEAD";
const MERGE_MODE: &str = "MERGE_MODE";
const MERGE_MSG: &str = "MERGE_MSG";

/// The raw contents of the three merge sentinel files inside the repository
/// metadata directory. Each buffer is absent when the corresponding file did
/// not exist at backup time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeState {
    head: Option<Vec<u8>>,
    mode: Option<Vec<u8>>,
    msg: Option<Vec<u8>>,
}

impl MergeState {
    /// Read the merge sentinels from `git_dir`. A missing sentinel is
    /// recorded as absent, not treated as an error.
    #[instrument]
    pub fn backup(git_dir: &Path) -> io::Result<Self> {
        Ok(MergeState {
            head: read_sentinel(git_dir, MERGE_HEAD)?,
            mode: read_sentinel(git_dir, MERGE_MODE)?,
            msg: read_sentinel(git_dir, MERGE_MSG)?,
        })
    }

    /// Write back the sentinels that were present at backup time, byte for
    /// byte. Absent sentinels are skipped; they must not come back as empty
    /// files.
    #[instrument(skip(self))]
    pub fn restore(&self, git_dir: &Path) -> io::Result<()> {
        write_sentinel(git_dir, MERGE_HEAD, self.head.as_deref())?;
        write_sentinel(git_dir, MERGE_MODE, self.mode.as_deref())?;
        write_sentinel(git_dir, MERGE_MSG, self.msg.as_deref())?;
        Ok(())
    }

    /// Whether a merge was in progress at backup time.
    pub fn is_merge_in_progress(&self) -> bool {
        self.head.is_some()
    }
}

fn read_sentinel(git_dir: &Path, name: &str) -> io::Result<Option<Vec<u8>>> {
    match fs::read(git_dir.join(name)) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

fn write_sentinel(git_dir: &Path, name: &str, contents: Option<&[u8]>) -> io::Result<()> {
    match contents {
        Some(contents) => fs::write(git_dir.join(name), contents),
        None => Ok(()),
    }
}
