//! The backup stash that preserves the original working tree for the
//! duration of a run.

use bstr::ByteSlice;
use tracing::instrument;

use super::run::{GitRunInfo, Result};

/// Message identifying the engine's backup stash in `git stash list`. Users
/// can see it there while a run is in flight, so the exact wording is part
/// of the external contract.
pub const BACKUP_STASH_MESSAGE: &str = "lint-staged automatic backup";

/// Stash the entire working state under [`BACKUP_STASH_MESSAGE`]. The caller
/// re-applies it immediately via [`apply_backup_stash`] so that the working
/// copy is left untouched and the stash remains behind purely as a backup.
#[instrument]
pub fn save_backup_stash(git_run_info: &GitRunInfo) -> Result<()> {
    git_run_info.run(&["stash", "save", BACKUP_STASH_MESSAGE])?;
    Ok(())
}

/// Locate the backup stash by scanning `git stash list` for its marker
/// message, returning a `stash@{i}` selector for the first matching line.
///
/// The ordinal is resolved from scratch on every call: the user may have
/// created or dropped other stashes since the backup was taken, shifting
/// every position in the list.
#[instrument]
pub fn find_backup_stash(git_run_info: &GitRunInfo) -> Result<Option<String>> {
    let stdout = git_run_info.run(&["stash", "list"])?;
    let index = stdout
        .lines()
        .position(|line| line.contains_str(BACKUP_STASH_MESSAGE));
    Ok(index.map(|index| format!("stash@{{{index}}}")))
}

/// Apply the backup stash without dropping it. `--index` restores the
/// staged/unstaged split instead of collapsing everything into unstaged
/// changes.
#[instrument]
pub fn apply_backup_stash(git_run_info: &GitRunInfo, stash_ref: &str) -> Result<()> {
    git_run_info.run(&["stash", "apply", "--quiet", "--index", stash_ref])?;
    Ok(())
}

/// Drop the backup stash. The selector must come from a fresh
/// [`find_backup_stash`] call.
#[instrument]
pub fn drop_backup_stash(git_run_info: &GitRunInfo, stash_ref: &str) -> Result<()> {
    git_run_info.run(&["stash", "drop", "--quiet", stash_ref])?;
    Ok(())
}
