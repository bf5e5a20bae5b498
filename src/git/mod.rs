//! Tools for interfacing with the Git repository.

mod diff;
mod merge_state;
mod repo;
mod run;
mod stash;
mod status;

pub use diff::{apply_patch, write_patch, PATCH_UNSTAGED};
pub use merge_state::MergeState;
pub use repo::{Error as RepoError, Repo};
pub use run::{Error as GitError, GitRunInfo};
pub use stash::{
    apply_backup_stash, drop_backup_stash, find_backup_stash, save_backup_stash,
    BACKUP_STASH_MESSAGE,
};
pub use status::{parse_status_output, FileStatus, ParseStatusError, StatusEntry};
