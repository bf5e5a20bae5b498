//! The transactional state machine that isolates staged content while tasks
//! run, captures what the tasks produced, and restores the original working
//! tree on any failure.
//!
//! The lifecycle is fixed: `prepare`, `hide_unstaged_changes`, the caller's
//! tasks, `apply_modifications`, `restore_unstaged_changes`, `cleanup`; with
//! `restore_original_state` as the rollback path for any failure after
//! `prepare`. The caller must drive one instance at a time per repository;
//! the engine serializes its own git invocations but takes no locks.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::PathBuf;

use bstr::ByteSlice;
use itertools::Itertools;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::git::{
    self, GitError, GitRunInfo, MergeState, Repo, RepoError, StatusEntry, PATCH_UNSTAGED,
};
use crate::util::chunk_by_arg_length;

/// The lifecycle stage during which a workflow error was raised. The caller
/// uses this to choose between rolling back, surfacing a rollback failure,
/// and ignoring a cleanup failure.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Capturing the original state before tasks run.
    Prepare,
    /// Locating the backup stash by its marker message.
    GetBackupStash,
    /// Checking out staged content over unstaged edits.
    HideUnstagedChanges,
    /// Re-adding task output and checking for an empty commit.
    ApplyModifications,
    /// Re-applying the hidden unstaged hunks.
    RestoreUnstagedChanges,
    /// Rolling the repository back to its original state.
    RestoreOriginalState,
    /// Dropping the backup stash.
    Cleanup,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Prepare => "prepare",
            Stage::GetBackupStash => "get backup stash",
            Stage::HideUnstagedChanges => "hide unstaged changes",
            Stage::ApplyModifications => "apply modifications",
            Stage::RestoreUnstagedChanges => "restore unstaged changes",
            Stage::RestoreOriginalState => "restore original state",
            Stage::Cleanup => "cleanup",
        };
        write!(f, "{name}")
    }
}

/// The reason a workflow operation failed.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("could not find backup stash with message {message:?}")]
    MissingBackupStash { message: &'static str },

    #[error("could not {operation} merge state: {source}")]
    MergeState {
        operation: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("could not hide unstaged changes: {source}")]
    HideUnstaged {
        #[source]
        source: GitError,
    },

    #[error("running tasks left the commit empty, and empty commits are not allowed")]
    EmptyCommit,

    #[error("could not re-apply unstaged changes: {source}")]
    RestoreUnstaged {
        #[source]
        source: GitError,
    },

    #[error("could not remove {path:?}: {source}")]
    RemoveFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// An error raised by a lifecycle operation, tagged with the stage that
/// failed.
#[derive(Debug, Error)]
#[error("workflow stage '{stage}' failed")]
pub struct Error {
    /// The lifecycle stage that failed.
    pub stage: Stage,
    /// The underlying failure.
    #[source]
    pub kind: ErrorKind,
}

impl Error {
    fn new(stage: Stage, kind: impl Into<ErrorKind>) -> Self {
        Error {
            stage,
            kind: kind.into(),
        }
    }
}

#[allow(missing_docs)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Init,
    Prepared,
    Hidden,
    Applied,
    Restored,
    Cleaned,
    RollingBack,
    RolledBack,
}

/// Policy knobs for a [`GitWorkflow`] run, supplied by the task
/// orchestrator.
#[derive(Clone, Debug)]
pub struct GitWorkflowOptions {
    /// Permit the commit to become empty after tasks run. Off by default:
    /// tasks that auto-fix may revert all staged content, and the resulting
    /// empty commit is rarely what the user intended.
    pub allow_empty: bool,

    /// Repo-relative paths that are staged and matched at least one task.
    /// These are re-added to the index after the tasks run.
    pub matched_files: Vec<PathBuf>,

    /// Upper bound on the argument bytes of a single git invocation; `add`
    /// calls are chunked to stay under it.
    pub max_arg_length: usize,
}

/// A transactional wrapper around a Git repository for one task run.
///
/// The workflow exclusively owns all run-scoped state (the partially staged
/// set, observed deletions, merge sentinel buffers). Construct one per run
/// and discard it after [`cleanup`](Self::cleanup) or
/// [`restore_original_state`](Self::restore_original_state); never drive two
/// instances against the same repository concurrently.
pub struct GitWorkflow {
    git_run_info: GitRunInfo,
    repo: Repo,
    allow_empty: bool,
    matched_files: Vec<PathBuf>,
    max_arg_length: usize,
    state: State,
    partially_staged_files: Option<Vec<StatusEntry>>,
    deleted_files: Vec<PathBuf>,
    merge_state: Option<MergeState>,
}

impl std::fmt::Debug for GitWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<GitWorkflow state={:?} repo={:?}>",
            self.state, self.repo
        )
    }
}

impl GitWorkflow {
    /// Constructor.
    pub fn new(git_run_info: GitRunInfo, repo: Repo, options: GitWorkflowOptions) -> Self {
        let GitWorkflowOptions {
            allow_empty,
            matched_files,
            max_arg_length,
        } = options;
        GitWorkflow {
            git_run_info,
            repo,
            allow_empty,
            matched_files,
            max_arg_length,
            state: State::Init,
            partially_staged_files: None,
            deleted_files: Vec::new(),
            merge_state: None,
        }
    }

    /// Whether any file had both staged and unstaged changes when
    /// [`prepare`](Self::prepare) ran.
    pub fn has_partially_staged_files(&self) -> bool {
        self.partially_staged_files
            .as_ref()
            .is_some_and(|files| !files.is_empty())
    }

    /// Capture the state of the working tree before tasks run.
    ///
    /// Computes the partially staged files and saves their unstaged hunks to
    /// a patch inside the metadata directory. When `should_backup` is set,
    /// additionally records unstaged working-tree deletions and the merge
    /// sentinels, then snapshots the whole original state into the backup
    /// stash and immediately re-applies it with `--index` so the working
    /// copy is left exactly as it was.
    #[instrument]
    pub fn prepare(&mut self, should_backup: bool) -> Result<()> {
        debug!(state = ?self.state, "backing up original state");
        let stage = Stage::Prepare;

        let partially_staged_files = self
            .repo
            .get_partially_staged_files(&self.git_run_info)
            .map_err(|err| Error::new(stage, err))?;
        if !partially_staged_files.is_empty() {
            let files = partially_staged_files
                .iter()
                .flat_map(|entry| entry.paths(true))
                .collect_vec();
            git::write_patch(&self.git_run_info, &self.unstaged_patch_path(), &files)
                .map_err(|err| Error::new(stage, err))?;
        }
        self.partially_staged_files = Some(partially_staged_files);

        if !should_backup {
            self.state = State::Prepared;
            return Ok(());
        }

        self.deleted_files = self
            .repo
            .get_deleted_files(&self.git_run_info)
            .map_err(|err| Error::new(stage, err))?;

        let merge_state = MergeState::backup(self.repo.get_git_dir()).map_err(|source| {
            Error::new(
                stage,
                ErrorKind::MergeState {
                    operation: "back up",
                    source,
                },
            )
        })?;

        if merge_state.is_merge_in_progress() {
            debug!("merge in progress, preserving its sentinel files across the stash");
        }

        git::save_backup_stash(&self.git_run_info).map_err(|err| Error::new(stage, err))?;
        let stash_ref = self.backup_stash_ref()?;
        git::apply_backup_stash(&self.git_run_info, &stash_ref)
            .map_err(|err| Error::new(stage, err))?;

        // Stashing erases the merge sentinels; put them back.
        merge_state.restore(self.repo.get_git_dir()).map_err(|source| {
            Error::new(
                stage,
                ErrorKind::MergeState {
                    operation: "restore",
                    source,
                },
            )
        })?;
        self.merge_state = Some(merge_state);

        // `stash apply` resurrects files that were deleted in the working
        // tree; take them back out.
        self.delete_observed_files(stage)?;

        self.state = State::Prepared;
        debug!("done backing up original state");
        Ok(())
    }

    /// Drop the unstaged edits of the partially staged files, leaving only
    /// staged content in the working tree. The edits survive in the patch
    /// written by [`prepare`](Self::prepare).
    #[instrument]
    pub fn hide_unstaged_changes(&mut self) -> Result<()> {
        debug!(state = ?self.state, "hiding unstaged changes");
        let files = match &self.partially_staged_files {
            Some(entries) if !entries.is_empty() => entries
                .iter()
                // Renamed-from paths no longer exist on disk; check out only
                // the current names.
                .flat_map(|entry| entry.paths(false))
                .collect_vec(),
            _ => {
                self.state = State::Hidden;
                return Ok(());
            }
        };

        let mut args: Vec<OsString> = vec!["checkout".into(), "--force".into(), "--".into()];
        args.extend(files.into_iter().map(PathBuf::into_os_string));
        self.git_run_info.run(&args).map_err(|source| {
            Error::new(
                Stage::HideUnstagedChanges,
                ErrorKind::HideUnstaged { source },
            )
        })?;
        self.state = State::Hidden;
        Ok(())
    }

    /// Stage whatever the tasks produced for the matched files, then verify
    /// that the commit would not come out empty.
    #[instrument]
    pub fn apply_modifications(&mut self) -> Result<()> {
        debug!(state = ?self.state, "adding task modifications to index");
        let stage = Stage::ApplyModifications;

        let matched_files = self
            .matched_files
            .iter()
            .map(|file| self.repo.get_working_copy_path().join(file))
            .collect_vec();
        // Git holds an exclusive index lock, so the chunks must run
        // strictly one after another.
        for chunk in chunk_by_arg_length(&matched_files, self.max_arg_length) {
            let mut args: Vec<OsString> = vec!["add".into(), "--".into()];
            args.extend(chunk.iter().map(|file| file.clone().into_os_string()));
            self.git_run_info
                .run(&args)
                .map_err(|err| Error::new(stage, err))?;
        }
        debug!("done adding task modifications to index");

        let staged_files_after_add = self
            .git_run_info
            .run(&["diff", "--name-only", "--cached"])
            .map_err(|err| Error::new(stage, err))?;
        if staged_files_after_add.trim().is_empty() && !self.allow_empty {
            return Err(Error::new(stage, ErrorKind::EmptyCommit));
        }

        self.state = State::Applied;
        Ok(())
    }

    /// Re-apply the unstaged hunks hidden by
    /// [`hide_unstaged_changes`](Self::hide_unstaged_changes). If both the
    /// plain and the three-way apply fail, the caller is expected to fall
    /// back to [`restore_original_state`](Self::restore_original_state).
    #[instrument]
    pub fn restore_unstaged_changes(&mut self) -> Result<()> {
        debug!(state = ?self.state, "restoring unstaged changes");
        let stage = Stage::RestoreUnstagedChanges;

        let patch_path = self.unstaged_patch_path();
        if patch_path.is_file() {
            git::apply_patch(&self.git_run_info, &patch_path)
                .map_err(|source| Error::new(stage, ErrorKind::RestoreUnstaged { source }))?;
            remove_file_if_exists(&patch_path).map_err(|err| Error::new(stage, err))?;
        }
        self.state = State::Restored;
        Ok(())
    }

    /// Roll the repository back to the state captured by
    /// [`prepare`](Self::prepare): working tree, index, merge sentinels, and
    /// observed deletions. A failure here is the worst outcome, as the tree
    /// may be left in an intermediate state; it is tagged
    /// [`Stage::RestoreOriginalState`] so the caller can report it
    /// prominently.
    #[instrument]
    pub fn restore_original_state(&mut self) -> Result<()> {
        debug!(state = ?self.state, "restoring original state");
        let stage = Stage::RestoreOriginalState;
        self.state = State::RollingBack;

        self.git_run_info
            .run(&["reset", "--hard", "HEAD"])
            .map_err(|err| Error::new(stage, err))?;

        let stash_ref = self.backup_stash_ref()?;
        git::apply_backup_stash(&self.git_run_info, &stash_ref)
            .map_err(|err| Error::new(stage, err))?;

        if let Some(merge_state) = &self.merge_state {
            merge_state.restore(self.repo.get_git_dir()).map_err(|source| {
                Error::new(
                    stage,
                    ErrorKind::MergeState {
                        operation: "restore",
                        source,
                    },
                )
            })?;
        }

        self.delete_observed_files(stage)?;

        remove_file_if_exists(&self.unstaged_patch_path())
            .map_err(|err| Error::new(stage, err))?;

        self.state = State::RolledBack;
        debug!("done restoring original state");
        Ok(())
    }

    /// Drop the backup stash. This must be the last lifecycle call; a
    /// failure here no longer endangers the user's work, only leaves the
    /// stash behind.
    #[instrument]
    pub fn cleanup(&mut self) -> Result<()> {
        debug!(state = ?self.state, "dropping backup stash");
        let stash_ref = self.backup_stash_ref()?;
        git::drop_backup_stash(&self.git_run_info, &stash_ref)
            .map_err(|err| Error::new(Stage::Cleanup, err))?;
        self.state = State::Cleaned;
        debug!("done dropping backup stash");
        Ok(())
    }

    /// Absolute path of the patch holding the unstaged hunks. Always used in
    /// full, even during rollback; the process's working directory is not
    /// guaranteed to be the repository root.
    fn unstaged_patch_path(&self) -> PathBuf {
        self.repo.get_git_dir().join(PATCH_UNSTAGED)
    }

    /// Resolve the backup stash selector by its marker message, freshly on
    /// every call.
    fn backup_stash_ref(&self) -> Result<String> {
        let stage = Stage::GetBackupStash;
        match git::find_backup_stash(&self.git_run_info) {
            Ok(Some(stash_ref)) => Ok(stash_ref),
            Ok(None) => Err(Error::new(
                stage,
                ErrorKind::MissingBackupStash {
                    message: git::BACKUP_STASH_MESSAGE,
                },
            )),
            Err(err) => Err(Error::new(stage, err)),
        }
    }

    /// Unlink every path recorded in `deleted_files`. A path that is already
    /// absent counts as deleted.
    fn delete_observed_files(&self, stage: Stage) -> Result<()> {
        for path in &self.deleted_files {
            remove_file_if_exists(path).map_err(|err| Error::new(stage, err))?;
        }
        Ok(())
    }
}

fn remove_file_if_exists(path: &std::path::Path) -> std::result::Result<(), ErrorKind> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ErrorKind::RemoveFile {
            path: path.to_path_buf(),
            source,
        }),
    }
}
