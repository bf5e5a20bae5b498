//! Creation and re-application of the patch holding unstaged hunks.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use super::run::{GitRunInfo, Result};

/// Name of the patch file holding the unstaged hunks of partially staged
/// files, inside the repository metadata directory.
pub const PATCH_UNSTAGED: &str = "lint-staged_unstaged.patch";

// Flags that keep the patch binary-safe, context-free (so it re-applies
// after the surrounding lines have shifted), and deterministic regardless
// of the user's diff configuration.
const GIT_DIFF_ARGS: &[&str] = &[
    "--binary",
    "--unified=0",
    "--no-color",
    "--no-ext-diff",
    "--src-prefix=a/",
    "--dst-prefix=b/",
    "--patch",
];

const GIT_APPLY_ARGS: &[&str] = &["-v", "--whitespace=nowarn", "--recount", "--unidiff-zero"];

/// Write a patch with the unstaged changes of `files` to `patch_path`.
#[instrument]
pub fn write_patch(git_run_info: &GitRunInfo, patch_path: &Path, files: &[PathBuf]) -> Result<()> {
    let mut args: Vec<OsString> = vec!["diff".into()];
    args.extend(GIT_DIFF_ARGS.iter().map(OsString::from));
    args.push("--output".into());
    args.push(patch_path.into());
    args.push("--".into());
    args.extend(files.iter().map(|file| file.clone().into_os_string()));
    git_run_info.run(&args)?;
    Ok(())
}

/// Apply a patch produced by [`write_patch`].
///
/// A plain apply is attempted first. Tasks may have rewritten lines that the
/// unstaged hunks also touched, so on failure the apply is retried once as a
/// three-way merge against the post-task content; if that fails too, the
/// second error is returned and the caller falls back to the backup stash.
#[instrument]
pub fn apply_patch(git_run_info: &GitRunInfo, patch_path: &Path) -> Result<()> {
    match try_apply(git_run_info, patch_path, false) {
        Ok(()) => Ok(()),
        Err(error) => {
            debug!(?error, "patch did not apply cleanly, retrying with --3way");
            try_apply(git_run_info, patch_path, true)
        }
    }
}

fn try_apply(git_run_info: &GitRunInfo, patch_path: &Path, three_way: bool) -> Result<()> {
    let mut args: Vec<OsString> = vec!["apply".into()];
    args.extend(GIT_APPLY_ARGS.iter().map(OsString::from));
    if three_way {
        args.push("--3way".into());
    }
    args.push(patch_path.into());
    git_run_info.run(&args)?;
    Ok(())
}
