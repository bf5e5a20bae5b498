use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use itertools::Itertools;
use thiserror::Error;
use tracing::instrument;

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not spawn git with args {args:?}: {source}")]
    SpawnGit {
        #[source]
        source: io::Error,
        args: Vec<String>,
    },

    #[error("git {} failed with exit code {exit_code}:\n{stderr}", .args.join(" "))]
    GitFailed {
        args: Vec<String>,
        exit_code: isize,
        stderr: String,
    },
}

#[allow(missing_docs)]
pub type Result<T> = std::result::Result<T, Error>;

/// Path to the `git` executable on disk to be executed, along with the
/// working directory and environment to execute it with.
#[derive(Clone)]
pub struct GitRunInfo {
    /// The path to the Git executable on disk.
    pub path_to_git: PathBuf,

    /// The working directory that the Git executable should be run in. This
    /// must be the root of the working copy, not the `.git` directory; some
    /// commands (notably `git status`) misbehave when run from the latter.
    pub working_directory: PathBuf,

    /// The environment variables that should be passed to the Git process.
    pub env: HashMap<OsString, OsString>,
}

impl std::fmt::Debug for GitRunInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<GitRunInfo path_to_git={:?} working_directory={:?} env=not shown>",
            self.path_to_git, self.working_directory
        )
    }
}

impl GitRunInfo {
    /// Construct an invoker for the given executable and working copy,
    /// capturing the current process environment.
    pub fn new(path_to_git: PathBuf, working_directory: PathBuf) -> Self {
        GitRunInfo {
            path_to_git,
            working_directory,
            env: std::env::vars_os().collect(),
        }
    }

    fn run_inner(&self, args: &[&OsStr]) -> Result<Vec<u8>> {
        let GitRunInfo {
            path_to_git,
            working_directory,
            env,
        } = self;

        let args_string = || {
            args.iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect_vec()
        };

        let mut command = Command::new(path_to_git);
        command.current_dir(working_directory);
        command.args(args);
        command.env_clear();
        command.envs(env.iter());
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let child = command.spawn().map_err(|source| Error::SpawnGit {
            source,
            args: args_string(),
        })?;
        let output = child
            .wait_with_output()
            .map_err(|source| Error::SpawnGit {
                source,
                args: args_string(),
            })?;

        // On Unix, if the child process was terminated by a signal, we need
        // to call some Unix-specific functions to access the signal that
        // terminated it. For simplicity, just return `1` in those cases.
        let exit_code = isize::try_from(output.status.code().unwrap_or(1)).unwrap_or(1);
        if exit_code != 0 {
            return Err(Error::GitFailed {
                args: args_string(),
                exit_code,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(output.stdout)
    }

    /// Run Git in a subprocess and return its stdout.
    ///
    /// `args` contains the list of arguments to pass to Git, not including
    /// the Git executable itself. They are passed as a vector, never through
    /// a shell, so filenames with spaces or metacharacters are safe. A
    /// non-zero exit maps to [`Error::GitFailed`] carrying the full stderr;
    /// nothing is retried at this layer.
    #[instrument]
    pub fn run<S: AsRef<OsStr> + std::fmt::Debug>(&self, args: &[S]) -> Result<Vec<u8>> {
        self.run_inner(args.iter().map(AsRef::as_ref).collect_vec().as_slice())
    }
}
