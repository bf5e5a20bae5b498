//! Testing utilities.
//!
//! This is inside `src` rather than `tests` since we use this code in some
//! unit tests.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::ops::Deref;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use eyre::Context;
use once_cell::sync::OnceCell;
use tempfile::TempDir;
use tracing::instrument;

use crate::git::{GitRunInfo, Repo};
use crate::util::get_from_path;

const DUMMY_NAME: &str = "Testy McTestface";
const DUMMY_EMAIL: &str = "test@example.com";
const DUMMY_DATE: &str = "Wed 29 Oct 12:34:56 2020 PDT";

/// Environment variable naming the Git executable to test against. When
/// unset, `git` is located through `PATH`.
pub const TEST_GIT: &str = "TEST_GIT";

/// Wrapper around the Git executable, for testing.
#[derive(Clone, Debug)]
pub struct Git {
    /// The path to the repository on disk. The directory itself must exist,
    /// although it might not have a `.git` folder in it. (Use
    /// `Git::init_repo` to initialize it.)
    pub repo_path: PathBuf,

    /// The path to the Git executable on disk.
    pub path_to_git: PathBuf,
}

/// Options for `Git::init_repo_with_options`.
#[derive(Debug)]
pub struct GitInitOptions {
    /// If `true`, then `init_repo_with_options` makes an initial commit with
    /// some content.
    pub make_initial_commit: bool,
}

impl Default for GitInitOptions {
    fn default() -> Self {
        GitInitOptions {
            make_initial_commit: true,
        }
    }
}

/// Options for `Git::run_with_options`.
#[derive(Debug, Default)]
pub struct GitRunOptions {
    /// The timestamp of the command. Mostly useful for `git commit`. This
    /// should be a number like 0, 1, 2, 3...
    pub time: isize,

    /// The exit code that `Git` should return.
    pub expected_exit_code: i32,

    /// The input to write to the child process's stdin.
    pub input: Option<String>,

    /// Additional environment variables to start the process with.
    pub env: HashMap<String, String>,
}

impl Git {
    /// Constructor.
    pub fn new(path_to_git: PathBuf, repo_path: PathBuf) -> Self {
        Git {
            repo_path,
            path_to_git,
        }
    }

    /// Get the environment variables needed to run git in the test
    /// environment.
    pub fn get_base_env(&self, time: isize) -> Vec<(OsString, OsString)> {
        // Required for determinism, as these values will be baked into the
        // commit hash.
        let date: OsString = format!("{DUMMY_DATE} -{time:0>2}").into();

        // ":" is understood by `git` to skip editing.
        let git_editor = OsString::from(":");

        let envs = vec![
            ("GIT_CONFIG_NOSYSTEM", OsString::from("1")),
            ("GIT_AUTHOR_DATE", date.clone()),
            ("GIT_COMMITTER_DATE", date),
            ("GIT_EDITOR", git_editor),
            (
                "PATH",
                std::env::var_os("PATH").unwrap_or_else(OsString::new),
            ),
        ];

        envs.into_iter()
            .map(|(key, value)| (OsString::from(key), value))
            .collect()
    }

    #[track_caller]
    fn run_with_options_inner(
        &self,
        args: &[&str],
        options: &GitRunOptions,
    ) -> eyre::Result<(String, String)> {
        let GitRunOptions {
            time,
            expected_exit_code,
            input,
            env,
        } = options;

        let env: BTreeMap<_, _> = self
            .get_base_env(*time)
            .into_iter()
            .chain(
                env.iter()
                    .map(|(k, v)| (OsString::from(k), OsString::from(v))),
            )
            .collect();
        let mut command = Command::new(&self.path_to_git);
        command
            .current_dir(&self.repo_path)
            .args(args)
            .env_clear()
            .envs(&env);

        let result = if let Some(input) = input {
            let mut child = command
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()?;
            write!(child.stdin.take().unwrap(), "{}", &input)?;
            child.wait_with_output().wrap_err_with(|| {
                format!(
                    "Running git\nExecutable: {:?}\nArgs: {:?}\nStdin: {:?}",
                    &self.path_to_git, &args, input
                )
            })?
        } else {
            command.output().wrap_err_with(|| {
                format!(
                    "Running git\nExecutable: {:?}\nArgs: {:?}",
                    &self.path_to_git, &args
                )
            })?
        };

        let exit_code = result
            .status
            .code()
            .expect("Failed to read exit code from Git process");
        if exit_code != *expected_exit_code {
            eyre::bail!(
                "Git command {:?} {:?} exited with unexpected code {} (expected {})
stdout:
{}
stderr:
{}",
                &self.path_to_git,
                &args,
                exit_code,
                expected_exit_code,
                &String::from_utf8_lossy(&result.stdout),
                &String::from_utf8_lossy(&result.stderr),
            );
        }
        let stdout = String::from_utf8(result.stdout)?;
        let stderr = String::from_utf8(result.stderr)?;
        Ok((stdout, stderr))
    }

    /// Run a Git command.
    #[track_caller]
    pub fn run_with_options<S: AsRef<str> + std::fmt::Debug>(
        &self,
        args: &[S],
        options: &GitRunOptions,
    ) -> eyre::Result<(String, String)> {
        self.run_with_options_inner(
            args.iter()
                .map(|arg| arg.as_ref())
                .collect::<Vec<_>>()
                .as_slice(),
            options,
        )
    }

    /// Run a Git command.
    #[track_caller]
    pub fn run<S: AsRef<str> + std::fmt::Debug>(
        &self,
        args: &[S],
    ) -> eyre::Result<(String, String)> {
        self.run_with_options(args, &Default::default())
    }

    /// Set up a Git repo in the directory.
    #[instrument]
    pub fn init_repo_with_options(&self, options: &GitInitOptions) -> eyre::Result<()> {
        self.run(&["init"])?;
        self.run(&["config", "user.name", DUMMY_NAME])?;
        self.run(&["config", "user.email", DUMMY_EMAIL])?;

        // Disable "LF will be replaced by CRLF" warnings on Windows.
        self.run(&["config", "core.autocrlf", "false"])?;

        if options.make_initial_commit {
            self.commit_file("initial", 0)?;
        }

        Ok(())
    }

    /// Set up a Git repo in the directory, with an initial commit.
    pub fn init_repo(&self) -> eyre::Result<()> {
        self.init_repo_with_options(&Default::default())
    }

    /// Write the provided contents to the provided file in the repository
    /// root. For historical reasons, the name is suffixed with `.txt` (this
    /// is technical debt).
    pub fn write_file_txt(&self, name: &str, contents: &str) -> eyre::Result<()> {
        let name = format!("{name}.txt");
        self.write_file(&name, contents)
    }

    /// Write the provided contents to the provided file in the repository
    /// root.
    pub fn write_file(&self, name: &str, contents: &str) -> eyre::Result<()> {
        let path = self.repo_path.join(name);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, contents)?;
        Ok(())
    }

    /// Read the contents of the provided file in the repository root.
    pub fn read_file(&self, name: &str) -> eyre::Result<String> {
        let contents = fs::read_to_string(self.repo_path.join(name))?;
        Ok(contents)
    }

    /// Delete the provided file in the repository root.
    pub fn delete_file(&self, name: &str) -> eyre::Result<()> {
        let file_path = self.repo_path.join(format!("{name}.txt"));
        fs::remove_file(file_path)?;
        Ok(())
    }

    /// Commit a file with given contents and message. The `time` argument is
    /// used to set the commit timestamp, which is factored into the commit
    /// hash. The filename is always appended to the message prefix.
    #[track_caller]
    #[instrument]
    pub fn commit_file_with_contents_and_message(
        &self,
        name: &str,
        time: isize,
        contents: &str,
        message_prefix: &str,
    ) -> eyre::Result<()> {
        let message = format!("{message_prefix} {name}.txt");
        self.write_file_txt(name, contents)?;
        self.run(&["add", "."])?;
        self.run_with_options(
            &["commit", "-m", &message],
            &GitRunOptions {
                time,
                ..Default::default()
            },
        )?;
        Ok(())
    }

    /// Commit a file with given contents and a default message.
    #[track_caller]
    #[instrument]
    pub fn commit_file_with_contents(
        &self,
        name: &str,
        time: isize,
        contents: &str,
    ) -> eyre::Result<()> {
        self.commit_file_with_contents_and_message(name, time, contents, "create")
    }

    /// Commit a file with default contents.
    #[track_caller]
    #[instrument]
    pub fn commit_file(&self, name: &str, time: isize) -> eyre::Result<()> {
        self.commit_file_with_contents(name, time, &format!("{name} contents\n"))
    }

    /// Get the porcelain status of the repository, for asserting on tree
    /// state.
    #[instrument]
    pub fn get_status(&self) -> eyre::Result<String> {
        let (stdout, _stderr) = self.run(&["status", "--porcelain"])?;
        Ok(stdout)
    }

    /// Get the `GitRunInfo` to use for this repository.
    #[instrument]
    pub fn get_git_run_info(&self) -> GitRunInfo {
        GitRunInfo {
            path_to_git: self.path_to_git.clone(),
            working_directory: self.repo_path.clone(),
            env: self.get_base_env(0).into_iter().collect(),
        }
    }

    /// Get a `Repo` object for this repository.
    #[instrument]
    pub fn get_repo(&self) -> eyre::Result<Repo> {
        let repo = Repo::discover(&self.get_git_run_info())?;
        Ok(repo)
    }
}

/// Wrapper around a `Git` instance which cleans up the repository once
/// dropped.
pub struct GitWrapper {
    _repo_dir: TempDir,
    git: Git,
}

impl Deref for GitWrapper {
    type Target = Git;

    fn deref(&self) -> &Self::Target {
        &self.git
    }
}

static COLOR_EYRE_INSTALL: OnceCell<()> = OnceCell::new();

/// Create a temporary directory for testing and a `Git` instance to use with
/// it.
pub fn make_git() -> eyre::Result<GitWrapper> {
    COLOR_EYRE_INSTALL.get_or_try_init(color_eyre::install)?;

    let repo_dir = tempfile::tempdir()?;
    let path_to_git = get_path_to_git()?;
    let git = Git::new(path_to_git, repo_dir.path().to_path_buf());
    Ok(GitWrapper {
        _repo_dir: repo_dir,
        git,
    })
}

fn get_path_to_git() -> eyre::Result<PathBuf> {
    if let Some(path_to_git) = std::env::var_os(TEST_GIT) {
        return Ok(PathBuf::from(path_to_git));
    }
    let exe_name = if cfg!(windows) { "git.exe" } else { "git" };
    get_from_path(exe_name).ok_or_else(|| {
        eyre::eyre!(
            "could not find `{exe_name}` on PATH; \
set the {TEST_GIT} environment variable to point at a Git executable"
        )
    })
}
