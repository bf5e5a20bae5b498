use lint_staged::git::GitError;
use lint_staged::testing::make_git;

#[test]
fn test_run_captures_stdout() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;

    let git_run_info = git.get_git_run_info();
    let stdout = git_run_info.run(&["rev-parse", "--show-toplevel"])?;
    assert!(!stdout.is_empty());

    Ok(())
}

#[test]
fn test_run_failure_carries_args_and_stderr() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;

    let git_run_info = git.get_git_run_info();
    let result = git_run_info.run(&["some-nonexistent-command"]);
    match result {
        Err(GitError::GitFailed {
            args,
            exit_code,
            stderr,
        }) => {
            assert_eq!(args, vec!["some-nonexistent-command".to_string()]);
            assert_ne!(exit_code, 0);
            assert!(!stderr.is_empty());
        }
        other => panic!("expected GitFailed, got: {other:?}"),
    }

    Ok(())
}

#[test]
fn test_run_passes_filenames_with_spaces_unmangled() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    git.write_file("file with spaces.txt", "contents\n")?;

    let git_run_info = git.get_git_run_info();
    git_run_info.run(&["add", "--", "file with spaces.txt"])?;
    let stdout = git_run_info.run(&["diff", "--name-only", "--cached"])?;
    assert_eq!(String::from_utf8(stdout)?, "file with spaces.txt\n");

    Ok(())
}
