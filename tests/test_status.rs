use std::path::PathBuf;

use lint_staged::git::{FileStatus, StatusEntry};
use lint_staged::testing::make_git;

#[test]
fn test_parse_status_line() {
    assert_eq!(
        StatusEntry::try_from("MM repo.rs".as_bytes()).unwrap(),
        StatusEntry {
            index_status: FileStatus::Modified,
            working_tree_status: FileStatus::Modified,
            path: "repo.rs".into(),
            orig_path: None,
        }
    );

    assert_eq!(
        StatusEntry::try_from(" M repo.rs".as_bytes()).unwrap(),
        StatusEntry {
            index_status: FileStatus::Unmodified,
            working_tree_status: FileStatus::Modified,
            path: "repo.rs".into(),
            orig_path: None,
        }
    );

    assert_eq!(
        StatusEntry::try_from("A  new file.rs".as_bytes()).unwrap(),
        StatusEntry {
            index_status: FileStatus::Added,
            working_tree_status: FileStatus::Unmodified,
            path: "new file.rs".into(),
            orig_path: None,
        }
    );

    assert_eq!(
        StatusEntry::try_from("?? untracked.rs".as_bytes()).unwrap(),
        StatusEntry {
            index_status: FileStatus::Untracked,
            working_tree_status: FileStatus::Untracked,
            path: "untracked.rs".into(),
            orig_path: None,
        }
    );

    let entry = StatusEntry::try_from("RM old_file.rs -> new_file.rs".as_bytes()).unwrap();
    assert_eq!(
        entry,
        StatusEntry {
            index_status: FileStatus::Renamed,
            working_tree_status: FileStatus::Modified,
            path: "new_file.rs".into(),
            orig_path: Some("old_file.rs".into()),
        }
    );
    assert_eq!(
        entry.paths(true),
        vec![PathBuf::from("old_file.rs"), PathBuf::from("new_file.rs")]
    );
    assert_eq!(entry.paths(false), vec![PathBuf::from("new_file.rs")]);

    assert!(StatusEntry::try_from("".as_bytes()).is_err());
    assert!(StatusEntry::try_from("MM".as_bytes()).is_err());
}

#[test]
fn test_is_partially_staged() {
    let make_entry = |index_status, working_tree_status| StatusEntry {
        index_status,
        working_tree_status,
        path: "repo.rs".into(),
        orig_path: None,
    };

    assert!(make_entry(FileStatus::Modified, FileStatus::Modified).is_partially_staged());
    assert!(make_entry(FileStatus::Renamed, FileStatus::Deleted).is_partially_staged());
    assert!(!make_entry(FileStatus::Modified, FileStatus::Unmodified).is_partially_staged());
    assert!(!make_entry(FileStatus::Unmodified, FileStatus::Modified).is_partially_staged());
    assert!(!make_entry(FileStatus::Untracked, FileStatus::Untracked).is_partially_staged());
}

#[test]
fn test_get_status_entries() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    git.commit_file("test1", 1)?;

    git.write_file_txt("test1", "staged contents\n")?;
    git.run(&["add", "test1.txt"])?;
    git.write_file_txt("test1", "staged contents\nplus unstaged\n")?;
    git.write_file_txt("untracked", "should show up as untracked\n")?;

    let repo = git.get_repo()?;
    let entries = repo.get_status_entries(&git.get_git_run_info())?;
    insta::assert_debug_snapshot!(entries, @r###"
    [
        StatusEntry {
            index_status: Modified,
            working_tree_status: Modified,
            path: "test1.txt",
            orig_path: None,
        },
        StatusEntry {
            index_status: Untracked,
            working_tree_status: Untracked,
            path: "untracked.txt",
            orig_path: None,
        },
    ]
    "###);

    let partially_staged = repo.get_partially_staged_files(&git.get_git_run_info())?;
    assert_eq!(partially_staged.len(), 1);
    assert_eq!(partially_staged[0].path, PathBuf::from("test1.txt"));

    Ok(())
}

#[test]
fn test_get_status_entries_with_rename() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    git.commit_file("old", 1)?;

    git.run(&["mv", "old.txt", "new.txt"])?;
    git.write_file_txt("new", "modified after rename\n")?;

    let repo = git.get_repo()?;
    let entries = repo.get_status_entries(&git.get_git_run_info())?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].index_status, FileStatus::Renamed);
    assert_eq!(entries[0].path, PathBuf::from("new.txt"));
    assert_eq!(entries[0].orig_path, Some(PathBuf::from("old.txt")));
    assert!(entries[0].is_partially_staged());

    Ok(())
}

#[test]
fn test_get_deleted_files() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    git.commit_file("doomed", 1)?;

    git.delete_file("doomed")?;

    let repo = git.get_repo()?;
    let deleted = repo.get_deleted_files(&git.get_git_run_info())?;
    assert_eq!(
        deleted,
        vec![repo.get_working_copy_path().join("doomed.txt")]
    );

    Ok(())
}

#[test]
fn test_get_staged_files() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    git.commit_file("committed", 1)?;

    git.write_file_txt("staged", "staged contents\n")?;
    git.run(&["add", "staged.txt"])?;
    git.write_file_txt("unstaged", "not staged\n")?;
    // A staged deletion carries no content for tasks to check.
    git.run(&["rm", "committed.txt"])?;

    let repo = git.get_repo()?;
    let staged = repo.get_staged_files(&git.get_git_run_info())?;
    assert_eq!(staged, vec![PathBuf::from("staged.txt")]);

    Ok(())
}

#[test]
fn test_discover_repo_paths() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;

    let repo = git.get_repo()?;
    assert!(repo.get_working_copy_path().is_absolute());
    assert!(repo.get_git_dir().is_absolute());
    assert!(repo.get_git_dir().join("HEAD").is_file());

    Ok(())
}
