use lint_staged::git::{
    apply_backup_stash, drop_backup_stash, find_backup_stash, save_backup_stash,
    BACKUP_STASH_MESSAGE,
};
use lint_staged::testing::make_git;

#[test]
fn test_find_backup_stash_missing() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;

    let git_run_info = git.get_git_run_info();
    assert_eq!(find_backup_stash(&git_run_info)?, None);

    Ok(())
}

#[test]
fn test_find_backup_stash_re_resolves_ordinal() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    git.commit_file("test1", 1)?;

    let git_run_info = git.get_git_run_info();
    git.write_file_txt("test1", "engine change\n")?;
    save_backup_stash(&git_run_info)?;
    assert_eq!(
        find_backup_stash(&git_run_info)?,
        Some("stash@{0}".to_string())
    );

    // A stash created by the user in the meantime shifts every ordinal.
    git.write_file_txt("test1", "user change\n")?;
    git.run(&["stash", "push", "-m", "wip"])?;
    assert_eq!(
        find_backup_stash(&git_run_info)?,
        Some("stash@{1}".to_string())
    );

    Ok(())
}

#[test]
fn test_save_and_apply_preserves_staged_split() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    git.commit_file_with_contents("test1", 1, "one\ntwo\n")?;

    git.write_file_txt("test1", "one staged\ntwo\n")?;
    git.run(&["add", "test1.txt"])?;
    git.write_file_txt("test1", "one staged\ntwo unstaged\n")?;
    let status_before = git.get_status()?;
    assert_eq!(status_before, "MM test1.txt\n");

    let git_run_info = git.get_git_run_info();
    save_backup_stash(&git_run_info)?;
    let stash_ref = find_backup_stash(&git_run_info)?.unwrap();
    apply_backup_stash(&git_run_info, &stash_ref)?;

    assert_eq!(git.get_status()?, status_before);
    assert_eq!(git.read_file("test1.txt")?, "one staged\ntwo unstaged\n");

    Ok(())
}

#[test]
fn test_drop_backup_stash_leaves_user_stashes() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    git.commit_file("test1", 1)?;

    git.write_file_txt("test1", "user change\n")?;
    git.run(&["stash", "push", "-m", "wip"])?;
    git.write_file_txt("test1", "engine change\n")?;
    let git_run_info = git.get_git_run_info();
    save_backup_stash(&git_run_info)?;

    let stash_ref = find_backup_stash(&git_run_info)?.unwrap();
    assert_eq!(stash_ref, "stash@{0}");
    drop_backup_stash(&git_run_info, &stash_ref)?;

    let (stash_list, _stderr) = git.run(&["stash", "list"])?;
    assert!(stash_list.contains("wip"));
    assert!(!stash_list.contains(BACKUP_STASH_MESSAGE));

    Ok(())
}
