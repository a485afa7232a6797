mod common;

use common::{prompt_event, run_cli, submit_prompt, temp_git_repo};

#[test]
fn records_prompts_oldest_first() {
    let home = tempfile::tempdir().unwrap();
    let repo = temp_git_repo();
    let cwd = repo.path().to_str().unwrap();

    for i in 0..3 {
        submit_prompt(home.path(), "sess-a", cwd, &format!("step {i}"));
    }

    let (code, stdout, stderr) = run_cli(home.path(), &["uncommitted", "--repo", cwd], None);
    assert_eq!(code, 0, "uncommitted failed: {stderr}");
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["total_uncommitted_prompts"], 3);

    let sessions = report["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["session_id"], "sess-a");
    let prompts = sessions[0]["prompts"].as_array().unwrap();
    for (i, p) in prompts.iter().enumerate() {
        assert_eq!(p["text"], format!("step {i}"));
    }
}

#[test]
fn prompt_snapshot_captures_repo_and_branch() {
    let home = tempfile::tempdir().unwrap();
    let repo = temp_git_repo();
    let cwd = repo.path().to_str().unwrap();

    submit_prompt(home.path(), "sess-b", cwd, "hello");

    let (code, stdout, _) = run_cli(home.path(), &["sessions", "--repo", cwd], None);
    assert_eq!(code, 0);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let sessions = report["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["session_id"], "sess-b");
    assert_eq!(sessions[0]["total_prompts"], 1);
    assert_eq!(sessions[0]["uncommitted_prompts"], 1);
    assert!(!sessions[0]["branch"].as_str().unwrap().is_empty());
}

#[test]
fn malformed_hook_payload_is_a_silent_noop() {
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, stderr) = run_cli(home.path(), &["hook"], Some("this is not json"));
    assert_eq!(code, 0);
    assert!(stdout.is_empty());
    assert!(stderr.is_empty(), "expected silence, got: {stderr}");
}

#[test]
fn empty_prompt_is_not_recorded() {
    let home = tempfile::tempdir().unwrap();
    let repo = temp_git_repo();
    let cwd = repo.path().to_str().unwrap();

    let (code, _, stderr) = run_cli(
        home.path(),
        &["hook"],
        Some(&prompt_event("sess-c", cwd, "   ")),
    );
    assert_eq!(code, 0);
    assert!(stderr.is_empty());

    let (_, stdout, _) = run_cli(home.path(), &["uncommitted", "--repo", cwd], None);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["total_uncommitted_prompts"], 0);
}

#[test]
fn unreachable_store_never_blocks_the_hook() {
    // Point the data directory at a plain file so the store cannot open.
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("not-a-directory");
    std::fs::write(&home, "x").unwrap();
    let repo = temp_git_repo();
    let cwd = repo.path().to_str().unwrap();

    let (code, stdout, stderr) = run_cli(&home, &["hook"], Some(&prompt_event("sess-e", cwd, "hi")));
    assert_eq!(code, 0, "hook must fail open");
    assert!(stdout.is_empty());
    assert_eq!(stderr.lines().count(), 1, "expected one notice, got: {stderr}");
    assert!(stderr.contains("promptrace:"), "got: {stderr}");
}

#[test]
fn unreachable_store_never_blocks_a_commit() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("not-a-directory");
    std::fs::write(&home, "x").unwrap();
    let repo = temp_git_repo();
    let cwd = repo.path().to_str().unwrap();

    let msg_file = repo.path().join("COMMIT_EDITMSG");
    std::fs::write(&msg_file, "fix: widget\n").unwrap();
    let (code, _, stderr) = run_cli(
        &home,
        &["prepare-commit-msg", msg_file.to_str().unwrap(), cwd],
        None,
    );
    assert_eq!(code, 0, "prepare-commit-msg must fail open");
    assert_eq!(stderr.lines().count(), 1, "expected one notice, got: {stderr}");
    assert_eq!(std::fs::read_to_string(&msg_file).unwrap(), "fix: widget\n");

    let (code, _, stderr) = run_cli(&home, &["post-commit", cwd], None);
    assert_eq!(code, 0, "post-commit must fail open");
    assert_eq!(stderr.lines().count(), 1, "expected one notice, got: {stderr}");
}

#[test]
fn unknown_hook_events_are_ignored() {
    let home = tempfile::tempdir().unwrap();
    let input = serde_json::json!({
        "session_id": "sess-d",
        "cwd": "/tmp",
        "hook_event_name": "Notification",
        "message": "hi"
    })
    .to_string();
    let (code, stdout, stderr) = run_cli(home.path(), &["hook"], Some(&input));
    assert_eq!(code, 0);
    assert!(stdout.is_empty());
    assert!(stderr.is_empty());
}
