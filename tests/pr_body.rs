mod common;

use common::{
    checkout_new_branch, commit_file, default_branch, run_cli, submit_prompt, temp_git_repo,
};

#[test]
fn rollup_merges_committed_and_pending_prompts() {
    let home = tempfile::tempdir().unwrap();
    let repo = temp_git_repo();
    let cwd = repo.path().to_str().unwrap();
    let base = default_branch(repo.path());

    submit_prompt(home.path(), "sess-a", cwd, "add the parser");
    checkout_new_branch(repo.path(), "feature");
    let hash = commit_file(repo.path(), "parser.rs", "fn parse() {}", "add parser");
    let (code, _, stderr) = run_cli(home.path(), &["post-commit", cwd, &hash], None);
    assert_eq!(code, 0, "post-commit failed: {stderr}");

    submit_prompt(home.path(), "sess-a", cwd, "now wire it up");

    let (code, body, stderr) = run_cli(
        home.path(),
        &["pr-body", "--base", &base, "--repo", cwd],
        None,
    );
    assert_eq!(code, 0, "pr-body failed: {stderr}");

    assert!(body.contains("## AI Provenance"), "missing header:\n{body}");
    assert!(body.contains("add the parser"));
    assert!(body.contains("now wire it up"));
    assert!(body.contains("**Files changed:**"));
    assert!(body.contains("parser.rs"));

    // Committed before pending, each exactly once.
    let committed = body.find("add the parser").unwrap();
    let pending = body.find("now wire it up").unwrap();
    assert!(committed < pending, "out of order:\n{body}");
    assert_eq!(body.matches("add the parser").count(), 1);
}

#[test]
fn rollup_stays_verbose_regardless_of_threshold() {
    let home = tempfile::tempdir().unwrap();
    let repo = temp_git_repo();
    let cwd = repo.path().to_str().unwrap();
    let base = default_branch(repo.path());

    checkout_new_branch(repo.path(), "feature");
    for i in 0..8 {
        submit_prompt(home.path(), "sess-a", cwd, &format!("refine pass {i}"));
    }

    let (_, body, _) = run_cli(
        home.path(),
        &["pr-body", "--base", &base, "--repo", cwd],
        None,
    );
    // Every prompt is spelled out, never the condensed First/Last digest.
    for i in 0..8 {
        assert!(body.contains(&format!("refine pass {i}")), "missing pass {i}:\n{body}");
    }
    assert!(!body.contains("First:"));
}

#[test]
fn empty_branch_reports_no_prompts() {
    let home = tempfile::tempdir().unwrap();
    let repo = temp_git_repo();
    let cwd = repo.path().to_str().unwrap();
    let base = default_branch(repo.path());

    let (code, body, stderr) = run_cli(
        home.path(),
        &["pr-body", "--base", &base, "--repo", cwd],
        None,
    );
    assert_eq!(code, 0, "pr-body failed: {stderr}");
    assert!(body.contains("No AI prompts recorded for this branch."), "got:\n{body}");
}
