use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Run the binary with `PROMPTRACE_HOME` pointed at `home`, returning
/// (exit code, stdout, stderr).
pub fn run_cli(home: &Path, args: &[&str], stdin_json: Option<&str>) -> (i32, String, String) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_promptrace"))
        .args(args)
        .env("PROMPTRACE_HOME", home)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn binary");

    if let Some(json) = stdin_json {
        child
            .stdin
            .as_mut()
            .unwrap()
            .write_all(json.as_bytes())
            .unwrap();
    }

    let output = child.wait_with_output().unwrap();
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

/// Create a temp dir containing a git repo with an initial commit and return it.
/// The `TempDir` must be kept alive for the duration of the test.
pub fn temp_git_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let repo = git2::Repository::init(dir.path()).unwrap();

    // Configure user identity for commits.
    let mut config = repo.config().unwrap();
    config.set_str("user.name", "Test").unwrap();
    config.set_str("user.email", "test@test.com").unwrap();

    // Create an initial commit so HEAD exists.
    let sig = repo.signature().unwrap();
    let tree_oid = repo.index().unwrap().write_tree().unwrap();
    let tree = repo.find_tree(tree_oid).unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
        .unwrap();

    dir
}

/// The branch name the repo was initialized on (depends on git config).
pub fn default_branch(repo_path: &Path) -> String {
    let repo = git2::Repository::open(repo_path).unwrap();
    repo.head().unwrap().shorthand().unwrap().to_string()
}

/// Write a file, stage it, and commit it. Returns the commit hash.
pub fn commit_file(repo_path: &Path, name: &str, content: &str, message: &str) -> String {
    let repo = git2::Repository::open(repo_path).unwrap();
    std::fs::write(repo_path.join(name), content).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new(name)).unwrap();
    index.write().unwrap();
    let tree_oid = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_oid).unwrap();
    let sig = repo.signature().unwrap();
    let parent = repo.head().unwrap().peel_to_commit().unwrap();
    let oid = repo
        .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])
        .unwrap();
    oid.to_string()
}

/// Create a branch at HEAD and switch to it.
pub fn checkout_new_branch(repo_path: &Path, name: &str) {
    let repo = git2::Repository::open(repo_path).unwrap();
    let head = repo.head().unwrap().peel_to_commit().unwrap();
    repo.branch(name, &head, false).unwrap();
    repo.set_head(&format!("refs/heads/{name}")).unwrap();
}

pub fn prompt_event(session: &str, cwd: &str, prompt: &str) -> String {
    serde_json::json!({
        "session_id": session,
        "transcript_path": "/tmp/t.jsonl",
        "cwd": cwd,
        "hook_event_name": "UserPromptSubmit",
        "prompt": prompt
    })
    .to_string()
}

pub fn write_event(session: &str, cwd: &str, file_path: &str) -> String {
    serde_json::json!({
        "session_id": session,
        "transcript_path": "/tmp/t.jsonl",
        "cwd": cwd,
        "hook_event_name": "PostToolUse",
        "tool_name": "Write",
        "tool_input": { "file_path": file_path, "content": "x" },
        "tool_response": { "success": true }
    })
    .to_string()
}

/// Record a prompt through the hook entry point, asserting a clean exit.
pub fn submit_prompt(home: &Path, session: &str, cwd: &str, prompt: &str) {
    let (code, _stdout, stderr) = run_cli(home, &["hook"], Some(&prompt_event(session, cwd, prompt)));
    assert_eq!(code, 0, "hook failed: {stderr}");
    assert!(stderr.is_empty(), "expected no stderr, got: {stderr}");
}
