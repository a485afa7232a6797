//! Hook adapters: the glue between Claude Code's hook events and the store.
//!
//! Everything here is invoked inline with an interactive session, so the
//! contract is strict: a failure may log one line to stderr but must never
//! block a prompt or a file write. The conversion to a silent exit happens
//! in `main`, not here — these functions return real errors so tests can
//! assert on them.

use crate::gitinfo;
use crate::store::{Result, Store, StoreError};
use crate::types::{HookInput, PostToolUseInput, SessionStartInput, UserPromptSubmitInput};
use std::path::{Path, PathBuf};

/// Tool calls that count as file writes for cross-repo attribution.
const TRACKED_TOOLS: &[&str] = &["Write", "Edit", "MultiEdit", "NotebookEdit"];

/// Dispatch one hook event. Events the engine doesn't consume are a no-op.
pub fn dispatch(store: &Store, input: &HookInput) -> Result<()> {
    match input {
        HookInput::SessionStart(e) => on_session_start(store, e),
        HookInput::UserPromptSubmit(e) => on_user_prompt_submit(store, e),
        HookInput::PostToolUse(e) => on_post_tool_use(store, e),
        HookInput::Other => Ok(()),
    }
}

fn effective_cwd(cwd: &str) -> String {
    if !cwd.is_empty() {
        return cwd.to_string();
    }
    std::env::current_dir()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn on_session_start(store: &Store, input: &SessionStartInput) -> Result<()> {
    if input.common.session_id.is_empty() {
        return Ok(());
    }
    let cwd = effective_cwd(&input.common.cwd);
    let repo = gitinfo::repo_root(Path::new(&cwd)).unwrap_or_default();
    let branch = if repo.is_empty() {
        String::new()
    } else {
        gitinfo::current_branch(&repo)
    };
    store.touch_session(&input.common.session_id, &repo, &branch, &cwd)
}

/// Record one captured prompt. A missing `prompt` or `session_id` is a
/// silent no-op: the capture payload is best-effort.
fn on_user_prompt_submit(store: &Store, input: &UserPromptSubmitInput) -> Result<()> {
    let text = input.prompt.trim();
    if input.common.session_id.is_empty() || text.is_empty() {
        return Ok(());
    }
    let cwd = effective_cwd(&input.common.cwd);
    let repo = gitinfo::repo_or_self(Path::new(&cwd));
    let branch = gitinfo::current_branch(&repo);

    store.touch_session(&input.common.session_id, &repo, &branch, &cwd)?;
    store.record_prompt(&input.common.session_id, text, &repo, &branch, &cwd)?;
    Ok(())
}

/// The cross-repo linker decision procedure: when a tracked file write lands
/// in a repository other than the session's primary repo, link the session's
/// most recent prompt to that repository. With no prompt recorded yet there
/// is nothing to attribute, so the write is ignored.
fn on_post_tool_use(store: &Store, input: &PostToolUseInput) -> Result<()> {
    if !TRACKED_TOOLS.contains(&input.tool_name.as_str()) {
        return Ok(());
    }
    if input.common.session_id.is_empty() {
        return Ok(());
    }
    let Some(file_path) = input.file_path() else {
        return Ok(());
    };

    let cwd = effective_cwd(&input.common.cwd);
    let mut target = PathBuf::from(&file_path);
    if target.is_relative() {
        target = Path::new(&cwd).join(target);
    }
    let parent = target.parent().unwrap_or(Path::new("/")).to_path_buf();
    let file_repo = gitinfo::repo_or_self(&parent);

    let session = match store.session(&input.common.session_id) {
        Ok(s) => s,
        Err(StoreError::NotFound { .. }) => return Ok(()),
        Err(e) => return Err(e),
    };
    if file_repo == session.repo_path {
        return Ok(());
    }

    let Some(prompt_id) = store.latest_prompt_id(&input.common.session_id)? else {
        return Ok(());
    };
    let branch = gitinfo::current_branch(&file_repo);
    store.link_cross_repo(&prompt_id, &file_repo, &branch)
}
