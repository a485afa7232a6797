//! Explicitly-invoked commands: git hook entry points, the PR body builder,
//! and the query tools served to an interactive agent. Query tools print
//! pretty JSON; a human (or agent) is waiting on them, so unlike the hook
//! path their errors are surfaced rather than swallowed.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::config::{self, Settings};
use crate::format;
use crate::gitinfo;
use crate::hooks;
use crate::store::Store;
use crate::types::HookInput;

fn open_store() -> Result<Store> {
    let path = config::db_path()?;
    Ok(Store::open(&path)?)
}

/// Resolve the target repo: explicit path, else the git root of the current
/// directory, else the current directory itself.
fn resolve_repo(repo: Option<&Path>) -> Result<String> {
    match repo {
        Some(p) => Ok(gitinfo::repo_or_self(p)),
        None => {
            let cwd = std::env::current_dir().context("reading current directory")?;
            Ok(gitinfo::repo_or_self(&cwd))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("serializing output")?
    );
    Ok(())
}

// ---------------------------------------------------------------
// Hook entry points
// ---------------------------------------------------------------

/// Read one hook event JSON from stdin and dispatch it. Malformed payloads
/// are a silent no-op; store failures propagate so `main` can log them
/// (still exiting 0 — provenance must never block a session).
pub fn hook() -> Result<()> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("reading hook input")?;
    if raw.trim().is_empty() {
        return Ok(());
    }
    let Ok(input) = serde_json::from_str::<HookInput>(&raw) else {
        return Ok(());
    };
    let store = open_store()?;
    hooks::dispatch(&store, &input)?;
    Ok(())
}

/// Append the provenance comment block to the commit message file.
pub fn prepare_commit_msg(commit_msg_file: &Path, repo: Option<&Path>) -> Result<()> {
    let repo_path = resolve_repo(repo)?;
    let data_dir = config::data_dir()?;
    let settings = Settings::load(&data_dir)?;

    let store = open_store()?;
    let prompts = store.uncommitted_prompts(&repo_path)?;
    let files = gitinfo::changed_files(&repo_path);

    let Some(block) = format::commit_comment_block(&prompts, &files, settings.verbose_threshold)
    else {
        return Ok(());
    };

    let mut file = OpenOptions::new()
        .append(true)
        .open(commit_msg_file)
        .with_context(|| format!("opening {}", commit_msg_file.display()))?;
    writeln!(file, "{block}")
        .with_context(|| format!("appending to {}", commit_msg_file.display()))?;
    Ok(())
}

/// Mark every uncommitted prompt for the repo as committed. Runs only after
/// the commit object exists, so the hash argument (or HEAD) is authoritative.
pub fn post_commit(repo: Option<&Path>, commit_hash: Option<&str>) -> Result<()> {
    let repo_path = resolve_repo(repo)?;
    let hash = match commit_hash {
        Some(h) => h.to_string(),
        None => match gitinfo::head_hash(&repo_path) {
            Some(h) => h,
            None => return Ok(()),
        },
    };
    let store = open_store()?;
    let count = store.mark_committed(&repo_path, &hash)?;
    if count > 0 {
        let short: String = hash.chars().take(8).collect();
        eprintln!("[promptrace] {count} prompt(s) recorded for commit {short}");
    }
    Ok(())
}

// ---------------------------------------------------------------
// PR rollup
// ---------------------------------------------------------------

/// Build and print the PR body for the current branch against `base`.
///
/// Merges the three prompt sources — prompts attributed to the branch's
/// commits, prompts still uncommitted in this repo, and prompts linked here
/// cross-repo — deduplicated and sorted, then renders them through the
/// configured PR template. Opening the PR is the caller's job.
pub fn pr_body(base: &str, repo: Option<&Path>) -> Result<()> {
    let repo_path = resolve_repo(repo)?;
    let commits = gitinfo::branch_commits(&repo_path, base)?;
    let files = gitinfo::files_changed_since(&repo_path, base)?;

    let store = open_store()?;
    let merged = format::merge_prompt_sets(vec![
        store.prompts_for_commits(&commits)?,
        store.uncommitted_prompts(&repo_path)?,
        store.cross_repo_prompts(&repo_path)?,
    ]);
    let provenance = format::pr_rollup(&merged, &files);

    let data_dir = config::data_dir()?;
    let settings = Settings::load(&data_dir)?;
    let body = settings.render_pr_body(&data_dir, &provenance, &repo_path, base)?;
    println!("{body}");
    Ok(())
}

// ---------------------------------------------------------------
// Query tools
// ---------------------------------------------------------------

#[derive(Serialize)]
struct PromptLine {
    timestamp: String,
    text: String,
}

#[derive(Serialize)]
struct SessionBlock {
    session_id: String,
    started_at: String,
    prompts: Vec<PromptLine>,
}

#[derive(Serialize)]
struct UncommittedReport {
    repo_path: String,
    branch: String,
    total_uncommitted_prompts: usize,
    sessions: Vec<SessionBlock>,
    git_files_changed: Vec<String>,
    git_diff_stat: String,
}

/// All uncommitted prompts plus git changes since the last commit.
pub fn uncommitted(repo: Option<&Path>) -> Result<()> {
    let repo_path = resolve_repo(repo)?;
    let store = open_store()?;
    let prompts = store.uncommitted_prompts(&repo_path)?;

    let mut sessions: Vec<SessionBlock> = Vec::new();
    for p in &prompts {
        let started = p.session_started.as_deref().unwrap_or(&p.timestamp);
        let line = PromptLine {
            timestamp: format::fmt_ts(&p.timestamp),
            text: p.text.clone(),
        };
        match sessions.iter_mut().find(|b| b.session_id == p.session_id) {
            Some(block) => block.prompts.push(line),
            None => sessions.push(SessionBlock {
                session_id: p.session_id.clone(),
                started_at: format::fmt_ts(started),
                prompts: vec![line],
            }),
        }
    }

    print_json(&UncommittedReport {
        branch: gitinfo::current_branch(&repo_path),
        total_uncommitted_prompts: prompts.len(),
        sessions,
        git_files_changed: gitinfo::changed_files(&repo_path),
        git_diff_stat: gitinfo::diff_stat(&repo_path),
        repo_path,
    })
}

#[derive(Serialize)]
struct SessionRow {
    session_id: String,
    branch: String,
    started_at: String,
    last_active: String,
    total_prompts: i64,
    uncommitted_prompts: i64,
}

#[derive(Serialize)]
struct SessionsReport {
    repo_path: String,
    sessions: Vec<SessionRow>,
}

/// Recent sessions for a repository, most recently active first.
pub fn sessions(repo: Option<&Path>, limit: usize) -> Result<()> {
    let repo_path = resolve_repo(repo)?;
    let store = open_store()?;
    let rows = store
        .recent_sessions(&repo_path, limit)?
        .into_iter()
        .map(|s| SessionRow {
            session_id: s.session.session_id,
            branch: s.session.branch_name,
            started_at: format::fmt_ts(&s.session.started_at),
            last_active: format::fmt_ts(&s.session.last_active),
            total_prompts: s.total_prompts,
            uncommitted_prompts: s.uncommitted_prompts,
        })
        .collect();
    print_json(&SessionsReport {
        repo_path,
        sessions: rows,
    })
}

#[derive(Serialize)]
struct PromptReport {
    id: String,
    timestamp: String,
    text: String,
    committed: bool,
    commit_hash: Option<String>,
}

#[derive(Serialize)]
struct SessionSummaryReport {
    session_id: String,
    repo_path: String,
    branch: String,
    started_at: String,
    last_active: String,
    prompt_count: usize,
    prompts: Vec<PromptReport>,
}

/// Summarize one session; defaults to the repo's most recent session.
pub fn session_summary(repo: Option<&Path>, session_id: Option<&str>) -> Result<()> {
    let repo_path = resolve_repo(repo)?;
    let store = open_store()?;

    let session_id = match session_id {
        Some(id) => id.to_string(),
        None => {
            let recent = store.recent_sessions(&repo_path, 1)?;
            match recent.into_iter().next() {
                Some(s) => s.session.session_id,
                None => bail!("no sessions recorded for this repository yet"),
            }
        }
    };

    let session = store.session(&session_id)?;
    let prompts = store.prompts_for_session(&session_id)?;

    print_json(&SessionSummaryReport {
        session_id: session.session_id,
        repo_path: session.repo_path,
        branch: session.branch_name,
        started_at: format::fmt_ts(&session.started_at),
        last_active: format::fmt_ts(&session.last_active),
        prompt_count: prompts.len(),
        prompts: prompts
            .into_iter()
            .map(|p| PromptReport {
                id: p.prompt_id,
                timestamp: format::fmt_ts(&p.timestamp),
                text: p.text,
                committed: p.committed,
                commit_hash: p.commit_hash,
            })
            .collect(),
    })
}

/// Render the markdown provenance section, optionally appended to a base
/// commit message.
pub fn commit_context(repo: Option<&Path>, message: Option<&str>) -> Result<()> {
    let repo_path = resolve_repo(repo)?;
    let store = open_store()?;
    let prompts = store.uncommitted_prompts(&repo_path)?;
    let files = gitinfo::changed_files(&repo_path);
    println!("{}", format::commit_context(message, &prompts, &files));
    Ok(())
}

#[derive(Serialize)]
struct SettingsView {
    verbose_threshold: usize,
}

#[derive(Serialize)]
struct ConfigReport {
    config_path: PathBuf,
    settings: SettingsView,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated: Option<SettingsView>,
}

/// Get or set configuration.
pub fn configure(verbose_threshold: Option<usize>) -> Result<()> {
    let data_dir = config::data_dir()?;
    let mut settings = Settings::load(&data_dir)?;

    let updated = match verbose_threshold {
        Some(value) => {
            if value < 1 {
                bail!("verbose_threshold must be >= 1");
            }
            settings.verbose_threshold = value;
            settings.save(&data_dir)?;
            Some(SettingsView {
                verbose_threshold: value,
            })
        }
        None => None,
    };

    print_json(&ConfigReport {
        config_path: config::settings_path()?,
        settings: SettingsView {
            verbose_threshold: settings.verbose_threshold,
        },
        updated,
    })
}
