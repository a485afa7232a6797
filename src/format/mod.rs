//! Rendering of prompt provenance into commit-message and PR-body text.
//!
//! Two renderings exist: a `#`-prefixed comment block appended to commit
//! messages (verbose below the configured threshold, condensed above it),
//! and a markdown block used by the PR rollup and the explicit
//! `commit-context` command. Both are pure functions over prompt slices;
//! git state (changed files) is supplied by the caller.

use crate::store::Prompt;
use std::collections::HashSet;
use time::OffsetDateTime;
use time::format_description::{self, well_known::Rfc3339};


// Presentation constants. Readability knobs, not semantics: commit messages
// are read in terminals and must stay short.
const COMMENT_WRAP: usize = 90;
const SUMMARY_WRAP: usize = 80;
const MARKDOWN_WRAP: usize = 120;
const COMMENT_FILE_CAP: usize = 8;
const MARKDOWN_FILE_CAP: usize = 20;

/// Format an RFC 3339 timestamp as `YYYY-MM-DD HH:MM` (UTC), falling back to
/// the raw string if it doesn't parse.
pub fn fmt_ts(ts: &str) -> String {
    let Ok(dt) = OffsetDateTime::parse(ts, &Rfc3339) else {
        return ts.to_string();
    };
    let Ok(fmt) = format_description::parse("[year]-[month]-[day] [hour]:[minute]") else {
        return ts.to_string();
    };
    dt.format(&fmt).unwrap_or_else(|_| ts.to_string())
}

/// Human-readable span between two RFC 3339 timestamps: `42s`, `7m`, `2h 10m`.
fn duration_str(first: &str, last: &str) -> Option<String> {
    let t0 = OffsetDateTime::parse(first, &Rfc3339).ok()?;
    let t1 = OffsetDateTime::parse(last, &Rfc3339).ok()?;
    let secs = (t1 - t0).whole_seconds().max(0);
    if secs < 60 {
        return Some(format!("{secs}s"));
    }
    let mins = secs / 60;
    if mins < 60 {
        return Some(format!("{mins}m"));
    }
    let (h, m) = (mins / 60, mins % 60);
    Some(if m == 0 {
        format!("{h}h")
    } else {
        format!("{h}h {m}m")
    })
}

/// Collapse newlines and truncate to `limit` chars with an ellipsis.
/// Display-only: stored prompt text is never shortened.
fn truncate(text: &str, limit: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if flat.chars().count() <= limit {
        return flat;
    }
    let cut: String = flat.chars().take(limit.saturating_sub(3)).collect();
    format!("{cut}...")
}

fn short_id(session_id: &str) -> String {
    session_id.chars().take(8).collect()
}

struct SessionGroup<'a> {
    session_id: &'a str,
    started: &'a str,
    prompts: Vec<&'a Prompt>,
}

/// Group prompts by session, preserving first-appearance order of sessions
/// and chronological order within each group.
fn group_by_session(prompts: &[Prompt]) -> Vec<SessionGroup<'_>> {
    let mut groups: Vec<SessionGroup<'_>> = Vec::new();
    for p in prompts {
        match groups.iter_mut().find(|g| g.session_id == p.session_id) {
            Some(g) => g.prompts.push(p),
            None => groups.push(SessionGroup {
                session_id: &p.session_id,
                started: p.session_started.as_deref().unwrap_or(&p.timestamp),
                prompts: vec![p],
            }),
        }
    }
    groups
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// The `#`-prefixed provenance block appended to a commit message, or `None`
/// when there is nothing to attribute.
///
/// At most `verbose_threshold` prompts each prompt is shown verbatim; above
/// it only counts, the overall span, and the first and last prompts appear,
/// with a pointer to the on-demand full-detail query.
pub fn commit_comment_block(
    prompts: &[Prompt],
    changed_files: &[String],
    verbose_threshold: usize,
) -> Option<String> {
    if prompts.is_empty() {
        return None;
    }
    let groups = group_by_session(prompts);
    let total = prompts.len();

    let mut lines = vec![
        String::new(),
        "# ── AI Provenance ──────────────────────────────────────────".to_string(),
        "#".to_string(),
    ];

    if total <= verbose_threshold {
        for (idx, g) in groups.iter().enumerate() {
            let n = g.prompts.len();
            lines.push(format!(
                "# Session {}  ({}, id: {}, {} prompt{})",
                idx + 1,
                fmt_ts(g.started),
                short_id(g.session_id),
                n,
                plural(n),
            ));
            for p in &g.prompts {
                lines.push(format!("#   • {}", truncate(&p.text, COMMENT_WRAP)));
            }
            lines.push("#".to_string());
        }
    } else {
        let span = duration_str(&prompts[0].timestamp, &prompts[total - 1].timestamp)
            .map(|d| format!(" over {d}"))
            .unwrap_or_default();
        lines.push(format!(
            "# {} prompts · {} session{}{}",
            total,
            groups.len(),
            plural(groups.len()),
            span,
        ));
        lines.push("#".to_string());
        for (idx, g) in groups.iter().enumerate() {
            let n = g.prompts.len();
            lines.push(format!(
                "# Session {}  ({}, id: {}, {} prompt{})",
                idx + 1,
                fmt_ts(g.started),
                short_id(g.session_id),
                n,
                plural(n),
            ));
        }
        lines.push("#".to_string());
        lines.push(format!(
            "# First: {}",
            truncate(&prompts[0].text, SUMMARY_WRAP)
        ));
        lines.push(format!(
            "# Last:  {}",
            truncate(&prompts[total - 1].text, SUMMARY_WRAP)
        ));
        lines.push("#".to_string());
        lines.push("# Full history: run `promptrace session-summary`".to_string());
    }

    if !changed_files.is_empty() {
        let files = if changed_files.len() <= COMMENT_FILE_CAP {
            changed_files.join(", ")
        } else {
            format!(
                "{} (+{} more)",
                changed_files[..COMMENT_FILE_CAP].join(", "),
                changed_files.len() - COMMENT_FILE_CAP,
            )
        };
        lines.push(format!("# Files: {files}"));
        lines.push("#".to_string());
    }

    lines.push("# ─────────────────────────────────────────────────────────".to_string());
    Some(lines.join("\n"))
}

/// Markdown session groups shared by `commit_context` and `pr_rollup`.
fn markdown_sessions(prompts: &[Prompt]) -> Vec<String> {
    let mut lines = Vec::new();
    for (idx, g) in group_by_session(prompts).iter().enumerate() {
        let n = g.prompts.len();
        lines.push(format!(
            "**Session {}** ({}, id: {}, {} prompt{})",
            idx + 1,
            fmt_ts(g.started),
            short_id(g.session_id),
            n,
            plural(n),
        ));
        for p in &g.prompts {
            lines.push(format!("  - {}", truncate(&p.text, MARKDOWN_WRAP)));
        }
        lines.push(String::new());
    }
    lines
}

fn markdown_files(changed_files: &[String]) -> Vec<String> {
    if changed_files.is_empty() {
        return Vec::new();
    }
    let capped = &changed_files[..changed_files.len().min(MARKDOWN_FILE_CAP)];
    let mut lines = vec![format!("**Files changed:** {}", capped.join(", "))];
    if changed_files.len() > MARKDOWN_FILE_CAP {
        lines.push(format!(
            "  ...and {} more",
            changed_files.len() - MARKDOWN_FILE_CAP
        ));
    }
    lines.push(String::new());
    lines
}

/// A markdown provenance section appended to an optional base commit message.
/// Always verbose; used by the explicitly-invoked `commit-context` command.
pub fn commit_context(
    base_message: Option<&str>,
    prompts: &[Prompt],
    changed_files: &[String],
) -> String {
    let mut lines: Vec<String> = Vec::new();
    if let Some(base) = base_message.filter(|m| !m.is_empty()) {
        lines.push(base.to_string());
        lines.push(String::new());
    }

    if prompts.is_empty() {
        lines.push("No AI prompts tracked for this commit.".to_string());
    } else {
        lines.push("## AI Provenance".to_string());
        lines.push(String::new());
        lines.extend(markdown_sessions(prompts));
        lines.extend(markdown_files(changed_files));
    }

    lines.push(format!(
        "_Tracked by promptrace | {} prompt(s)_",
        prompts.len()
    ));
    lines.join("\n")
}

/// Merge prompt sets from the three rollup sources, deduplicating by
/// `prompt_id` and sorting the result chronologically. A prompt may
/// legitimately appear in more than one source query.
pub fn merge_prompt_sets(sets: Vec<Vec<Prompt>>) -> Vec<Prompt> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged: Vec<Prompt> = Vec::new();
    for set in sets {
        for p in set {
            if seen.insert(p.prompt_id.clone()) {
                merged.push(p);
            }
        }
    }
    merged.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.prompt_id.cmp(&b.prompt_id))
    });
    merged
}

/// The PR-body provenance block for an already-merged prompt set. Always the
/// verbose rendering: a PR body has no length pressure comparable to a
/// commit subject line.
pub fn pr_rollup(prompts: &[Prompt], changed_files: &[String]) -> String {
    let mut lines = vec!["## AI Provenance".to_string(), String::new()];
    if prompts.is_empty() {
        lines.push("No AI prompts recorded for this branch.".to_string());
        lines.push(String::new());
    } else {
        lines.extend(markdown_sessions(prompts));
    }
    lines.extend(markdown_files(changed_files));
    lines.push(format!(
        "_Tracked by promptrace | {} prompt(s)_",
        prompts.len()
    ));
    lines.join("\n")
}
