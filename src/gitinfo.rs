//! Narrow git collaborators, backed by `git2`. Everything here is a thin
//! read-only query; the engine never executes git operations itself.

use anyhow::{Context, Result};
use git2::{Repository, Status, StatusOptions};
use std::path::{Path, PathBuf};

/// Normalize a path to the string form stored in the database.
fn path_string(path: &Path) -> String {
    let s = path.to_string_lossy();
    let trimmed = s.trim_end_matches('/');
    if trimmed.is_empty() {
        s.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Discover the working-directory root of the repository containing `path`.
fn discover_workdir(path: &Path) -> Option<PathBuf> {
    let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let repo = Repository::discover(&path).ok()?;
    repo.workdir().map(Path::to_path_buf)
}

/// The repo root for `path` as a stored-path string, or `None` outside git.
pub fn repo_root(path: &Path) -> Option<String> {
    discover_workdir(path).map(|p| path_string(&p))
}

/// The repo root for `path`, falling back to `path` itself when it is not
/// inside a repository.
pub fn repo_or_self(path: &Path) -> String {
    repo_root(path).unwrap_or_else(|| path_string(path))
}

/// The current branch name for a repo root, `"unknown"` when it cannot be
/// determined. An unborn branch (no commits yet) still reports its name.
pub fn current_branch(root: &str) -> String {
    let Ok(repo) = Repository::open(root) else {
        return "unknown".to_string();
    };
    if let Ok(head) = repo.head() {
        return head.shorthand().unwrap_or("unknown").to_string();
    }
    repo.find_reference("HEAD")
        .ok()
        .and_then(|r| {
            r.symbolic_target()
                .and_then(|t| t.strip_prefix("refs/heads/"))
                .map(str::to_string)
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// The full hash of HEAD, if a commit exists.
pub fn head_hash(root: &str) -> Option<String> {
    let repo = Repository::open(root).ok()?;
    let commit = repo.head().ok()?.peel_to_commit().ok()?;
    Some(commit.id().to_string())
}

/// Files changed relative to HEAD: staged paths, or tracked worktree changes
/// when nothing is staged. Empty on any git failure.
pub fn changed_files(root: &str) -> Vec<String> {
    fn collect(root: &str) -> Option<Vec<String>> {
        let repo = Repository::open(root).ok()?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(false).include_ignored(false);
        let statuses = repo.statuses(Some(&mut opts)).ok()?;

        let staged_mask = Status::INDEX_NEW
            | Status::INDEX_MODIFIED
            | Status::INDEX_DELETED
            | Status::INDEX_RENAMED
            | Status::INDEX_TYPECHANGE;
        let worktree_mask = Status::WT_MODIFIED
            | Status::WT_DELETED
            | Status::WT_RENAMED
            | Status::WT_TYPECHANGE;

        let pick = |mask: Status| -> Vec<String> {
            statuses
                .iter()
                .filter(|s| s.status().intersects(mask))
                .filter_map(|s| s.path().map(str::to_string))
                .collect()
        };

        let staged = pick(staged_mask);
        if staged.is_empty() {
            Some(pick(worktree_mask))
        } else {
            Some(staged)
        }
    }
    collect(root).unwrap_or_default()
}

/// A short `git diff --stat`-style summary of changes since HEAD.
/// Empty on any git failure.
pub fn diff_stat(root: &str) -> String {
    fn stat(root: &str) -> Option<String> {
        let repo = Repository::open(root).ok()?;
        let head_tree = repo.head().ok()?.peel_to_tree().ok()?;
        let diff = repo
            .diff_tree_to_workdir_with_index(Some(&head_tree), None)
            .ok()?;
        let stats = diff.stats().ok()?;
        let buf = stats.to_buf(git2::DiffStatsFormat::SHORT, 80).ok()?;
        Some(buf.as_str().unwrap_or("").trim().to_string())
    }
    stat(root).unwrap_or_default()
}

/// Hashes of the commits reachable from HEAD but not from `base`.
pub fn branch_commits(root: &str, base: &str) -> Result<Vec<String>> {
    let repo = Repository::open(root).with_context(|| format!("opening repo at {root}"))?;
    let base_commit = repo
        .revparse_single(base)
        .with_context(|| format!("resolving base branch {base}"))?
        .peel_to_commit()
        .with_context(|| format!("peeling {base} to a commit"))?;
    let mut walk = repo.revwalk().context("starting revision walk")?;
    walk.push_head().context("pushing HEAD onto walk")?;
    walk.hide(base_commit.id())
        .context("hiding base branch history")?;
    let mut hashes = Vec::new();
    for oid in walk {
        hashes.push(oid.context("walking revisions")?.to_string());
    }
    Ok(hashes)
}

/// Files changed between the merge base with `base` and HEAD.
pub fn files_changed_since(root: &str, base: &str) -> Result<Vec<String>> {
    let repo = Repository::open(root).with_context(|| format!("opening repo at {root}"))?;
    let head = repo
        .head()
        .context("reading HEAD")?
        .peel_to_commit()
        .context("peeling HEAD to a commit")?;
    let base_commit = repo
        .revparse_single(base)
        .with_context(|| format!("resolving base branch {base}"))?
        .peel_to_commit()
        .with_context(|| format!("peeling {base} to a commit"))?;
    let merge_base = repo
        .merge_base(head.id(), base_commit.id())
        .context("finding merge base")?;
    let old_tree = repo
        .find_commit(merge_base)
        .context("loading merge-base commit")?
        .tree()
        .context("loading merge-base tree")?;
    let new_tree = head.tree().context("loading HEAD tree")?;
    let diff = repo
        .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), None)
        .context("diffing base against HEAD")?;
    let files = diff
        .deltas()
        .filter_map(|d| d.new_file().path().map(|p| p.to_string_lossy().to_string()))
        .collect();
    Ok(files)
}
