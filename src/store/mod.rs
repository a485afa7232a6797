use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::path::Path;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;


/// Errors surfaced by the provenance store.
///
/// Hook adapters convert every variant into a silent exit; explicitly-invoked
/// commands are allowed to show them to the user.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("provenance store unavailable: {0}")]
    Unavailable(String),
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    session_id   TEXT PRIMARY KEY,
    repo_path    TEXT NOT NULL DEFAULT '',
    branch_name  TEXT NOT NULL DEFAULT '',
    cwd          TEXT NOT NULL DEFAULT '',
    started_at   TEXT NOT NULL,
    last_active  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS prompts (
    prompt_id    TEXT PRIMARY KEY,
    session_id   TEXT NOT NULL,
    repo_path    TEXT NOT NULL DEFAULT '',
    branch_name  TEXT NOT NULL DEFAULT '',
    cwd          TEXT NOT NULL DEFAULT '',
    prompt_text  TEXT NOT NULL,
    timestamp    TEXT NOT NULL,
    committed    INTEGER NOT NULL DEFAULT 0,
    commit_hash  TEXT
);

CREATE INDEX IF NOT EXISTS idx_prompts_session
    ON prompts(session_id);
CREATE INDEX IF NOT EXISTS idx_prompts_repo
    ON prompts(repo_path);
CREATE INDEX IF NOT EXISTS idx_prompts_uncommitted
    ON prompts(repo_path, committed)
    WHERE committed = 0;

CREATE TABLE IF NOT EXISTS prompt_repos (
    prompt_id   TEXT NOT NULL,
    repo_path   TEXT NOT NULL,
    branch_name TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (prompt_id, repo_path)
);

CREATE INDEX IF NOT EXISTS idx_prompt_repos_repo
    ON prompt_repos(repo_path);
";

/// One interactive working session. Exactly one row per `session_id`.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub repo_path: String,
    pub branch_name: String,
    pub cwd: String,
    pub started_at: String,
    pub last_active: String,
}

/// One captured user prompt. Immutable after insert except for the single
/// uncommitted → committed transition performed by [`Store::mark_committed`].
#[derive(Debug, Clone)]
pub struct Prompt {
    pub prompt_id: String,
    pub session_id: String,
    pub repo_path: String,
    pub branch_name: String,
    pub cwd: String,
    pub text: String,
    pub timestamp: String,
    pub committed: bool,
    pub commit_hash: Option<String>,
    /// `started_at` of the owning session, joined in by the index queries.
    pub session_started: Option<String>,
}

/// A session annotated with prompt counts, for `recent_sessions`.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session: Session,
    pub total_prompts: i64,
    pub uncommitted_prompts: i64,
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

const PROMPT_COLUMNS: &str = "p.prompt_id, p.session_id, p.repo_path, p.branch_name, p.cwd, \
     p.prompt_text, p.timestamp, p.committed, p.commit_hash, s.started_at";

fn prompt_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Prompt> {
    let committed: i64 = row.get(7)?;
    Ok(Prompt {
        prompt_id: row.get(0)?,
        session_id: row.get(1)?,
        repo_path: row.get(2)?,
        branch_name: row.get(3)?,
        cwd: row.get(4)?,
        text: row.get(5)?,
        timestamp: row.get(6)?,
        committed: committed != 0,
        commit_hash: row.get(8)?,
        session_started: row.get(9)?,
    })
}

fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        session_id: row.get(0)?,
        repo_path: row.get(1)?,
        branch_name: row.get(2)?,
        cwd: row.get(3)?,
        started_at: row.get(4)?,
        last_active: row.get(5)?,
    })
}

/// The shared durable store: sessions, prompts, cross-repo links.
///
/// One SQLite database per user installation. Every caller is a short-lived
/// process, so a `Store` is opened, used, and dropped within one invocation;
/// WAL mode plus a bounded busy timeout keeps near-simultaneous hook
/// processes from corrupting or hanging each other.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (creating if necessary) the store at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 3000;",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    // ---------------------------------------------------------------
    // Event store: writes
    // ---------------------------------------------------------------

    /// Upsert a session row. First non-empty value wins for `repo_path` and
    /// `branch_name`; `last_active` and `cwd` always take the newest value.
    pub fn touch_session(
        &self,
        session_id: &str,
        repo_path: &str,
        branch_name: &str,
        cwd: &str,
    ) -> Result<()> {
        if session_id.is_empty() {
            return Err(StoreError::InvalidInput("empty session_id".into()));
        }
        let now = now_rfc3339();
        self.conn.execute(
            "INSERT INTO sessions (session_id, repo_path, branch_name, cwd, started_at, last_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(session_id) DO UPDATE SET
                 last_active = excluded.last_active,
                 repo_path   = CASE WHEN excluded.repo_path   != '' THEN excluded.repo_path
                                    ELSE sessions.repo_path   END,
                 branch_name = CASE WHEN excluded.branch_name != '' THEN excluded.branch_name
                                    ELSE sessions.branch_name END,
                 cwd         = excluded.cwd",
            params![session_id, repo_path, branch_name, cwd, now],
        )?;
        Ok(())
    }

    /// Append a prompt with `committed = false`. Returns the new prompt id.
    pub fn record_prompt(
        &self,
        session_id: &str,
        text: &str,
        repo_path: &str,
        branch_name: &str,
        cwd: &str,
    ) -> Result<String> {
        if session_id.is_empty() {
            return Err(StoreError::InvalidInput("empty session_id".into()));
        }
        if text.is_empty() {
            return Err(StoreError::InvalidInput("empty prompt text".into()));
        }
        let prompt_id = Uuid::new_v4().to_string();
        let now = now_rfc3339();
        self.conn.execute(
            "INSERT INTO prompts
                 (prompt_id, session_id, repo_path, branch_name, cwd, prompt_text, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![prompt_id, session_id, repo_path, branch_name, cwd, text, now],
        )?;
        Ok(prompt_id)
    }

    /// Record that a prompt touched files in `repo_path`. Idempotent: linking
    /// the same pair twice, or linking a prompt to its own repo, is a no-op.
    pub fn link_cross_repo(
        &self,
        prompt_id: &str,
        repo_path: &str,
        branch_name: &str,
    ) -> Result<()> {
        let own_repo: Option<String> = self
            .conn
            .query_row(
                "SELECT repo_path FROM prompts WHERE prompt_id = ?1",
                params![prompt_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(own_repo) = own_repo else {
            return Err(StoreError::NotFound {
                kind: "prompt",
                id: prompt_id.to_string(),
            });
        };
        if own_repo == repo_path {
            return Ok(());
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO prompt_repos (prompt_id, repo_path, branch_name)
             VALUES (?1, ?2, ?3)",
            params![prompt_id, repo_path, branch_name],
        )?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // State transition
    // ---------------------------------------------------------------

    /// Mark every uncommitted prompt for `repo_path` as committed under
    /// `commit_hash`. A single UPDATE statement, so concurrent readers see
    /// either none or all of the batch transitioned. Returns the count;
    /// zero eligible rows is valid and returns 0.
    pub fn mark_committed(&self, repo_path: &str, commit_hash: &str) -> Result<usize> {
        if commit_hash.is_empty() {
            return Err(StoreError::InvalidInput("empty commit hash".into()));
        }
        let count = self.conn.execute(
            "UPDATE prompts
             SET    committed = 1, commit_hash = ?1
             WHERE  repo_path = ?2 AND committed = 0",
            params![commit_hash, repo_path],
        )?;
        Ok(count)
    }

    // ---------------------------------------------------------------
    // Attribution index: pure reads
    // ---------------------------------------------------------------

    /// All uncommitted prompts for a repo, oldest first.
    pub fn uncommitted_prompts(&self, repo_path: &str) -> Result<Vec<Prompt>> {
        let sql = format!(
            "SELECT {PROMPT_COLUMNS}
             FROM   prompts p
             LEFT JOIN sessions s USING (session_id)
             WHERE  p.repo_path = ?1 AND p.committed = 0
             ORDER  BY p.timestamp, p.rowid"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![repo_path], prompt_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// All prompts for a session, oldest first.
    pub fn prompts_for_session(&self, session_id: &str) -> Result<Vec<Prompt>> {
        let sql = format!(
            "SELECT {PROMPT_COLUMNS}
             FROM   prompts p
             LEFT JOIN sessions s USING (session_id)
             WHERE  p.session_id = ?1
             ORDER  BY p.timestamp, p.rowid"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![session_id], prompt_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Prompts attributed to any of `commit_hashes`, oldest first.
    pub fn prompts_for_commits(&self, commit_hashes: &[String]) -> Result<Vec<Prompt>> {
        if commit_hashes.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; commit_hashes.len()].join(",");
        let sql = format!(
            "SELECT {PROMPT_COLUMNS}
             FROM   prompts p
             LEFT JOIN sessions s USING (session_id)
             WHERE  p.commit_hash IN ({placeholders})
             ORDER  BY p.timestamp, p.rowid"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(commit_hashes.iter()), prompt_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Prompts linked to `repo_path` via a cross-repo link, even though their
    /// own session started elsewhere. Oldest first.
    pub fn cross_repo_prompts(&self, repo_path: &str) -> Result<Vec<Prompt>> {
        let sql = format!(
            "SELECT {PROMPT_COLUMNS}
             FROM   prompt_repos pr
             JOIN   prompts p USING (prompt_id)
             LEFT JOIN sessions s USING (session_id)
             WHERE  pr.repo_path = ?1
             ORDER  BY p.timestamp, p.rowid"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![repo_path], prompt_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Look up a single session by id.
    pub fn session(&self, session_id: &str) -> Result<Session> {
        let row = self
            .conn
            .query_row(
                "SELECT session_id, repo_path, branch_name, cwd, started_at, last_active
                 FROM sessions WHERE session_id = ?1",
                params![session_id],
                session_from_row,
            )
            .optional()?;
        row.ok_or_else(|| StoreError::NotFound {
            kind: "session",
            id: session_id.to_string(),
        })
    }

    /// The id of the most recent prompt for a session, if any.
    pub fn latest_prompt_id(&self, session_id: &str) -> Result<Option<String>> {
        let row = self
            .conn
            .query_row(
                "SELECT prompt_id FROM prompts
                 WHERE session_id = ?1
                 ORDER BY timestamp DESC, rowid DESC
                 LIMIT 1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(row)
    }

    /// Recent sessions for a repo with prompt counts, most recently active
    /// first.
    pub fn recent_sessions(&self, repo_path: &str, limit: usize) -> Result<Vec<SessionSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.session_id, s.repo_path, s.branch_name, s.cwd, s.started_at, s.last_active,
                    COUNT(p.prompt_id) AS total_prompts,
                    COALESCE(SUM(CASE WHEN p.committed = 0 THEN 1 ELSE 0 END), 0)
                        AS uncommitted_prompts
             FROM   sessions s
             LEFT JOIN prompts p USING (session_id)
             WHERE  s.repo_path = ?1
             GROUP  BY s.session_id
             ORDER  BY s.last_active DESC, s.rowid DESC
             LIMIT  ?2",
        )?;
        let rows = stmt
            .query_map(params![repo_path, limit as i64], |row| {
                Ok(SessionSummary {
                    session: session_from_row(row)?,
                    total_prompts: row.get(6)?,
                    uncommitted_prompts: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
