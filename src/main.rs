mod commands;
mod config;
mod format;
mod gitinfo;
mod hooks;
mod store;
mod types;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(
    name = "promptrace",
    version,
    about = "Attributes AI coding prompts to the git commits and PRs they produce"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Claude Code hook entry point: reads one event JSON from stdin
    Hook,
    /// Git prepare-commit-msg hook: append the provenance block to the message
    PrepareCommitMsg {
        commit_msg_file: PathBuf,
        repo: Option<PathBuf>,
    },
    /// Git post-commit hook: mark uncommitted prompts as committed
    PostCommit {
        repo: Option<PathBuf>,
        commit_hash: Option<String>,
    },
    /// Print a PR body with provenance for the current branch
    PrBody {
        /// Base branch to diff against
        #[arg(long, default_value = "main")]
        base: String,
        /// Repo path (auto-detected from cwd if omitted)
        #[arg(long)]
        repo: Option<PathBuf>,
    },
    /// List uncommitted prompts and git changes for a repo
    Uncommitted {
        #[arg(long)]
        repo: Option<PathBuf>,
    },
    /// List recent sessions for a repo
    Sessions {
        #[arg(long)]
        repo: Option<PathBuf>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Summarize one session (most recent for the repo if no id given)
    SessionSummary {
        #[arg(long)]
        repo: Option<PathBuf>,
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Render a markdown provenance block for a commit message
    CommitContext {
        #[arg(long)]
        repo: Option<PathBuf>,
        #[arg(long)]
        message: Option<String>,
    },
    /// Get or set configuration
    Config {
        #[arg(long)]
        verbose_threshold: Option<usize>,
    },
}

fn run(command: &Command) -> Result<()> {
    match command {
        Command::Hook => commands::hook(),
        Command::PrepareCommitMsg {
            commit_msg_file,
            repo,
        } => commands::prepare_commit_msg(commit_msg_file, repo.as_deref()),
        Command::PostCommit { repo, commit_hash } => {
            commands::post_commit(repo.as_deref(), commit_hash.as_deref())
        }
        Command::PrBody { base, repo } => commands::pr_body(base, repo.as_deref()),
        Command::Uncommitted { repo } => commands::uncommitted(repo.as_deref()),
        Command::Sessions { repo, limit } => commands::sessions(repo.as_deref(), *limit),
        Command::SessionSummary { repo, session_id } => {
            commands::session_summary(repo.as_deref(), session_id.as_deref())
        }
        Command::CommitContext { repo, message } => {
            commands::commit_context(repo.as_deref(), message.as_deref())
        }
        Command::Config { verbose_threshold } => commands::configure(*verbose_threshold),
    }
}

fn main() {
    let cli = Cli::parse();

    // Hook-invoked commands run inline with a session or a git operation and
    // must never block either: log the error and exit 0.
    let fail_open = matches!(
        cli.command,
        Command::Hook | Command::PrepareCommitMsg { .. } | Command::PostCommit { .. }
    );

    if let Err(err) = run(&cli.command) {
        eprintln!("promptrace: {err:#}");
        if !fail_open {
            process::exit(2);
        }
    }
}
