//! Clap-derived command surface (§4.12): `run`, `chat`, `session`,
//! `config`, `doctor`.

use clap::{Parser, Subcommand};

/// Build version string combining Cargo.toml version and (if set at
/// build time) a git describe string.
fn build_version() -> &'static str {
    static VERSION: std::sync::OnceLock<String> = std::sync::OnceLock::new();
    VERSION.get_or_init(|| env!("CARGO_PKG_VERSION").to_string())
}

#[derive(Parser)]
#[command(name = "zace", version = build_version())]
#[command(about = "Autonomous coding-agent runtime")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project root (defaults to the current directory).
    #[arg(long, global = true)]
    pub cd: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single task to completion, blocked, or waiting-for-user.
    Run {
        /// Task prompt; reads from stdin if omitted.
        task: Option<String>,

        /// Resume an existing session's memory by id instead of starting fresh.
        #[arg(short, long)]
        session: Option<String>,

        /// Override the configured maximum step count for this run.
        #[arg(long)]
        max_steps: Option<u32>,

        /// Stream planner/executor tokens to stderr as they arrive.
        #[arg(long)]
        stream: bool,
    },

    /// Interactive REPL: each line becomes a task resuming the same
    /// session's memory.
    Chat {
        /// Resume an existing session's memory by id instead of starting fresh.
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Inspect and manage session journals.
    Session {
        #[command(subcommand)]
        cmd: SessionCommands,
    },

    /// Inspect and bootstrap `.zace/config.toml`.
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },

    /// Environment preflight: LLM reachability, `.zace/` writability,
    /// rule/registry file parseability.
    Doctor,
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// List known sessions under `.zace/sessions/`.
    List,
    /// Print a session's journal entries.
    Show { session: String },
    /// Print the reconstructed conversation memory for a session
    /// (what `chat`/`run --session` would resume from).
    Resume { session: String },
    /// Remove session journals older than `days` days.
    Clean {
        #[arg(long, default_value_t = 30)]
        days: u64,
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration (file merged over defaults).
    Show,
    /// Parse `.zace/config.toml` and validate field constraints.
    Validate,
    /// Write a default `.zace/config.toml` if one doesn't already exist.
    Init,
}
