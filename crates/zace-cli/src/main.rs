//! Binary entry point (§1.1, §4.12): parses arguments, wires the
//! configured transport and tool executor plus the LLM-backed classifier
//! adapters into `zace_loop`, and runs one of `run`/`chat`/`session`/
//! `config`/`doctor`.

mod adapters;
mod cli;
mod config_cmds;
mod doctor;
mod session;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use zace_core::cancel::CancellationToken;
use zace_core::journal::SessionJournal;
use zace_core::observer::NullObserver;
use zace_core::types::{AgentState, CompletionPlan};
use zace_exec::{HttpChatClient, ShellToolExecutor};
use zace_loop::{resume_after_approval, run_agent_loop, AgentDeps, AgentResult, RunContext, RuntimeConfig, RunState};

use cli::{Cli, Commands, ConfigCommands, SessionCommands};

const PLANNER_SYSTEM_PROMPT: &str = "You are an autonomous coding agent. Given a task and the tools \
available to you, decide one action at a time: continue with a tool call, ask the user a question, \
report that you're blocked, or declare the task complete with any completion gate commands that \
should be run to validate it.";

fn project_root(cd: &Option<String>) -> Result<PathBuf> {
    match cd {
        Some(path) => std::path::absolute(path).with_context(|| format!("resolving --cd {path}")),
        None => std::env::current_dir().context("determining current directory"),
    }
}

fn new_session_id() -> String {
    ulid::Ulid::new().to_string()
}

/// Print the result of a completed or interrupted run and map the final
/// state to the CLI's exit-code contract (§6: `0` on `completed`, `1`
/// otherwise).
fn report(result: &AgentResult) -> i32 {
    println!("{}", result.message);
    match result.final_state {
        AgentState::Completed => 0,
        _ => {
            eprintln!("final state: {}", result.final_state);
            1
        }
    }
}

fn read_line(prompt: &str) -> Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush().ok();
    let mut line = String::new();
    let bytes = io::stdin().lock().read_line(&mut line).context("reading from stdin")?;
    if bytes == 0 {
        return Ok(None);
    }
    let trimmed = line.trim_end_matches(['\n', '\r']);
    Ok(Some(trimmed.to_string()))
}

async fn run_one_shot(
    project_root: &Path,
    config: &zace_config::ZaceConfig,
    chat: &dyn zace_core::traits::ChatClient,
    mut task: String,
    session_id: Option<String>,
    max_steps: Option<u32>,
) -> Result<AgentResult> {
    if task.trim().is_empty() {
        task = read_line("task> ")?.unwrap_or_default();
    }

    let session_id = session_id.unwrap_or_else(new_session_id);
    let run_id = new_session_id();
    let executor = ShellToolExecutor::default();
    let safety_classifier = adapters::LlmSafetyClassifier { chat };
    let reply_classifier = adapters::LlmReplyClassifier { chat };
    let executor_analysis = adapters::LlmExecutorAnalysisClient { chat };
    let prober = adapters::LlmFileProber { chat };
    let observer = NullObserver;
    let journal = SessionJournal::new(project_root, session_id.clone());

    let deps = AgentDeps {
        chat,
        executor: &executor,
        safety_classifier: &safety_classifier,
        executor_analysis: &executor_analysis,
        prober: &prober,
        reply_classifier: &reply_classifier,
        observer: &observer,
        journal: &journal,
    };

    let mut runtime = RuntimeConfig::from_config(config, project_root);
    if let Some(max_steps) = max_steps {
        runtime.max_steps = max_steps;
    }

    let workspace_root = project_root.to_string_lossy().into_owned();
    let ctx = RunContext {
        project_root,
        session_id: &session_id,
        run_id: &run_id,
        workspace_root: &workspace_root,
        planner_prompt: PLANNER_SYSTEM_PROMPT,
        task_completion_plan: CompletionPlan::default(),
    };

    let mut state = RunState::new(task, runtime.max_steps);
    state.memory = session::load_memory(project_root, &session_id)?;
    let task_text = state.context.task.clone();
    state.memory.push_user(task_text);

    let cancel = CancellationToken::new();
    let mut result = run_agent_loop(&mut state, &runtime, &deps, &ctx, &cancel).await;

    while result.final_state == AgentState::WaitingForUser {
        println!("{}", result.message);
        let Some(reply) = read_line("> ")? else { break };
        if reply.trim().is_empty() {
            continue;
        }
        result = resume_after_approval(&mut state, &runtime, &deps, &ctx, &cancel, &reply).await;
    }

    Ok(result)
}

async fn run_chat(project_root: &Path, config: &zace_config::ZaceConfig, chat: &dyn zace_core::traits::ChatClient, session_id: Option<String>) -> Result<()> {
    let session_id = session_id.unwrap_or_else(new_session_id);
    println!("zace chat — session {session_id}. Empty line to exit.");
    loop {
        let Some(line) = read_line("you> ")? else { break };
        if line.trim().is_empty() {
            break;
        }
        let result = run_one_shot(project_root, config, chat, line, Some(session_id.clone()), None).await?;
        println!("zace> {}", result.message);
    }
    Ok(())
}

fn handle_session(cmd: SessionCommands, project_root: &Path) -> Result<()> {
    match cmd {
        SessionCommands::List => {
            for summary in session::list_sessions(project_root)? {
                let modified = summary.last_modified.map(|t| t.to_rfc3339()).unwrap_or_else(|| "unknown".into());
                println!("{}\t{} message(s)\t{}", summary.session_id, summary.message_count, modified);
            }
        }
        SessionCommands::Show { session } => {
            let journal = SessionJournal::new(project_root, &session);
            for entry in journal.read_all()? {
                println!("{}", serde_json::to_string(&entry)?);
            }
        }
        SessionCommands::Resume { session } => {
            let memory = session::load_memory(project_root, &session)?;
            for message in memory.messages() {
                println!("{}: {}", message.role, message.content);
            }
        }
        SessionCommands::Clean { days, dry_run } => {
            let removed = session::clean_sessions(project_root, days, dry_run)?;
            let verb = if dry_run { "would remove" } else { "removed" };
            println!("{verb} {} session(s) older than {days} day(s)", removed.len());
        }
    }
    Ok(())
}

fn handle_config(cmd: ConfigCommands, project_root: &Path) -> Result<()> {
    match cmd {
        ConfigCommands::Show => config_cmds::handle_show(project_root),
        ConfigCommands::Validate => config_cmds::handle_validate(project_root),
        ConfigCommands::Init => config_cmds::handle_init(project_root),
    }
}

/// Warns, without failing, when `.zace/config.toml` predates the current
/// schema shape (§1.2 version self-check). The config format hasn't had
/// a breaking change yet, so this is always a no-op today; it exists as
/// the hook a future migration would extend.
fn warn_if_config_outdated(_config: &zace_config::ZaceConfig) {}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let project_root = project_root(&cli.cd)?;
    let config = zace_config::load(&project_root).context("loading configuration")?;
    warn_if_config_outdated(&config);

    match cli.command {
        Commands::Run { task, session, max_steps, stream } => {
            let mut config = config;
            config.stream = stream || config.stream;
            let chat = HttpChatClient::new(config.llm.base_url.clone(), config.llm.api_key.clone(), config.llm.model.clone());
            let result = run_one_shot(&project_root, &config, &chat, task.unwrap_or_default(), session, max_steps).await?;
            std::process::exit(report(&result));
        }
        Commands::Chat { session } => {
            let chat = HttpChatClient::new(config.llm.base_url.clone(), config.llm.api_key.clone(), config.llm.model.clone());
            run_chat(&project_root, &config, &chat, session).await?;
        }
        Commands::Session { cmd } => handle_session(cmd, &project_root)?,
        Commands::Config { cmd } => handle_config(cmd, &project_root)?,
        Commands::Doctor => {
            let chat = HttpChatClient::new(config.llm.base_url.clone(), config.llm.api_key.clone(), config.llm.model.clone());
            doctor::run(&project_root, &config, &chat).await?;
        }
    }

    Ok(())
}
