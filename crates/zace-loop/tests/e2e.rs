//! End-to-end scheduler scenarios (§8): fakes for every injected trait
//! drive `run_agent_loop` through a couple of the literal scenarios the
//! invariants section describes, without a real LLM or shell.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tempfile::tempdir;

use zace_approval::{ReplyClassifier, ReplyIntent, SafetyClassification, SafetyClassifier, SafetyContext};
use zace_config::{CompletionValidationMode, ZaceConfig};
use zace_core::cancel::CancellationToken;
use zace_core::journal::SessionJournal;
use zace_core::observer::NullObserver;
use zace_core::traits::{ChatClient, ChatError, ChatRequest, ChatReply, ToolExecutor};
use zace_core::types::{AgentState, CompletionPlan, ToolCall, ToolResult};
use zace_lsp::FileProber;
use zace_loop::{run_agent_loop, AgentDeps, RunContext, RuntimeConfig, RunState};
use zace_retry::{ExecutorAnalysis, ExecutorAnalysisClient};

/// Replays a fixed sequence of chat replies, one per call; panics if asked
/// for more than were scripted.
struct ScriptedChat {
    replies: Mutex<Vec<ChatReply>>,
}

impl ScriptedChat {
    fn new(replies: Vec<ChatReply>) -> Self {
        let mut replies = replies;
        replies.reverse();
        Self { replies: Mutex::new(replies) }
    }
}

#[async_trait]
impl ChatClient for ScriptedChat {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatReply, ChatError> {
        self.replies.lock().unwrap().pop().ok_or_else(|| ChatError {
            error_class: zace_core::traits::ChatErrorClass::Other,
            provider_message: Some("no more scripted replies".into()),
            provider_code: None,
            status_code: None,
            response_format_unsupported: false,
        })
    }
}

/// Never called in these scenarios; panics if it is, so a regression that
/// starts invoking the transport unexpectedly fails loudly.
struct UnreachableChat;

#[async_trait]
impl ChatClient for UnreachableChat {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatReply, ChatError> {
        panic!("chat transport should not be called in this scenario");
    }
}

/// Succeeds every tool call with empty output — enough to get past startup
/// script discovery without touching the filesystem.
struct NoopExecutor;

#[async_trait]
impl ToolExecutor for NoopExecutor {
    async fn execute(&self, _call: &ToolCall, _cancel: &CancellationToken) -> ToolResult {
        ToolResult { success: true, output: String::new(), error: None, artifacts: None }
    }
}

struct UnreachableExecutor;

#[async_trait]
impl ToolExecutor for UnreachableExecutor {
    async fn execute(&self, _call: &ToolCall, _cancel: &CancellationToken) -> ToolResult {
        panic!("tool executor should not be called in this scenario");
    }
}

struct NeverDestructive;

#[async_trait]
impl SafetyClassifier for NeverDestructive {
    async fn classify(&self, _command: &str, _context: &SafetyContext) -> Result<SafetyClassification, String> {
        Ok(SafetyClassification { destructive: false, reason: None })
    }
}

struct AlwaysUnclear;

#[async_trait]
impl ReplyClassifier for AlwaysUnclear {
    async fn classify(&self, _reply_text: &str) -> Result<ReplyIntent, String> {
        Ok(ReplyIntent::Unclear)
    }
}

struct NoAnalysis;

#[async_trait]
impl ExecutorAnalysisClient for NoAnalysis {
    async fn analyze(&self, _command: &str, _output: &str, _error: Option<&str>) -> ExecutorAnalysis {
        ExecutorAnalysis { analysis: String::new(), should_retry: false, retry_delay_ms: 0 }
    }
}

struct NoChangedFiles;

#[async_trait]
impl FileProber for NoChangedFiles {
    async fn probe_files(&self, _changed_files: &[String]) -> Result<zace_core::types::LspStatus, String> {
        Ok(zace_core::types::LspStatus::NoChangedFiles)
    }
}

fn scripted_complete_reply(gate_commands: &[&str], declared_none: bool) -> ChatReply {
    ChatReply {
        content: String::new(),
        usage: None,
        normalized: Some(serde_json::json!({
            "action": "complete",
            "reasoning": "done",
            "completionGateCommands": gate_commands,
            "completionGatesDeclaredNone": declared_none,
        })),
    }
}

#[tokio::test]
async fn cancellation_before_startup_interrupts_without_touching_transport_or_executor() {
    let dir = tempdir().unwrap();
    let project_root = dir.path();
    let config = ZaceConfig::default();
    let runtime = RuntimeConfig::from_config(&config, project_root);

    let chat = UnreachableChat;
    let executor = UnreachableExecutor;
    let safety_classifier = NeverDestructive;
    let executor_analysis = NoAnalysis;
    let prober = NoChangedFiles;
    let reply_classifier = AlwaysUnclear;
    let observer = NullObserver;
    let journal = SessionJournal::new(project_root, "session-cancel");

    let deps = AgentDeps {
        chat: &chat,
        executor: &executor,
        safety_classifier: &safety_classifier,
        executor_analysis: &executor_analysis,
        prober: &prober,
        reply_classifier: &reply_classifier,
        observer: &observer,
        journal: &journal,
    };

    let workspace_root = project_root.to_string_lossy().into_owned();
    let ctx = RunContext {
        project_root,
        session_id: "session-cancel",
        run_id: "run-cancel",
        workspace_root: &workspace_root,
        planner_prompt: "plan",
        task_completion_plan: CompletionPlan::default(),
    };

    let mut state = RunState::new("do the task", runtime.max_steps);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = run_agent_loop(&mut state, &runtime, &deps, &ctx, &cancel).await;

    assert_eq!(result.final_state, AgentState::Interrupted);
    assert!(result.message.contains("cancelled before the run could start"));

    let entries = journal.read_all().unwrap();
    let event_names: Vec<Value> = entries.iter().filter_map(|e| e.payload.get("event").cloned()).collect();
    assert_eq!(event_names.iter().filter(|e| *e == "run_interrupted").count(), 1);
    assert_eq!(event_names.iter().filter(|e| *e == "final_state_set").count(), 1);
}

#[tokio::test]
async fn strict_mode_blocks_masked_completion_gates() {
    let dir = tempdir().unwrap();
    let project_root = dir.path();
    let mut config = ZaceConfig::default();
    config.completion.completion_validation_mode = CompletionValidationMode::Strict;
    let runtime = RuntimeConfig::from_config(&config, project_root);
    assert!(runtime.strict_mode);
    assert!(runtime.gate_disallow_masking);

    let chat = ScriptedChat::new(vec![scripted_complete_reply(&["echo ok || true"], false)]);
    let executor = NoopExecutor;
    let safety_classifier = NeverDestructive;
    let executor_analysis = NoAnalysis;
    let prober = NoChangedFiles;
    let reply_classifier = AlwaysUnclear;
    let observer = NullObserver;
    let journal = SessionJournal::new(project_root, "session-mask");

    let deps = AgentDeps {
        chat: &chat,
        executor: &executor,
        safety_classifier: &safety_classifier,
        executor_analysis: &executor_analysis,
        prober: &prober,
        reply_classifier: &reply_classifier,
        observer: &observer,
        journal: &journal,
    };

    let workspace_root = project_root.to_string_lossy().into_owned();
    let ctx = RunContext {
        project_root,
        session_id: "session-mask",
        run_id: "run-mask",
        workspace_root: &workspace_root,
        planner_prompt: "plan",
        task_completion_plan: CompletionPlan::default(),
    };

    let mut state = RunState::new("ship the feature", runtime.max_steps);
    let cancel = CancellationToken::new();

    let result = run_agent_loop(&mut state, &runtime, &deps, &ctx, &cancel).await;

    assert_eq!(result.final_state, AgentState::Blocked);
    assert!(result.message.contains("masked"), "message was: {}", result.message);
}
