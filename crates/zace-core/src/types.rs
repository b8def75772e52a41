//! Core data model: the entities a single agent run is built from.
//!
//! Mirrors the value types passed between the planner parser, the approval
//! subsystem, the guardrails, and the run loop scheduler. Everything here is
//! plain data — no behavior beyond conversions and small invariant helpers.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of a single [`AgentStep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Planning,
    Executing,
    Completed,
    Blocked,
    Error,
    WaitingForUser,
    Interrupted,
}

impl AgentState {
    /// Terminal states end the current `run_agent_loop` invocation.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AgentState::Completed
                | AgentState::Blocked
                | AgentState::Error
                | AgentState::WaitingForUser
                | AgentState::Interrupted
        )
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentState::Planning => "planning",
            AgentState::Executing => "executing",
            AgentState::Completed => "completed",
            AgentState::Blocked => "blocked",
            AgentState::Error => "error",
            AgentState::WaitingForUser => "waiting_for_user",
            AgentState::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

impl FromStr for AgentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planning" => Ok(AgentState::Planning),
            "executing" => Ok(AgentState::Executing),
            "completed" => Ok(AgentState::Completed),
            "blocked" => Ok(AgentState::Blocked),
            "error" => Ok(AgentState::Error),
            "waiting_for_user" => Ok(AgentState::WaitingForUser),
            "interrupted" => Ok(AgentState::Interrupted),
            other => Err(format!("unknown agent state '{other}'")),
        }
    }
}

/// Observable progress of a tool call, derived from its artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressSignal {
    FilesChanged,
    SuccessWithoutChanges,
    None,
}

/// LSP status reported by a tool artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LspStatus {
    Diagnostics,
    NoErrors,
    NoActiveServer,
    Failed,
    NoApplicableFiles,
    NoChangedFiles,
    Disabled,
}

/// Lifecycle signal a tool executor can attach to a result to request
/// cancellation of the run (distinct from a normal failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    #[default]
    None,
    Abort,
}

/// Retry classification produced by the retry classifier (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryCategory {
    Transient,
    Permanent,
    Unknown,
}

/// Conversation role for a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        f.write_str(s)
    }
}

/// How a planner reply was turned into a [`PlanResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    SchemaTransport,
    JsonStrict,
    RepairJson,
    Legacy,
    Failed,
}

/// What the planner wants to do this step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    Continue,
    Complete,
    Blocked,
    AskUser,
}

/// Where a batch of completion gates came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionSource {
    Task,
    Planner,
    AutoDiscovered,
    Merged,
}

/// Approval decision stored in an [`ApprovalRule`] or returned by a reply
/// classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Allow,
    Deny,
}

/// Scope an [`ApprovalRule`] applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalScope {
    Session,
    Workspace,
}

/// Status of a [`PendingApprovalAction`] ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Open,
    Resolved,
}

/// State of the LSP bootstrap state machine (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LspBootstrapStateKind {
    Idle,
    Required,
    Probing,
    Ready,
    Failed,
}

/// A tool invocation requested by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: HashMap<String, Value>,
}

impl ToolCall {
    pub fn string_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

/// Artifact fields a [`ToolResult`] may carry; all optional, matching the
/// "recognized but additional keys tolerated" contract of the wire format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolArtifacts {
    #[serde(default)]
    pub changed_files: Vec<String>,
    #[serde(default)]
    pub progress_signal: Option<ProgressSignal>,
    #[serde(default)]
    pub lsp_status: Option<LspStatus>,
    #[serde(default)]
    pub lsp_status_reason: Option<String>,
    #[serde(default)]
    pub lsp_error_count: Option<u32>,
    #[serde(default)]
    pub lsp_diagnostics_included: Option<bool>,
    #[serde(default)]
    pub lsp_diagnostics_files: Vec<String>,
    #[serde(default)]
    pub lifecycle_event: LifecycleEvent,
    #[serde(default)]
    pub aborted: bool,
    #[serde(default)]
    pub retry_category: Option<RetryCategory>,
    #[serde(default)]
    pub write_regression_detected: bool,
    #[serde(default)]
    pub write_regression_reason: Option<String>,
}

impl ToolArtifacts {
    pub fn has_changed_files(&self) -> bool {
        !self.changed_files.is_empty()
    }
}

/// Outcome of executing a [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub artifacts: Option<ToolArtifacts>,
}

impl ToolResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(message.into()),
            artifacts: None,
        }
    }
}

/// A single conversation message in the loop's memory / planner prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Usage accounting reported alongside a planner reply, if the transport
/// provides it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Parsed output of the planner (§4.2).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    pub action: Option<PlanAction>,
    pub reasoning: String,
    #[serde(default)]
    pub user_message: Option<String>,
    #[serde(default)]
    pub tool_call: Option<ToolCall>,
    #[serde(default)]
    pub completion_gate_commands: Vec<String>,
    #[serde(default)]
    pub completion_gates_declared_none: bool,
    pub parse_mode: Option<ParseMode>,
    #[serde(default)]
    pub parse_attempts: u32,
    #[serde(default)]
    pub raw_invalid_count: u32,
    #[serde(default)]
    pub schema_unsupported_reason: Option<String>,
    #[serde(default)]
    pub invalid_output_artifact_path: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// A single named command a `COMPLETE` requires to pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionGate {
    pub label: String,
    pub command: String,
}

impl CompletionGate {
    pub fn planner(index: usize, command: impl Into<String>) -> Self {
        Self {
            label: format!("planner:{index}"),
            command: command.into(),
        }
    }

    pub fn task(index: usize, command: impl Into<String>) -> Self {
        Self {
            label: format!("task:{index}"),
            command: command.into(),
        }
    }

    pub fn auto(kind: &str, command: impl Into<String>) -> Self {
        Self {
            label: format!("auto:{kind}"),
            command: command.into(),
        }
    }
}

/// The full set of gates resolved for a completion attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionPlan {
    pub gates: Vec<CompletionGate>,
    pub source: Option<CompletionSource>,
}

impl CompletionPlan {
    /// Append `gate` preserving insertion order, skipping exact command
    /// duplicates already present.
    pub fn push_dedup(&mut self, gate: CompletionGate) {
        if self.gates.iter().any(|g| g.command == gate.command) {
            return;
        }
        self.gates.push(gate);
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}

/// Context payload recorded alongside a pending approval action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingApprovalContext {
    pub command: String,
    pub command_signature: String,
    pub reason: String,
    #[serde(default)]
    pub working_directory: Option<String>,
    pub pending_id: String,
}

/// An append-only ledger entry in the approval pending-action log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingApprovalAction {
    pub session_id: String,
    pub run_id: String,
    pub kind: String,
    pub status: ApprovalStatus,
    pub prompt: String,
    pub context: PendingApprovalContext,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// A persisted allow/deny decision for future commands matching `pattern`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRule {
    pub pattern: String,
    pub decision: ApprovalDecision,
    pub scope: ApprovalScope,
    #[serde(default)]
    pub session_id: Option<String>,
    pub workspace_root: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Mutable state of the LSP bootstrap state machine, owned by the run loop
/// for the lifetime of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LspBootstrapState {
    pub state: LspBootstrapStateKind,
    #[serde(default)]
    pub pending_changed_files: HashSet<String>,
    #[serde(default)]
    pub last_failure_reason: Option<String>,
    #[serde(default)]
    pub provision_attempts: u32,
    #[serde(default)]
    pub attempted_commands: Vec<String>,
}

impl Default for LspBootstrapState {
    fn default() -> Self {
        Self {
            state: LspBootstrapStateKind::Idle,
            pending_changed_files: HashSet::new(),
            last_failure_reason: None,
            provision_attempts: 0,
            attempted_commands: Vec::new(),
        }
    }
}

impl LspBootstrapState {
    /// Record a command preview, capped to the five most recent entries at
    /// 220 chars each (§4.4).
    pub fn push_attempted_command(&mut self, command: &str) {
        let preview: String = command.chars().take(220).collect();
        self.attempted_commands.push(preview);
        if self.attempted_commands.len() > 5 {
            let overflow = self.attempted_commands.len() - 5;
            self.attempted_commands.drain(0..overflow);
        }
    }
}

/// Registry entry for a discovered or marker-declared helper script
/// (§4.10).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptMetadata {
    pub id: String,
    pub path: String,
    pub purpose: String,
    pub last_touched_step: u32,
    pub times_used: u32,
}

/// One recorded step in an [`AgentContext`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStep {
    pub step: u32,
    pub state: AgentState,
    pub reasoning: String,
    #[serde(default)]
    pub tool_call: Option<ToolCall>,
    #[serde(default)]
    pub tool_result: Option<ToolResult>,
}

impl AgentStep {
    pub fn new(step: u32, state: AgentState, reasoning: impl Into<String>) -> Self {
        Self {
            step,
            state,
            reasoning: reasoning.into(),
            tool_call: None,
            tool_result: None,
        }
    }
}

/// Immutable-by-replacement run context (§3). Transition helpers return
/// `&mut` into the owned instance rather than a new value — the run loop
/// holds exactly one `AgentContext` per run and overwrites it step by step,
/// which is behaviorally equivalent to value replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContext {
    pub task: String,
    pub current_step: u32,
    pub max_steps: u32,
    pub steps: Vec<AgentStep>,
    #[serde(default)]
    pub script_catalog: HashMap<String, ScriptMetadata>,
    #[serde(default)]
    pub file_summaries: HashMap<String, String>,
}

impl AgentContext {
    pub fn new(task: impl Into<String>, max_steps: u32) -> Self {
        Self {
            task: task.into(),
            current_step: 0,
            max_steps,
            steps: Vec::new(),
            script_catalog: HashMap::new(),
            file_summaries: HashMap::new(),
        }
    }

    /// Append a new step, advancing `current_step`. Invariant:
    /// `steps.len() == current_step` after this call.
    pub fn push_step(&mut self, state: AgentState, reasoning: impl Into<String>) -> &mut AgentStep {
        let step = AgentStep::new(self.current_step, state, reasoning);
        self.steps.push(step);
        self.current_step += 1;
        self.steps.last_mut().expect("just pushed")
    }

    /// Rewrite the state of the most recently pushed step in place. This is
    /// the chosen resolution of the `transitionState` open question (see
    /// DESIGN.md): no new step record is appended.
    pub fn transition_last(&mut self, state: AgentState) {
        if let Some(last) = self.steps.last_mut() {
            last.state = state;
        }
    }

    pub fn last_step(&self) -> Option<&AgentStep> {
        self.steps.last()
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_step >= self.max_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_state_round_trips_through_display_and_fromstr() {
        for s in [
            AgentState::Planning,
            AgentState::Executing,
            AgentState::Completed,
            AgentState::Blocked,
            AgentState::Error,
            AgentState::WaitingForUser,
            AgentState::Interrupted,
        ] {
            let text = s.to_string();
            assert_eq!(AgentState::from_str(&text).unwrap(), s);
        }
    }

    #[test]
    fn agent_state_terminal_classification() {
        assert!(!AgentState::Planning.is_terminal());
        assert!(!AgentState::Executing.is_terminal());
        assert!(AgentState::Completed.is_terminal());
        assert!(AgentState::Blocked.is_terminal());
        assert!(AgentState::Error.is_terminal());
        assert!(AgentState::WaitingForUser.is_terminal());
        assert!(AgentState::Interrupted.is_terminal());
    }

    #[test]
    fn agent_state_from_str_rejects_unknown() {
        assert!(AgentState::from_str("bogus").is_err());
    }

    #[test]
    fn agent_context_push_step_keeps_len_invariant() {
        let mut ctx = AgentContext::new("do the thing", 5);
        ctx.push_step(AgentState::Planning, "thinking");
        ctx.push_step(AgentState::Executing, "running");
        assert_eq!(ctx.steps.len(), ctx.current_step as usize);
        assert_eq!(ctx.current_step, 2);
    }

    #[test]
    fn agent_context_transition_last_mutates_without_appending() {
        let mut ctx = AgentContext::new("task", 3);
        ctx.push_step(AgentState::Planning, "thinking");
        ctx.transition_last(AgentState::Executing);
        assert_eq!(ctx.steps.len(), 1);
        assert_eq!(ctx.last_step().unwrap().state, AgentState::Executing);
    }

    #[test]
    fn agent_context_is_exhausted_at_max_steps() {
        let mut ctx = AgentContext::new("task", 1);
        assert!(!ctx.is_exhausted());
        ctx.push_step(AgentState::Planning, "x");
        assert!(ctx.is_exhausted());
    }

    #[test]
    fn completion_plan_dedups_by_exact_command() {
        let mut plan = CompletionPlan::default();
        plan.push_dedup(CompletionGate::planner(0, "npm test"));
        plan.push_dedup(CompletionGate::task(0, "npm test"));
        plan.push_dedup(CompletionGate::auto("lint", "npm run lint"));
        assert_eq!(plan.gates.len(), 2);
        assert_eq!(plan.gates[0].label, "planner:0");
    }

    #[test]
    fn lsp_bootstrap_state_caps_attempted_commands_at_five() {
        let mut state = LspBootstrapState::default();
        for i in 0..8 {
            state.push_attempted_command(&format!("cmd {i}"));
        }
        assert_eq!(state.attempted_commands.len(), 5);
        assert_eq!(state.attempted_commands[0], "cmd 3");
        assert_eq!(state.attempted_commands[4], "cmd 7");
    }

    #[test]
    fn lsp_bootstrap_state_truncates_long_command_preview() {
        let mut state = LspBootstrapState::default();
        let long = "x".repeat(500);
        state.push_attempted_command(&long);
        assert_eq!(state.attempted_commands[0].len(), 220);
    }

    #[test]
    fn tool_call_string_arg_reads_json_value() {
        let mut args = HashMap::new();
        args.insert("command".to_string(), Value::String("ls -la".into()));
        let call = ToolCall {
            name: "execute_command".into(),
            arguments: args,
        };
        assert_eq!(call.string_arg("command"), Some("ls -la"));
        assert_eq!(call.string_arg("missing"), None);
    }

    #[test]
    fn tool_result_failure_has_no_artifacts() {
        let result = ToolResult::failure("denied");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("denied"));
        assert!(result.artifacts.is_none());
    }
}
