//! Completion-gate sequence reached when the planner returns `complete`
//! (§4.5 + §4.7 step 5): static policy checks, LSP bootstrap checks,
//! freshness, and sequential gate execution.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use zace_core::cancel::CancellationToken;
use zace_core::types::{AgentState, PlanResult};

use crate::events::EventSink;
use crate::runtime_config::RuntimeConfig;
use crate::state::RunState;
use crate::{finish, AgentDeps, AgentResult, RunContext};

pub enum CompleteOutcome {
    Completed(AgentResult),
    Blocked(String),
}

/// Wraps the same destructive-command + stored-rule check used for
/// user-initiated commands so gate commands cannot bypass approval.
struct LoopGateApproval<'a> {
    runtime: &'a RuntimeConfig,
    deps: &'a AgentDeps<'a>,
    ctx: &'a RunContext<'a>,
}

#[async_trait]
impl<'a> zace_gates::GateApproval for LoopGateApproval<'a> {
    async fn allows(&self, command: &str, cwd: &Path) -> bool {
        if zace_approval::get_destructive_command_reason(command, cwd, &self.runtime.destructive, self.deps.safety_classifier).await.is_none() {
            return true;
        }
        let signature = zace_core::signature::build_tool_call_signature(
            "execute_command",
            &serde_json::json!({"command": command, "cwd": cwd.to_string_lossy()}),
            self.ctx.project_root,
        );
        let rules = zace_approval::load_approval_rules(&self.runtime.approval_rules_path).unwrap_or_default();
        matches!(
            zace_approval::find_approval_rule_decision(&rules, &signature, self.ctx.workspace_root, self.ctx.session_id),
            Some(zace_core::types::ApprovalDecision::Allow)
        )
    }
}

pub async fn handle_complete(
    state: &mut RunState,
    runtime: &RuntimeConfig,
    deps: &AgentDeps<'_>,
    ctx: &RunContext<'_>,
    cancel: &CancellationToken,
    plan: &PlanResult,
    events: &EventSink<'_>,
    step: u32,
) -> CompleteOutcome {
    let cwd = state
        .last_write_working_directory
        .clone()
        .or_else(|| state.last_execution_working_directory.clone())
        .map(PathBuf::from)
        .unwrap_or_else(|| ctx.project_root.to_path_buf());

    let gate_plan = zace_gates::build_completion_plan(zace_gates::GateBuildInput {
        task_plan: ctx.task_completion_plan.clone(),
        planner_gate_commands: &plan.completion_gate_commands,
        planner_declared_none: plan.completion_gates_declared_none,
        working_directory: &cwd,
        strict_mode: runtime.strict_mode,
        require_discovered_gates: runtime.require_discovered_gates,
        last_write_step: state.last_write_step,
    });

    if let Some(reason) = zace_gates::check_static_policies(&gate_plan, runtime.strict_mode, runtime.gate_disallow_masking, plan.completion_gates_declared_none, state.last_write_step) {
        return CompleteOutcome::Blocked(reason.to_string());
    }

    if zace_lsp::should_wait_for_user(&state.lsp, &runtime.lsp) {
        let message = if state.lsp.attempted_commands.is_empty() {
            "LSP bootstrap needs attention before I can complete — how would you like me to proceed?".to_string()
        } else {
            format!(
                "LSP bootstrap needs attention before I can complete — recent attempts: {}",
                state.lsp.attempted_commands.join("; ")
            )
        };
        state.context.push_step(AgentState::WaitingForUser, "lsp bootstrap blocked completion");
        return CompleteOutcome::Completed(finish(state, events, AgentState::WaitingForUser, message));
    }
    if zace_lsp::blocks_completion(&state.lsp, &runtime.lsp) {
        return CompleteOutcome::Blocked("LSP bootstrap is not ready".into());
    }

    if !zace_gates::is_fresh(runtime.strict_mode, state.last_write_step, state.last_successful_validation_step) {
        return CompleteOutcome::Blocked(zace_gates::GateBlockReason::NotFresh.to_string());
    }

    let approval = LoopGateApproval { runtime, deps, ctx };
    match zace_gates::run_gates(&gate_plan, &cwd, deps.executor, &approval, cancel).await {
        Ok(()) => {
            if !gate_plan.gates.is_empty() {
                state.last_successful_validation_step = Some(step);
            }
            state.context.transition_last(AgentState::Completed);
            let message = plan.user_message.clone().unwrap_or_else(|| plan.reasoning.clone());
            CompleteOutcome::Completed(finish(state, events, AgentState::Completed, message))
        }
        Err(reason) => CompleteOutcome::Blocked(reason.to_string()),
    }
}
