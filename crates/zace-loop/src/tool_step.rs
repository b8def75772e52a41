//! Tool-call execution pipeline (§4.7 "Tool execution"): doom-loop guard,
//! approval resolution, the retry-with-analysis attempt loop, artifact
//! processing (LSP bootstrap, write regression, script markers), and the
//! post-execution guardrail checks.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::json;

use zace_core::cancel::CancellationToken;
use zace_core::observer::RunPhase;
use zace_core::signature::{build_loop_signature, build_tool_call_signature, canonicalize_execute_command};
use zace_core::types::{AgentState, ApprovalDecision, LifecycleEvent, ToolCall, ToolResult};
use zace_retry::{bounded_retry_delay_ms, classify_tool_failure, should_invoke_analysis, should_retry};

use crate::events::EventSink;
use crate::runtime_config::RuntimeConfig;
use crate::state::RunState;
use crate::{finish, tool_call_arguments_value, AgentDeps, AgentResult, RunContext};

pub enum ToolStepOutcome {
    Continue,
    Terminal(AgentResult),
}

enum ApprovalOutcome {
    Allow,
    Deny(String),
    RequestUser { pending_id: String, prompt: String },
}

fn validation_command(command: &str) -> bool {
    let lowered = command.to_lowercase();
    const PATTERNS: &[&str] = &["test", "lint", "clippy", "pytest", "jest", "mocha", "cargo check", "cargo build", "npm run build", "make check", "go vet"];
    PATTERNS.iter().any(|pattern| lowered.contains(pattern))
}

fn tool_memory_digest(call: &ToolCall, result: &ToolResult) -> String {
    let mut sections = vec![format!("[execution] tool={} success={}", call.name, result.success)];
    if let Some(artifacts) = &result.artifacts {
        sections.push(format!(
            "[artifacts] changed_files={} progress_signal={:?} lsp_status_reason={}",
            artifacts.changed_files.len(),
            artifacts.progress_signal,
            artifacts.lsp_status_reason.clone().unwrap_or_default(),
        ));
    }
    let stdout_preview: String = result.output.chars().take(400).collect();
    if !stdout_preview.is_empty() {
        sections.push(format!("[stdout_preview] {stdout_preview}"));
    }
    if let Some(err) = &result.error {
        let err_preview: String = err.chars().take(400).collect();
        sections.push(format!("[stderr_preview] {err_preview}"));
    }
    sections.join("\n")
}

async fn resolve_tool_approval(
    call: &ToolCall,
    cwd: &Path,
    planned_signature: &str,
    runtime: &RuntimeConfig,
    deps: &AgentDeps<'_>,
    ctx: &RunContext<'_>,
    state: &RunState,
) -> ApprovalOutcome {
    if call.name != "execute_command" {
        return ApprovalOutcome::Allow;
    }
    let Some(command) = call.string_arg("command") else {
        return ApprovalOutcome::Allow;
    };

    let Some(reason) = zace_approval::get_destructive_command_reason(command, cwd, &runtime.destructive, deps.safety_classifier).await else {
        return ApprovalOutcome::Allow;
    };

    if state.once_approved_signatures.contains(planned_signature) {
        return ApprovalOutcome::Allow;
    }

    let rules = zace_approval::load_approval_rules(&runtime.approval_rules_path).unwrap_or_default();
    if let Some(decision) = zace_approval::find_approval_rule_decision(&rules, planned_signature, ctx.workspace_root, ctx.session_id) {
        return match decision {
            ApprovalDecision::Allow => ApprovalOutcome::Allow,
            ApprovalDecision::Deny => ApprovalOutcome::Deny(format!("denied by a stored approval rule ({reason})")),
        };
    }

    let ledger = zace_approval::ApprovalLedger::new(ctx.project_root, ctx.session_id);
    let prompt = format!("Run `{command}`? {reason}");
    match ledger.create_pending_approval_action(ctx.run_id, "approval", &prompt, command, planned_signature, &reason, Some(cwd.to_string_lossy().into_owned())) {
        Ok(action) => ApprovalOutcome::RequestUser { pending_id: action.context.pending_id, prompt },
        Err(_) => ApprovalOutcome::Deny(reason),
    }
}

async fn run_with_retries(call: &ToolCall, runtime: &RuntimeConfig, deps: &AgentDeps<'_>, cancel: &CancellationToken) -> ToolResult {
    let max_attempts = runtime.transient_retry_max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        deps.observer.on_tool_call(call);
        let result = deps.executor.execute(call, cancel).await;
        deps.observer.on_tool_result(&result);

        if result.success {
            return result;
        }

        let category = result
            .artifacts
            .as_ref()
            .and_then(|a| a.retry_category)
            .unwrap_or_else(|| classify_tool_failure(None, result.error.as_deref().unwrap_or("")));

        let analysis = if should_invoke_analysis(runtime.executor_analysis_policy, result.success) {
            Some(deps.executor_analysis.analyze(call.string_arg("command").unwrap_or(""), &result.output, result.error.as_deref()).await)
        } else {
            None
        };
        let analysis_recommends_retry = analysis.as_ref().map(|a| a.should_retry).unwrap_or(true);
        let attempts_remaining = max_attempts.saturating_sub(attempt);

        if should_retry(true, attempts_remaining, category, analysis_recommends_retry) {
            let requested_delay = analysis.as_ref().map(|a| a.retry_delay_ms).unwrap_or(0);
            let delay = bounded_retry_delay_ms(requested_delay, runtime.transient_retry_max_delay_ms);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            continue;
        }
        return result;
    }
}

fn tool_bearing_tail(state: &RunState, window: usize) -> Vec<usize> {
    state
        .context
        .steps
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, step)| step.tool_call.is_some())
        .take(window)
        .map(|(index, _)| index)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect()
}

pub async fn execute_tool_call(
    state: &mut RunState,
    runtime: &RuntimeConfig,
    deps: &AgentDeps<'_>,
    ctx: &RunContext<'_>,
    cancel: &CancellationToken,
    call: ToolCall,
    events: &EventSink<'_>,
    step: u32,
) -> ToolStepOutcome {
    let planned_signature = build_tool_call_signature(&call.name, &tool_call_arguments_value(&call), ctx.project_root);

    if let Err(reason) = zace_planner::validate_schema_tool_call(&call) {
        state.memory.push_tool(format!("[tool_call_validation_failed] {reason}"));
        state.context.transition_last(AgentState::Executing);
        if let Some(last) = state.context.steps.last_mut() {
            last.tool_call = Some(call);
        }
        state.planned_signature_history.push(planned_signature);
        return ToolStepOutcome::Continue;
    }

    if zace_guardrails::pre_execution_doom_loop_triggered(&state.planned_signature_history, &planned_signature, runtime.doom_loop_threshold) {
        deps.observer.on_loop_guard("pre_execution_doom_loop");
        events.emit("loop_guard_triggered", RunPhase::Executing, step, Some(json!({"reason": "doom_loop"})));
        state.context.push_step(AgentState::WaitingForUser, "doom loop guard triggered");
        return ToolStepOutcome::Terminal(finish(
            state,
            events,
            AgentState::WaitingForUser,
            "I kept repeating the same command without progress — could you steer me toward a different approach?".into(),
        ));
    }

    let command_for_cwd = call.string_arg("command").unwrap_or_default();
    let cwd_arg = call.string_arg("cwd");
    let (_, resolved_cwd) = canonicalize_execute_command(command_for_cwd, cwd_arg, ctx.project_root);

    match resolve_tool_approval(&call, &resolved_cwd, &planned_signature, runtime, deps, ctx, state).await {
        ApprovalOutcome::Deny(reason) => record_denied_tool(state, call, planned_signature, &reason),
        ApprovalOutcome::RequestUser { pending_id, prompt } => {
            deps.observer.on_approval_requested(&pending_id);
            events.emit("approval_requested", RunPhase::Approval, step, Some(json!({"pendingId": pending_id})));
            state.context.transition_last(AgentState::WaitingForUser);
            if let Some(last) = state.context.steps.last_mut() {
                last.tool_call = Some(call);
            }
            ToolStepOutcome::Terminal(finish(state, events, AgentState::WaitingForUser, prompt))
        }
        ApprovalOutcome::Allow => run_allowed_tool(state, runtime, deps, ctx, cancel, call, planned_signature, resolved_cwd, events, step).await,
    }
}

/// Record a tool call denied either outright or by a stored approval
/// rule, as a failed result, and allow the loop to continue planning.
pub(crate) fn record_denied_tool(state: &mut RunState, call: ToolCall, planned_signature: String, reason: &str) -> ToolStepOutcome {
    let result = ToolResult::failure(format!("command denied: {reason}"));
    state.memory.push_tool(tool_memory_digest(&call, &result));
    state.context.transition_last(AgentState::Executing);
    if let Some(last) = state.context.steps.last_mut() {
        last.tool_call = Some(call);
        last.tool_result = Some(result);
    }
    state.planned_signature_history.push(planned_signature);
    ToolStepOutcome::Continue
}

/// Execute a tool call that has already cleared approval (directly, or
/// because the user just approved a previously pending request), then run
/// the full artifact/guardrail pipeline.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_allowed_tool(
    state: &mut RunState,
    runtime: &RuntimeConfig,
    deps: &AgentDeps<'_>,
    ctx: &RunContext<'_>,
    cancel: &CancellationToken,
    call: ToolCall,
    planned_signature: String,
    resolved_cwd: PathBuf,
    events: &EventSink<'_>,
    step: u32,
) -> ToolStepOutcome {
    state.context.transition_last(AgentState::Executing);
    let result = run_with_retries(&call, runtime, deps, cancel).await;

    if result.artifacts.as_ref().is_some_and(|a| a.aborted || a.lifecycle_event == LifecycleEvent::Abort) {
        state.context.transition_last(AgentState::Interrupted);
        if let Some(last) = state.context.steps.last_mut() {
            last.tool_call = Some(call);
            last.tool_result = Some(result);
        }
        return ToolStepOutcome::Terminal(finish(state, events, AgentState::Interrupted, "the tool executor requested cancellation".into()));
    }

    let changed_file = result.artifacts.as_ref().and_then(|a| a.changed_files.first()).map(PathBuf::from);
    if let Some(artifacts) = &result.artifacts {
        for event in zace_lsp::handle_artifact(&mut state.lsp, artifacts, changed_file.as_deref(), &runtime.lsp, deps.prober, step, ctx.run_id).await {
            deps.observer.on_diagnostics(event.event);
            events.forward(event);
        }
    }

    state.last_execution_working_directory = Some(resolved_cwd.to_string_lossy().into_owned());

    let mut write_regression_reason = None;
    if let Some(artifacts) = &result.artifacts {
        if artifacts.has_changed_files() {
            write_regression_reason = zace_guardrails::detect_write_regression(state.last_write_lsp_error_count, artifacts, runtime.write_regression_error_spike);
            state.last_write_step = Some(step);
            state.last_write_working_directory = Some(resolved_cwd.to_string_lossy().into_owned());
            state.last_write_lsp_error_count = artifacts.lsp_error_count;
        }
    }
    if let Some(reason) = &write_regression_reason {
        state.memory.push_tool(format!("[write_regression_detected] {reason}"));
        events.emit("write_regression_detected", RunPhase::Executing, step, Some(json!({"reason": reason})));
    }

    if result.success && call.string_arg("command").is_some_and(validation_command) {
        state.last_successful_validation_step = Some(step);
    }

    state.memory.push_tool(tool_memory_digest(&call, &result));
    zace_scripts::apply_markers(&mut state.context.script_catalog, &result.output, step);
    let _ = zace_scripts::sync_registry(ctx.project_root, &state.context.script_catalog);

    let mut final_result = result;
    if let Some(reason) = write_regression_reason {
        if let Some(artifacts) = &mut final_result.artifacts {
            artifacts.write_regression_detected = true;
            artifacts.write_regression_reason = Some(reason);
        }
    }

    let combined = format!("{}\n{}", final_result.output, final_result.error.clone().unwrap_or_default());
    let loop_signature = build_loop_signature(&planned_signature, &combined);
    state.repetition_counter = zace_guardrails::post_execution_repetition_counter(state.previous_loop_signature.as_deref(), &loop_signature, state.repetition_counter);
    state.previous_loop_signature = Some(loop_signature);

    if let Some(last) = state.context.steps.last_mut() {
        last.tool_call = Some(call);
        last.tool_result = Some(final_result);
    }
    state.planned_signature_history.push(planned_signature);

    if zace_guardrails::repetition_triggered(state.repetition_counter) {
        deps.observer.on_loop_guard("post_execution_repetition");
        events.emit("loop_guard_triggered", RunPhase::Executing, step, Some(json!({"reason": "repetition"})));
        return ToolStepOutcome::Terminal(finish(
            state,
            events,
            AgentState::WaitingForUser,
            "I'm repeating the same result without new progress — what would you like me to try next?".into(),
        ));
    }

    let stagnation_indices = tool_bearing_tail(state, runtime.stagnation_window);
    let stagnation_window: Vec<&zace_core::types::AgentStep> = stagnation_indices.iter().map(|&i| &state.context.steps[i]).collect();
    if let Some(reason) = zace_guardrails::detect_stagnation(&stagnation_window) {
        events.emit("loop_guard_triggered", RunPhase::Executing, step, Some(json!({"reason": reason})));
        return ToolStepOutcome::Terminal(finish(state, events, AgentState::WaitingForUser, format!("Progress seems stalled ({reason}) — how should I proceed?")));
    }

    let readonly_indices = tool_bearing_tail(state, runtime.readonly_stagnation_window);
    let readonly_window: Vec<&zace_core::types::AgentStep> = readonly_indices.iter().map(|&i| &state.context.steps[i]).collect();
    if zace_guardrails::readonly_stagnation_triggered(&readonly_window, state.last_write_step, state.context.current_step, state.last_successful_validation_step) {
        events.emit("loop_guard_triggered", RunPhase::Executing, step, Some(json!({"reason": "readonly_stagnation"})));
        return ToolStepOutcome::Terminal(finish(
            state,
            events,
            AgentState::WaitingForUser,
            "I've only been inspecting since the last change — should I validate it or keep editing?".into(),
        ));
    }

    ToolStepOutcome::Continue
}
