//! Resumes a `waiting_for_user` session after the user replies to a
//! pending approval prompt (§4.3 + §4.7's "Resuming after approval").

use chrono::Duration;

use zace_core::cancel::CancellationToken;
use zace_core::signature::{build_tool_call_signature, canonicalize_execute_command};
use zace_core::types::AgentState;

use crate::events::EventSink;
use crate::runtime_config::RuntimeConfig;
use crate::state::RunState;
use crate::tool_step::{record_denied_tool, run_allowed_tool};
use crate::{ensure_question, event_sink, finish, tool_call_arguments_value, run_agent_loop, AgentDeps, AgentResult, RunContext};

/// Age beyond which an open pending approval action is treated as stale
/// and the run asks the user to restate the command (§4.3).
fn max_age(runtime: &RuntimeConfig) -> Duration {
    Duration::milliseconds(runtime.pending_action_max_age_ms as i64)
}

/// Resume a session that ended its previous `run_agent_loop` call in
/// `waiting_for_user` because of a pending command approval, given the
/// user's reply text.
pub async fn resume_after_approval(state: &mut RunState, runtime: &RuntimeConfig, deps: &AgentDeps<'_>, ctx: &RunContext<'_>, cancel: &CancellationToken, reply_text: &str) -> AgentResult {
    let events = event_sink(deps, ctx);

    let Some(call) = state.context.last_step().and_then(|s| s.tool_call.clone()) else {
        return finish(state, &events, AgentState::Blocked, "there is no pending tool call to resume".into());
    };

    let ledger = zace_approval::ApprovalLedger::new(ctx.project_root, ctx.session_id);
    let open = match ledger.find_latest_open_pending_action(max_age(runtime)) {
        Ok(Some(open)) => open,
        Ok(None) => {
            return finish(
                state,
                &events,
                AgentState::WaitingForUser,
                "that approval request has expired — please restate what you'd like me to run".into(),
            )
        }
        Err(_) => return finish(state, &events, AgentState::Blocked, "could not read the approval ledger".into()),
    };

    let intent = zace_approval::classify_reply(reply_text, &runtime.destructive.risky_confirmation_token, deps.reply_classifier).await;
    let decision = match zace_approval::apply_reply_decision(&ledger, &runtime.approval_rules_path, &open, intent, ctx.workspace_root) {
        Ok(decision) => decision,
        Err(_) => return finish(state, &events, AgentState::Blocked, "could not record the approval decision".into()),
    };

    let planned_signature = build_tool_call_signature(&call.name, &tool_call_arguments_value(&call), ctx.project_root);

    let outcome = match decision {
        None => {
            return finish(
                state,
                &events,
                AgentState::WaitingForUser,
                ensure_question(&format!("I couldn't tell whether that means yes or no for: {}", open.prompt)),
            );
        }
        Some(zace_core::types::ApprovalDecision::Deny) => {
            deps.observer.on_approval_resolved(&open.context.pending_id, "deny");
            record_denied_tool(state, call, planned_signature, &open.context.reason)
        }
        Some(zace_core::types::ApprovalDecision::Allow) => {
            deps.observer.on_approval_resolved(&open.context.pending_id, "allow");
            state.once_approved_signatures.insert(planned_signature.clone());
            let command_for_cwd = call.string_arg("command").unwrap_or_default().to_string();
            let cwd_arg: Option<String> = call.string_arg("cwd").map(str::to_string);
            let (_, resolved_cwd) = canonicalize_execute_command(&command_for_cwd, cwd_arg.as_deref(), ctx.project_root);
            let step = state.context.current_step.saturating_sub(1);
            run_allowed_tool(state, runtime, deps, ctx, cancel, call.clone(), planned_signature, resolved_cwd, &events, step).await
        }
    };

    match outcome {
        crate::tool_step::ToolStepOutcome::Terminal(result) => result,
        crate::tool_step::ToolStepOutcome::Continue => Box::pin(run_agent_loop(state, runtime, deps, ctx, cancel)).await,
    }
}
