//! The run-loop scheduler (§4.7): wires the planner, tool executor,
//! approval, LSP bootstrap, guardrail, retry, and completion-gate crates
//! into one plan -> execute -> analyze cycle.

mod approval_resume;
mod complete;
mod events;
mod runtime_config;
mod startup;
pub mod state;
mod tool_step;

pub use approval_resume::resume_after_approval;

use std::collections::HashMap;
use std::path::Path;

use serde_json::{json, Value};

use zace_approval::{ReplyClassifier, SafetyClassifier};
use zace_core::cancel::CancellationToken;
use zace_core::journal::SessionJournal;
use zace_core::observer::{AgentObserver, RunPhase};
use zace_core::traits::{CallKind, ChatClient, ChatRequest, ResponseFormat, ToolExecutor};
use zace_core::types::{AgentState, CompletionPlan, Message, PlanAction, Role, ToolCall};
use zace_lsp::FileProber;
use zace_planner::{parse_planner_reply, ParserLimits, PlannerOutputMode, TransportReply};
use zace_retry::ExecutorAnalysisClient;

pub use runtime_config::RuntimeConfig;
pub use state::RunState;

use complete::CompleteOutcome;
use events::EventSink;

/// Every external interface the loop needs injected, bundled so call
/// sites don't thread seven parameters individually (§6).
pub struct AgentDeps<'a> {
    pub chat: &'a dyn ChatClient,
    pub executor: &'a dyn ToolExecutor,
    pub safety_classifier: &'a dyn SafetyClassifier,
    pub executor_analysis: &'a dyn ExecutorAnalysisClient,
    pub prober: &'a dyn FileProber,
    pub reply_classifier: &'a dyn ReplyClassifier,
    pub observer: &'a dyn AgentObserver,
    pub journal: &'a SessionJournal,
}

/// Identifiers and fixed inputs for one run, constant for its lifetime.
pub struct RunContext<'a> {
    pub project_root: &'a Path,
    pub session_id: &'a str,
    pub run_id: &'a str,
    pub workspace_root: &'a str,
    /// Authored system prompt text, opaque to the loop (§1 "Prompt text
    /// authoring ... consumed as opaque strings").
    pub planner_prompt: &'a str,
    pub task_completion_plan: CompletionPlan,
}

/// What `run_agent_loop` (or a resumed call into it) returns.
pub struct AgentResult {
    pub final_state: AgentState,
    pub message: String,
}

fn event_sink<'a>(deps: &AgentDeps<'a>, ctx: &RunContext<'a>) -> EventSink<'a> {
    EventSink {
        observer: deps.observer,
        journal: deps.journal,
        run_id: ctx.run_id.to_string(),
    }
}

fn finish(state: &mut RunState, events: &EventSink<'_>, final_state: AgentState, message: String) -> AgentResult {
    state.context.transition_last(final_state);
    events.finalize(final_state, state.context.current_step, &message);
    AgentResult { final_state, message }
}

/// Flatten a [`ToolCall`]'s arguments into the `Value::Object` shape the
/// canonical signature builder expects.
pub(crate) fn tool_call_arguments_value(call: &ToolCall) -> Value {
    Value::Object(call.arguments.clone().into_iter().collect())
}

fn ensure_question(message: &str) -> String {
    if message.trim_end().ends_with('?') {
        message.to_string()
    } else {
        format!("{message} — how would you like me to proceed?")
    }
}

/// The JSON schema advertised to the planner transport when structured
/// output is requested (§4.2's `toolCall`/`completionGateCommands` shape).
fn planner_response_format() -> ResponseFormat {
    ResponseFormat {
        kind: "json_schema".into(),
        name: "zace_plan_result".into(),
        strict: true,
        schema: json!({
            "type": "object",
            "properties": {
                "action": {"type": "string", "enum": ["continue", "complete", "blocked", "ask_user"]},
                "reasoning": {"type": "string"},
                "userMessage": {"type": ["string", "null"]},
                "toolCall": {
                    "type": ["object", "null"],
                    "properties": {
                        "name": {"type": "string"},
                        "arguments": {"type": "object"},
                    },
                    "required": ["name", "arguments"],
                },
                "completionGateCommands": {"type": "array", "items": {"type": "string"}},
                "completionGatesDeclaredNone": {"type": "boolean"},
            },
            "required": ["action", "reasoning"],
        }),
    }
}

/// Call the planner transport, retrying once without `response_format`
/// when the transport reports it is unsupported and the configured mode
/// allows falling back to text parsing (§4.2 Auto mode).
async fn call_planner(deps: &AgentDeps<'_>, messages: Vec<Message>, mode: PlannerOutputMode) -> TransportReply {
    let wants_schema = matches!(mode, PlannerOutputMode::Auto | PlannerOutputMode::SchemaStrict);
    let request = ChatRequest {
        messages: messages.clone(),
        call_kind: Some(CallKind::Planner),
        response_format: if wants_schema { Some(planner_response_format()) } else { None },
    };

    match deps.chat.chat(request).await {
        Ok(reply) => TransportReply {
            structured: reply.normalized,
            response_format_unsupported: false,
            raw_text: reply.content,
        },
        Err(err) if err.response_format_unsupported && mode == PlannerOutputMode::Auto => {
            let retry_request = ChatRequest {
                messages,
                call_kind: Some(CallKind::Planner),
                response_format: None,
            };
            match deps.chat.chat(retry_request).await {
                Ok(reply) => TransportReply {
                    structured: None,
                    response_format_unsupported: true,
                    raw_text: reply.content,
                },
                Err(_) => TransportReply {
                    structured: None,
                    response_format_unsupported: true,
                    raw_text: String::new(),
                },
            }
        }
        Err(err) => TransportReply {
            structured: None,
            response_format_unsupported: err.response_format_unsupported,
            raw_text: err.provider_message.unwrap_or_default(),
        },
    }
}

/// Compact memory in place when it crosses the configured trigger ratio,
/// using a dedicated summarization call against the transport (§4.8).
async fn maybe_compact(state: &mut RunState, runtime: &RuntimeConfig, deps: &AgentDeps<'_>) {
    if !runtime.compaction_enabled {
        return;
    }
    let Some(context_window) = runtime.context_window_tokens.or_else(|| deps.chat.model_context_window_tokens()) else {
        return;
    };
    let current_tokens = state.memory.estimate_token_count();
    if !zace_memory::should_compact(
        current_tokens,
        context_window,
        runtime.compaction_trigger_ratio,
        state.memory.non_system_count(),
        runtime.compaction_preserve_recent_messages,
    ) {
        return;
    }

    let mut prompt_messages = state.memory.messages().to_vec();
    prompt_messages.push(Message::new(
        Role::User,
        "Summarize the conversation above in a few sentences, preserving the task, any decisions made, and outstanding work.",
    ));
    let request = ChatRequest {
        messages: prompt_messages,
        call_kind: Some(CallKind::Compaction),
        response_format: None,
    };
    let summary = match deps.chat.chat(request).await {
        Ok(reply) => reply.content,
        Err(_) => "conversation history compacted (summary unavailable)".to_string(),
    };
    state.memory.compact_with_summary(&summary, runtime.compaction_preserve_recent_messages);
    deps.observer.on_compaction(&summary);
}

fn build_planner_messages(state: &RunState, ctx: &RunContext<'_>) -> Vec<Message> {
    let mut messages = state.memory.messages().to_vec();
    if messages.iter().all(|m| m.role != Role::System) {
        messages.insert(0, Message::new(Role::System, ctx.planner_prompt));
    }
    messages
}

/// The run loop's single consecutive-no-tool-continue budget before it
/// ends the run asking the user to clarify (§4.7).
const MAX_CONSECUTIVE_NO_TOOL_CONTINUES: u32 = 2;

/// The top-level plan -> execute -> analyze cycle (§4.7). Drives `state`
/// from its current step to completion, a blocking condition, or
/// `max_steps` exhaustion, honoring `cancel` at each of the three
/// cancellation sites.
pub async fn run_agent_loop(state: &mut RunState, runtime: &RuntimeConfig, deps: &AgentDeps<'_>, ctx: &RunContext<'_>, cancel: &CancellationToken) -> AgentResult {
    let events = event_sink(deps, ctx);

    if state.context.current_step == 0 {
        if let Some(result) = startup::run_startup(state, runtime, deps, ctx, cancel, &events).await {
            return result;
        }
    }

    loop {
        if state.context.is_exhausted() {
            let mut message = format!("Maximum steps ({}) reached", state.context.max_steps);
            if let Some(reason) = &state.last_completion_failure {
                message.push_str(&format!(": {reason}"));
            }
            state.context.push_step(AgentState::Blocked, "max steps exhausted");
            return finish(state, &events, AgentState::Blocked, message);
        }

        let step = state.context.current_step;
        deps.observer.on_step_start(step);
        events.emit("step_started", RunPhase::Planning, step, None);

        if cancel.is_cancelled() {
            state.context.push_step(AgentState::Interrupted, "cancelled before planning");
            return finish(state, &events, AgentState::Interrupted, "cancelled before the next planning step".into());
        }

        maybe_compact(state, runtime, deps).await;

        let messages = build_planner_messages(state, ctx);
        let limits = ParserLimits {
            max_repairs: runtime.planner_parse_max_repairs,
            max_invalid_artifact_chars: runtime.planner_max_invalid_artifact_chars,
        };
        deps.observer.on_planner_stream_start();
        let reply = call_planner(deps, messages, runtime.planner_output_mode).await;
        deps.observer.on_planner_stream_end();
        let plan = parse_planner_reply(&reply, runtime.planner_output_mode, limits, ctx.project_root);
        if let Some(usage) = &plan.usage {
            events.emit("usage_reported", RunPhase::Planning, step, Some(json!({"promptTokens": usage.prompt_tokens, "completionTokens": usage.completion_tokens})));
        }

        state.memory.push_assistant(plan.reasoning.clone());
        state.context.push_step(AgentState::Planning, plan.reasoning.clone());

        if cancel.is_cancelled() {
            state.context.push_step(AgentState::Interrupted, "cancelled after planning");
            return finish(state, &events, AgentState::Interrupted, "cancelled before the planned action could run".into());
        }

        match plan.action {
            Some(PlanAction::Continue) => {
                let Some(call) = plan.tool_call.clone() else {
                    state.no_tool_continue_count += 1;
                    state.context.transition_last(AgentState::WaitingForUser);
                    if state.no_tool_continue_count >= MAX_CONSECUTIVE_NO_TOOL_CONTINUES {
                        return finish(
                            state,
                            &events,
                            AgentState::WaitingForUser,
                            ensure_question("I keep planning to continue without naming a tool to run"),
                        );
                    }
                    continue;
                };
                state.no_tool_continue_count = 0;
                match tool_step::execute_tool_call(state, runtime, deps, ctx, cancel, call, &events, step).await {
                    tool_step::ToolStepOutcome::Continue => continue,
                    tool_step::ToolStepOutcome::Terminal(result) => return result,
                }
            }
            Some(PlanAction::Complete) => match complete::handle_complete(state, runtime, deps, ctx, cancel, &plan, &events, step).await {
                CompleteOutcome::Completed(result) => return result,
                CompleteOutcome::Blocked(reason) => {
                    state.last_completion_failure = Some(reason.clone());
                    state.memory.push_tool(format!("[completion_blocked] {reason}"));
                    state.context.transition_last(AgentState::Executing);
                    events.emit("completion_blocked", RunPhase::Finalizing, step, Some(json!({"reason": reason})));
                    continue;
                }
            },
            Some(PlanAction::Blocked) => {
                let message = if plan.reasoning.is_empty() {
                    "I'm blocked and can't find a path forward.".to_string()
                } else {
                    plan.reasoning.clone()
                };
                return finish(state, &events, AgentState::Blocked, message);
            }
            Some(PlanAction::AskUser) => {
                let message = plan.user_message.clone().unwrap_or_else(|| ensure_question(&plan.reasoning));
                return finish(state, &events, AgentState::WaitingForUser, message);
            }
            None => {
                state.context.transition_last(AgentState::Blocked);
                return finish(state, &events, AgentState::Blocked, "the planner's reply could not be understood".into());
            }
        }
    }
}
