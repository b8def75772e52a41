//! Run-loop startup (§4.7 "Startup (step 0)"): a fixed script-discovery
//! command, then bounded project-doc injection.

use zace_core::cancel::CancellationToken;
use zace_core::observer::RunPhase;
use zace_core::types::{AgentState, LifecycleEvent, ToolCall};

use crate::events::EventSink;
use crate::runtime_config::RuntimeConfig;
use crate::state::RunState;
use crate::{finish, AgentDeps, AgentResult, RunContext};

/// Fixed command run once per session, before the first planner turn, to
/// surface helper-script markers (`.sh` files and Makefiles) the script
/// catalog can register ahead of time.
const SCRIPT_DISCOVERY_COMMAND: &str = "find . -maxdepth 4 -type f \\( -name '*.sh' -o -name 'Makefile' \\) -not -path '*/.git/*' -not -path '*/node_modules/*' -not -path '*/target/*' 2>/dev/null";

fn task_disables_docs(task: &str) -> bool {
    let lowered = task.to_lowercase();
    ["skip docs", "no docs", "without reading docs", "ignore documentation"]
        .iter()
        .any(|needle| lowered.contains(needle))
}

/// Run startup for step 0. Returns `Some(result)` when startup itself
/// terminates the run (cancellation or an aborting executor); `None` means
/// the loop should proceed into its first planning step.
pub async fn run_startup(
    state: &mut RunState,
    runtime: &RuntimeConfig,
    deps: &AgentDeps<'_>,
    ctx: &RunContext<'_>,
    cancel: &CancellationToken,
    events: &EventSink<'_>,
) -> Option<AgentResult> {
    events.emit("run_started", RunPhase::Planning, 0, None);

    if cancel.is_cancelled() {
        state.context.push_step(AgentState::Interrupted, "cancelled before startup");
        return Some(finish(state, events, AgentState::Interrupted, "cancelled before the run could start".into()));
    }

    let discovery_call = ToolCall {
        name: "execute_command".into(),
        arguments: [("command".to_string(), serde_json::Value::String(SCRIPT_DISCOVERY_COMMAND.into()))].into_iter().collect(),
    };
    let discovery_result = deps.executor.execute(&discovery_call, cancel).await;

    let aborted = discovery_result
        .artifacts
        .as_ref()
        .is_some_and(|a| a.aborted || a.lifecycle_event == LifecycleEvent::Abort);
    if aborted {
        state.context.push_step(AgentState::Interrupted, "startup script discovery aborted");
        return Some(finish(state, events, AgentState::Interrupted, "the tool executor aborted during startup".into()));
    }

    if discovery_result.success {
        zace_scripts::apply_markers(&mut state.context.script_catalog, &discovery_result.output, 0);
        let _ = zace_scripts::sync_registry(ctx.project_root, &state.context.script_catalog);
    }

    if runtime.doc_context_mode != zace_docs::DocContextMode::Off {
        if let Some(message) = zace_docs::build_doc_context_message(
            ctx.project_root,
            &state.context.task,
            task_disables_docs(&state.context.task),
            runtime.doc_context_mode,
            runtime.doc_context_max_files,
            runtime.doc_context_max_chars,
        ) {
            state.memory.push(message);
        }
    }

    None
}
