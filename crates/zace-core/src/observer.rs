//! Push-based observer interface (§6) and the plain-data run events it
//! receives. Every method has a no-op default so callers only implement
//! what they care about, and a failing observer can never affect the loop
//! because the trait's methods are infallible by signature (§9).

use serde_json::Value;

use crate::types::{AgentState, ToolCall, ToolResult};

/// One occurrence recorded to the session journal as a `run_event` entry
/// and, live, to the [`AgentObserver`].
#[derive(Debug, Clone)]
pub struct RunEvent {
    pub event: &'static str,
    pub phase: RunPhase,
    pub step: u32,
    pub run_id: String,
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Planning,
    Executing,
    Approval,
    Finalizing,
}

impl RunEvent {
    pub fn new(event: &'static str, phase: RunPhase, step: u32, run_id: impl Into<String>) -> Self {
        Self {
            event,
            phase,
            step,
            run_id: run_id.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Best-effort push notifications from the run loop. All methods default
/// to no-ops; implementors override only what they need.
pub trait AgentObserver: Send + Sync {
    fn on_step_start(&self, _step: u32) {}
    fn on_planner_stream_start(&self) {}
    fn on_planner_stream_token(&self, _token: &str) {}
    fn on_planner_stream_end(&self) {}
    fn on_executor_stream_start(&self) {}
    fn on_executor_stream_token(&self, _token: &str) {}
    fn on_executor_stream_end(&self) {}
    fn on_tool_call(&self, _call: &ToolCall) {}
    fn on_tool_result(&self, _result: &ToolResult) {}
    fn on_diagnostics(&self, _summary: &str) {}
    fn on_compaction(&self, _summary: &str) {}
    fn on_approval_requested(&self, _pending_id: &str) {}
    fn on_approval_resolved(&self, _pending_id: &str, _decision: &str) {}
    fn on_loop_guard(&self, _reason: &str) {}
    fn on_error(&self, _message: &str) {}
    fn on_run_event(&self, _event: &RunEvent) {}
    fn on_final_state(&self, _state: AgentState, _message: &str) {}
}

/// An observer that does nothing; the default when the caller does not
/// want push notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl AgentObserver for NullObserver {}
