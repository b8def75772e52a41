//! Pairs the push-based [`AgentObserver`] with the append-only session
//! journal so one call reaches both sinks (§6 Observer, `SessionJournal`).

use serde_json::{json, Value};

use zace_core::journal::{JournalEntry, JournalEntryKind, SessionJournal};
use zace_core::observer::{AgentObserver, RunEvent, RunPhase};
use zace_core::types::AgentState;

pub struct EventSink<'a> {
    pub observer: &'a dyn AgentObserver,
    pub journal: &'a SessionJournal,
    pub run_id: String,
}

fn phase_name(phase: RunPhase) -> &'static str {
    match phase {
        RunPhase::Planning => "planning",
        RunPhase::Executing => "executing",
        RunPhase::Approval => "approval",
        RunPhase::Finalizing => "finalizing",
    }
}

impl<'a> EventSink<'a> {
    pub fn emit(&self, event: &'static str, phase: RunPhase, step: u32, payload: Option<Value>) {
        let mut run_event = RunEvent::new(event, phase, step, self.run_id.clone());
        if let Some(payload) = payload.clone() {
            run_event = run_event.with_payload(payload);
        }
        self.observer.on_run_event(&run_event);

        let entry = JournalEntry::new(
            JournalEntryKind::RunEvent,
            json!({
                "event": event,
                "phase": phase_name(phase),
                "step": step,
                "runId": self.run_id,
                "payload": payload,
            }),
        );
        let _ = self.journal.append(&entry);
    }

    /// Forward an event a dependency crate already built (e.g. an LSP
    /// bootstrap transition) to both sinks.
    pub fn forward(&self, event: RunEvent) {
        self.observer.on_run_event(&event);
        let entry = JournalEntry::new(
            JournalEntryKind::RunEvent,
            json!({
                "event": event.event,
                "phase": phase_name(event.phase),
                "step": event.step,
                "runId": event.run_id,
                "payload": event.payload,
            }),
        );
        let _ = self.journal.append(&entry);
    }

    /// Notify the observer and emit the terminal run-events (§5, §8
    /// scenario 5): `run_interrupted` when the run ended via cancellation,
    /// always followed by exactly one `final_state_set`.
    pub fn finalize(&self, state: AgentState, step: u32, message: &str) {
        self.observer.on_final_state(state, message);
        if state == AgentState::Interrupted {
            self.emit("run_interrupted", RunPhase::Finalizing, step, Some(json!({"message": message})));
        }
        self.emit("final_state_set", RunPhase::Finalizing, step, Some(json!({"state": state.to_string(), "message": message})));
    }
}
