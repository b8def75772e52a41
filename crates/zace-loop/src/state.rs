//! Mutable state one `run_agent_loop` invocation owns for its lifetime
//! (§3, §5): the agent context, memory, LSP bootstrap machine, and the
//! small bookkeeping fields the tool-execution pipeline threads through
//! steps (`lastWriteStep`, doom-loop history, ...).

use std::collections::HashSet;

use zace_core::types::{AgentContext, LspBootstrapState};
use zace_memory::Memory;

/// Resumable state for one session. A fresh run starts from
/// [`RunState::new`]; a caller resuming a `waiting_for_user` session
/// passes back the `RunState` it was given at the end of the prior
/// invocation.
pub struct RunState {
    pub context: AgentContext,
    pub memory: Memory,
    pub lsp: LspBootstrapState,
    pub planned_signature_history: Vec<String>,
    pub previous_loop_signature: Option<String>,
    pub repetition_counter: u32,
    pub last_write_step: Option<u32>,
    pub last_write_working_directory: Option<String>,
    pub last_write_lsp_error_count: Option<u32>,
    pub last_successful_validation_step: Option<u32>,
    pub last_execution_working_directory: Option<String>,
    pub no_tool_continue_count: u32,
    /// Signatures the user has already approved once this run (§3's
    /// `onceApprovedSignatures`), so a retried call with the same
    /// signature does not re-request approval.
    pub once_approved_signatures: HashSet<String>,
    /// Reason the most recent `COMPLETE` attempt was blocked, surfaced in
    /// the final message if the run exhausts `maxSteps` without ever
    /// completing.
    pub last_completion_failure: Option<String>,
}

impl RunState {
    pub fn new(task: impl Into<String>, max_steps: u32) -> Self {
        Self {
            context: AgentContext::new(task, max_steps),
            memory: Memory::new(),
            lsp: LspBootstrapState::default(),
            planned_signature_history: Vec::new(),
            previous_loop_signature: None,
            repetition_counter: 0,
            last_write_step: None,
            last_write_working_directory: None,
            last_write_lsp_error_count: None,
            last_successful_validation_step: None,
            last_execution_working_directory: None,
            no_tool_continue_count: 0,
            once_approved_signatures: HashSet::new(),
            last_completion_failure: None,
        }
    }
}
