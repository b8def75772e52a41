//! Completion gate evaluator: build order, masking detection, freshness
//! checks, and sequential gate execution (§4.5).

mod discover;
mod masking;

pub use discover::discover_automatic_completion_gates;
pub use masking::detect_masking;

use std::path::Path;

use async_trait::async_trait;
use zace_core::types::{CompletionGate, CompletionPlan, CompletionSource};
use zace_core::{CancellationToken, ToolCall, ToolExecutor};

/// Inputs to [`build_completion_plan`]; `task_plan` is accepted as already
/// resolved (`resolveCompletionPlan` is opaque to this crate).
pub struct GateBuildInput<'a> {
    pub task_plan: CompletionPlan,
    pub planner_gate_commands: &'a [String],
    pub planner_declared_none: bool,
    pub working_directory: &'a Path,
    pub strict_mode: bool,
    pub require_discovered_gates: bool,
    pub last_write_step: Option<u32>,
}

/// Merge task, planner, and auto-discovered gates preserving insertion
/// order and de-duplicating by command.
pub fn build_completion_plan(input: GateBuildInput<'_>) -> CompletionPlan {
    let mut plan = input.task_plan;

    for (i, command) in input.planner_gate_commands.iter().enumerate() {
        plan.push_dedup(CompletionGate::planner(i, command.clone()));
    }

    let should_discover = input.last_write_step.is_some()
        && ((input.strict_mode && input.require_discovered_gates) || (plan.is_empty() && !input.planner_declared_none));

    if should_discover {
        for gate in discover_automatic_completion_gates(input.working_directory) {
            plan.push_dedup(gate);
        }
    }

    if !plan.gates.is_empty() {
        plan.source = Some(CompletionSource::Merged);
    }
    plan
}

/// A block reason surfaced at `COMPLETE` time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateBlockReason {
    DeclaredNoneWithPendingWrite,
    NoGatesDeclared,
    Masked { label: String, reason: String },
    ApprovalDenied { label: String },
    GateFailed { message: String },
    NotFresh,
}

impl std::fmt::Display for GateBlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeclaredNoneWithPendingWrite => write!(f, "planner declared `gates: none` but a write is pending validation"),
            Self::NoGatesDeclared => write!(f, "no completion gates resolved and none were explicitly declared"),
            Self::Masked { label, reason } => write!(f, "gate '{label}' is masked: {reason}"),
            Self::ApprovalDenied { label } => write!(f, "gate '{label}' was denied approval"),
            Self::GateFailed { message } => write!(f, "{message}"),
            Self::NotFresh => write!(f, "a later write has not been re-validated"),
        }
    }
}

/// Static checks that can be resolved before running any gate.
pub fn check_static_policies(plan: &CompletionPlan, strict_mode: bool, gate_disallow_masking: bool, planner_declared_none: bool, last_write_step: Option<u32>) -> Option<GateBlockReason> {
    if strict_mode && planner_declared_none && last_write_step.is_some() {
        return Some(GateBlockReason::DeclaredNoneWithPendingWrite);
    }
    if plan.is_empty() && !planner_declared_none {
        return Some(GateBlockReason::NoGatesDeclared);
    }
    if strict_mode && gate_disallow_masking {
        if let Some((label, reason)) = detect_masking(plan) {
            return Some(GateBlockReason::Masked { label, reason });
        }
    }
    None
}

/// Freshness: blocked unless the last successful validation happened at or
/// after the last write, when strict mode is enabled and a write occurred.
pub fn is_fresh(strict_mode: bool, last_write_step: Option<u32>, last_successful_validation_step: Option<u32>) -> bool {
    match (strict_mode, last_write_step) {
        (true, Some(write_step)) => last_successful_validation_step.is_some_and(|v| v >= write_step),
        _ => true,
    }
}

/// Approval check for gate-run commands, identical in contract to
/// user-initiated command approval.
#[async_trait]
pub trait GateApproval: Send + Sync {
    async fn allows(&self, command: &str, cwd: &Path) -> bool;
}

fn preview(result: &zace_core::types::ToolResult) -> String {
    let combined = if result.output.is_empty() {
        result.error.clone().unwrap_or_default()
    } else {
        result.output.clone()
    };
    combined.chars().take(180).collect()
}

/// Run every gate sequentially; stop and return the first failure.
pub async fn run_gates(
    plan: &CompletionPlan,
    cwd: &Path,
    executor: &dyn ToolExecutor,
    approval: &dyn GateApproval,
    cancel: &CancellationToken,
) -> Result<(), GateBlockReason> {
    for gate in &plan.gates {
        if !approval.allows(&gate.command, cwd).await {
            return Err(GateBlockReason::ApprovalDenied { label: gate.label.clone() });
        }
        let call = ToolCall {
            name: "execute_command".into(),
            arguments: [("command".to_string(), serde_json::Value::String(gate.command.clone())), ("cwd".to_string(), serde_json::Value::String(cwd.to_string_lossy().into_owned()))]
                .into_iter()
                .collect(),
        };
        let result = executor.execute(&call, cancel).await;
        if !result.success {
            let message = format!("{} failed ({}): {}", gate.label, gate.command, preview(&result));
            return Err(GateBlockReason::GateFailed { message });
        }
    }
    Ok(())
}
