//! Pre-execution doom-loop, post-execution repetition, stagnation,
//! read-only-inspection stagnation, and write-regression guardrails
//! (§4.6). Every check here is a pure function over loop-owned state; the
//! run loop decides when to call them and what to do with the result.

mod readonly;

pub use readonly::is_readonly_inspection_command;

use zace_core::types::{AgentStep, ProgressSignal, ToolArtifacts};

fn progress_signal_of(step: &AgentStep) -> Option<ProgressSignal> {
    step.tool_result.as_ref()?.artifacts.as_ref()?.progress_signal
}

/// Count trailing matches of `planned_signature` in `history`; triggers at
/// `threshold` (clamped to a minimum of 2).
pub fn pre_execution_doom_loop_triggered(history: &[String], planned_signature: &str, threshold: u32) -> bool {
    let threshold = threshold.max(2);
    let trailing = history.iter().rev().take_while(|s| s.as_str() == planned_signature).count() as u32;
    trailing >= threshold
}

/// Update the post-execution repetition counter given the previous and
/// newly computed loop signatures.
pub fn post_execution_repetition_counter(previous_loop_signature: Option<&str>, new_loop_signature: &str, counter: u32) -> u32 {
    if previous_loop_signature == Some(new_loop_signature) {
        counter + 1
    } else {
        1
    }
}

pub fn repetition_triggered(counter: u32) -> bool {
    counter >= 3
}

/// Stagnation over a window of tool-bearing steps. `window` must already
/// be the caller's last `stagnationWindow` tool-bearing steps.
pub fn detect_stagnation(window: &[&AgentStep]) -> Option<String> {
    if window.is_empty() {
        return None;
    }
    if window.iter().any(|s| progress_signal_of(s) == Some(ProgressSignal::FilesChanged)) {
        return None;
    }
    let all_failed = window.iter().all(|s| s.tool_result.as_ref().is_some_and(|r| !r.success));
    if all_failed {
        return Some("failures without progress".into());
    }
    let all_succeeded_without_progress = window.iter().all(|s| {
        s.tool_result.as_ref().is_some_and(|r| r.success)
            && matches!(progress_signal_of(s), None | Some(ProgressSignal::None) | Some(ProgressSignal::SuccessWithoutChanges))
    });
    if all_succeeded_without_progress {
        return Some("success without observable progress".into());
    }
    None
}

/// Read-only-inspection stagnation: after a write, a run of successful,
/// read-only, non-changing steps with no re-validation since triggers a
/// pause.
pub fn readonly_stagnation_triggered(window: &[&AgentStep], last_write_step: Option<u32>, current_step: u32, last_successful_validation_step: Option<u32>) -> bool {
    let Some(write_step) = last_write_step else {
        return false;
    };
    if write_step >= current_step {
        return false;
    }
    if last_successful_validation_step.is_some_and(|v| v >= write_step) {
        return false;
    }
    if window.is_empty() {
        return false;
    }
    window.iter().all(|step| {
        let command_is_readonly = step
            .tool_call
            .as_ref()
            .and_then(|c| c.string_arg("command"))
            .is_some_and(is_readonly_inspection_command);
        let succeeded_without_changes = step.tool_result.as_ref().is_some_and(|r| {
            r.success && !r.artifacts.as_ref().is_some_and(zace_core::types::ToolArtifacts::has_changed_files)
        });
        command_is_readonly && succeeded_without_changes
    })
}

/// Annotate a write-bearing result with a regression reason when its
/// `lspErrorCount` spikes by at least `spike_threshold` over the last
/// write's count.
pub fn detect_write_regression(previous_write_lsp_error_count: Option<u32>, artifacts: &ToolArtifacts, spike_threshold: u32) -> Option<String> {
    if artifacts.changed_files.is_empty() {
        return None;
    }
    let new_count = artifacts.lsp_error_count?;
    let previous = previous_write_lsp_error_count?;
    if new_count >= previous.saturating_add(spike_threshold) {
        Some(format!("lsp error count rose from {previous} to {new_count}"))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zace_core::types::{AgentState, ToolCall, ToolResult};
    use std::collections::HashMap;

    fn step_with(success: bool, progress: Option<ProgressSignal>, command: &str, changed_files: Vec<String>) -> AgentStep {
        let mut arguments = HashMap::new();
        arguments.insert("command".to_string(), serde_json::Value::String(command.to_string()));
        AgentStep {
            step: 0,
            state: AgentState::Executing,
            reasoning: "r".into(),
            tool_call: Some(ToolCall { name: "execute_command".into(), arguments }),
            tool_result: Some(ToolResult {
                success,
                output: String::new(),
                error: None,
                artifacts: Some(ToolArtifacts {
                    progress_signal: progress,
                    changed_files,
                    ..Default::default()
                }),
            }),
        }
    }

    #[test]
    fn doom_loop_triggers_at_clamped_threshold() {
        let history = vec!["sigA".to_string(), "sigA".to_string()];
        assert!(pre_execution_doom_loop_triggered(&history, "sigA", 1));
        assert!(!pre_execution_doom_loop_triggered(&history, "sigB", 2));
    }

    #[test]
    fn repetition_counter_resets_on_change() {
        let c = post_execution_repetition_counter(Some("a"), "a", 1);
        assert_eq!(c, 2);
        let c = post_execution_repetition_counter(Some("a"), "b", c);
        assert_eq!(c, 1);
        assert!(!repetition_triggered(c));
    }

    #[test]
    fn stagnation_not_triggered_when_files_changed_present() {
        let steps = vec![step_with(true, Some(ProgressSignal::FilesChanged), "echo", vec!["a.rs".into()])];
        let window: Vec<&AgentStep> = steps.iter().collect();
        assert!(detect_stagnation(&window).is_none());
    }

    #[test]
    fn stagnation_triggers_on_all_failures() {
        let steps = vec![step_with(false, None, "cargo test", vec![]), step_with(false, None, "cargo test", vec![])];
        let window: Vec<&AgentStep> = steps.iter().collect();
        assert_eq!(detect_stagnation(&window).unwrap(), "failures without progress");
    }

    #[test]
    fn stagnation_triggers_on_success_without_progress() {
        let steps = vec![step_with(true, Some(ProgressSignal::SuccessWithoutChanges), "cargo check", vec![])];
        let window: Vec<&AgentStep> = steps.iter().collect();
        assert_eq!(detect_stagnation(&window).unwrap(), "success without observable progress");
    }

    #[test]
    fn readonly_stagnation_requires_write_before_current_step() {
        let steps = vec![step_with(true, None, "cat file", vec![])];
        let window: Vec<&AgentStep> = steps.iter().collect();
        assert!(!readonly_stagnation_triggered(&window, None, 5, None));
        assert!(readonly_stagnation_triggered(&window, Some(2), 5, None));
    }

    #[test]
    fn readonly_stagnation_false_when_validated_since_write() {
        let steps = vec![step_with(true, None, "cat file", vec![])];
        let window: Vec<&AgentStep> = steps.iter().collect();
        assert!(!readonly_stagnation_triggered(&window, Some(2), 5, Some(3)));
    }

    #[test]
    fn write_regression_detects_spike() {
        let artifacts = ToolArtifacts {
            changed_files: vec!["a.rs".into()],
            lsp_error_count: Some(10),
            ..Default::default()
        };
        assert!(detect_write_regression(Some(2), &artifacts, 5).is_some());
        assert!(detect_write_regression(Some(8), &artifacts, 5).is_none());
    }

    #[test]
    fn write_regression_none_without_prior_write() {
        let artifacts = ToolArtifacts {
            changed_files: vec!["a.rs".into()],
            lsp_error_count: Some(10),
            ..Default::default()
        };
        assert!(detect_write_regression(None, &artifacts, 5).is_none());
    }
}
