//! LSP bootstrap state machine: `idle -> required <-> probing -> ready`,
//! plus `failed` reachable from `required` or `probing` (§4.4).

mod probe;

pub use probe::FileProber;

use std::path::{Path, PathBuf};

use zace_core::observer::{RunEvent, RunPhase};
use zace_core::types::{LspBootstrapState, LspBootstrapStateKind, LspStatus, ToolArtifacts};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapSignal {
    None,
    Active,
    Required,
    Failed,
}

#[derive(Debug, Clone)]
pub struct LspConfig {
    pub enabled: bool,
    pub block_on_failed: bool,
    pub require_lsp: bool,
    pub provision_max_attempts: u32,
    pub auto_provision: bool,
    pub runtime_lsp_config_path: Option<PathBuf>,
}

/// Map a raw [`LspStatus`] artifact to a bootstrap signal.
pub fn derive_signal(status: LspStatus) -> BootstrapSignal {
    match status {
        LspStatus::NoActiveServer => BootstrapSignal::Required,
        LspStatus::Failed => BootstrapSignal::Failed,
        LspStatus::Diagnostics | LspStatus::NoErrors => BootstrapSignal::Active,
        LspStatus::NoApplicableFiles | LspStatus::NoChangedFiles | LspStatus::Disabled => BootstrapSignal::None,
    }
}

fn touches_runtime_config(changed_file: Option<&Path>, config: &LspConfig) -> bool {
    match (changed_file, &config.runtime_lsp_config_path) {
        (Some(file), Some(lsp_config)) => file == lsp_config,
        _ => false,
    }
}

/// Apply one artifact-derived signal to `state`, driving the transition
/// rules. Returns the event to emit, if any. `changed_file` is the path
/// written by the tool call that produced `artifacts`, when known.
///
/// When a write touches the runtime LSP config path and there are pending
/// changed files while `required`/`failed`, this calls `prober` to re-probe
/// and resolves the `probing` state synchronously before returning.
pub async fn handle_artifact(
    state: &mut LspBootstrapState,
    artifacts: &ToolArtifacts,
    changed_file: Option<&Path>,
    config: &LspConfig,
    prober: &dyn FileProber,
    step: u32,
    run_id: &str,
) -> Vec<RunEvent> {
    let Some(status) = artifacts.lsp_status else {
        return Vec::new();
    };
    let signal = derive_signal(status);
    let reason = artifacts.lsp_status_reason.clone();

    if signal == BootstrapSignal::None {
        return Vec::new();
    }

    if let Some(file) = changed_file {
        if !matches!(signal, BootstrapSignal::Active) {
            state.pending_changed_files.insert(file.to_string_lossy().into_owned());
        }
    }

    if signal == BootstrapSignal::Active {
        let changed = state.state != LspBootstrapStateKind::Ready || state.last_failure_reason.is_some();
        let was_idle = state.state == LspBootstrapStateKind::Idle;
        state.state = LspBootstrapStateKind::Ready;
        state.last_failure_reason = None;
        state.pending_changed_files.clear();
        if !was_idle && changed {
            return vec![RunEvent::new("lsp_bootstrap_cleared", RunPhase::Executing, step, run_id)];
        }
        return Vec::new();
    }

    // signal is Required or Failed.
    let next_kind = if signal == BootstrapSignal::Required {
        LspBootstrapStateKind::Required
    } else {
        LspBootstrapStateKind::Failed
    };

    if touches_runtime_config(changed_file, config) && !state.pending_changed_files.is_empty() && matches!(state.state, LspBootstrapStateKind::Required | LspBootstrapStateKind::Failed) {
        state.state = LspBootstrapStateKind::Probing;
        let pending: Vec<String> = state.pending_changed_files.iter().cloned().collect();
        let mut events = vec![RunEvent::new("lsp_bootstrap_probe_started", RunPhase::Executing, step, run_id)];
        match prober.probe_files(&pending).await {
            Ok(LspStatus::Diagnostics) | Ok(LspStatus::NoErrors) => {
                state.state = LspBootstrapStateKind::Ready;
                state.pending_changed_files.clear();
                state.last_failure_reason = None;
                events.push(RunEvent::new("lsp_bootstrap_probe_succeeded", RunPhase::Executing, step, run_id));
                events.push(RunEvent::new("lsp_bootstrap_cleared", RunPhase::Executing, step, run_id));
                return events;
            }
            Ok(other) => {
                let probed_signal = derive_signal(other);
                state.state = if probed_signal == BootstrapSignal::Failed {
                    LspBootstrapStateKind::Failed
                } else {
                    LspBootstrapStateKind::Required
                };
            }
            Err(message) => {
                state.state = LspBootstrapStateKind::Failed;
                state.last_failure_reason = Some(message);
            }
        }
        if let Some(cmd) = artifacts.lsp_status_reason.as_deref() {
            state.push_attempted_command(cmd);
        }
        state.provision_attempts += 1;
        events.push(RunEvent::new("lsp_bootstrap_required", RunPhase::Executing, step, run_id));
        return events;
    }

    let changed = state.state != next_kind || (reason.is_some() && reason != state.last_failure_reason);
    state.state = next_kind;
    if let Some(r) = reason {
        if !r.is_empty() {
            state.last_failure_reason = Some(r);
        }
    }
    if let Some(cmd) = artifacts.lsp_status_reason.as_deref() {
        state.push_attempted_command(cmd);
    }
    state.provision_attempts += 1;

    if changed {
        vec![RunEvent::new("lsp_bootstrap_required", RunPhase::Executing, step, run_id)]
    } else {
        Vec::new()
    }
}

/// Completion is blocked by the bootstrap machine iff LSP is enabled and
/// the state requires attention (or is non-ready with pending files, when
/// `require_lsp` broadens the check).
pub fn blocks_completion(state: &LspBootstrapState, config: &LspConfig) -> bool {
    if !config.enabled {
        return false;
    }
    let basic_block = state.state == LspBootstrapStateKind::Required
        || (state.state == LspBootstrapStateKind::Failed && config.block_on_failed);
    if basic_block {
        return true;
    }
    config.require_lsp && state.state != LspBootstrapStateKind::Ready && !state.pending_changed_files.is_empty()
}

/// Once attempts are exhausted (or auto-provision is disabled), completion
/// should bounce to `waiting_for_user` instead of retrying bootstrap.
pub fn should_wait_for_user(state: &LspBootstrapState, config: &LspConfig) -> bool {
    blocks_completion(state, config) && (!config.auto_provision || state.provision_attempts >= config.provision_max_attempts)
}
