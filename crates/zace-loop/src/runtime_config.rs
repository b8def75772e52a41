//! Translates the persisted [`ZaceConfig`] into the smaller, crate-local
//! config shapes each dependency actually asks for (§4.11 consumed by
//! §4.3/§4.4/§4.5/§4.6/§4.9).

use std::path::{Path, PathBuf};

use zace_approval::ApprovalConfig as DestructiveConfig;
use zace_config::{CompletionValidationMode, ExecutorAnalysisPolicy as ConfigAnalysisPolicy, PlannerOutputMode as ConfigPlannerMode, ZaceConfig};
use zace_lsp::LspConfig;
use zace_planner::PlannerOutputMode;
use zace_retry::ExecutorAnalysisPolicy;

/// Everything the run loop needs, pre-resolved against one project root so
/// the step/execute modules never touch `ZaceConfig` fields directly.
pub struct RuntimeConfig {
    pub max_steps: u32,
    pub destructive: DestructiveConfig,
    pub lsp: LspConfig,
    pub strict_mode: bool,
    pub require_discovered_gates: bool,
    pub gate_disallow_masking: bool,
    pub compaction_enabled: bool,
    pub compaction_trigger_ratio: f64,
    pub compaction_preserve_recent_messages: usize,
    pub context_window_tokens: Option<u64>,
    pub doom_loop_threshold: u32,
    pub stagnation_window: usize,
    pub readonly_stagnation_window: usize,
    pub write_regression_error_spike: u32,
    pub transient_retry_max_attempts: u32,
    pub transient_retry_max_delay_ms: u64,
    pub executor_analysis_policy: ExecutorAnalysisPolicy,
    pub planner_output_mode: PlannerOutputMode,
    pub planner_parse_max_repairs: u32,
    pub planner_max_invalid_artifact_chars: usize,
    pub doc_context_mode: zace_docs::DocContextMode,
    pub doc_context_max_files: usize,
    pub doc_context_max_chars: usize,
    pub approval_rules_path: PathBuf,
    pub pending_action_max_age_ms: u64,
}

fn map_analysis_policy(policy: ConfigAnalysisPolicy) -> ExecutorAnalysisPolicy {
    match policy {
        ConfigAnalysisPolicy::Always => ExecutorAnalysisPolicy::Always,
        ConfigAnalysisPolicy::OnFailure => ExecutorAnalysisPolicy::OnFailure,
        ConfigAnalysisPolicy::Never => ExecutorAnalysisPolicy::Never,
    }
}

fn map_planner_mode(mode: ConfigPlannerMode) -> PlannerOutputMode {
    match mode {
        ConfigPlannerMode::Auto => PlannerOutputMode::Auto,
        ConfigPlannerMode::SchemaStrict => PlannerOutputMode::SchemaStrict,
        ConfigPlannerMode::PromptOnly => PlannerOutputMode::PromptOnly,
    }
}

fn map_doc_mode(mode: zace_config::DocContextMode) -> zace_docs::DocContextMode {
    match mode {
        zace_config::DocContextMode::Off => zace_docs::DocContextMode::Off,
        zace_config::DocContextMode::Targeted => zace_docs::DocContextMode::Targeted,
        zace_config::DocContextMode::Broad => zace_docs::DocContextMode::Broad,
    }
}

impl RuntimeConfig {
    pub fn from_config(config: &ZaceConfig, project_root: &Path) -> Self {
        let runtime_scripts_dir = project_root.join(".zace").join("runtime").join("scripts");
        let runtime_lsp_config_path = config.lsp.lsp_server_config_path.clone().map(PathBuf::from);

        Self {
            max_steps: config.max_steps,
            destructive: DestructiveConfig {
                require_risky_confirmation: config.approval.require_risky_confirmation,
                risky_confirmation_token: config.approval.risky_confirmation_token.clone(),
                runtime_scripts_dir,
                runtime_lsp_config_path: runtime_lsp_config_path.clone(),
            },
            lsp: LspConfig {
                enabled: config.lsp.lsp_enabled,
                block_on_failed: config.lsp.lsp_bootstrap_block_on_failed,
                require_lsp: config.completion.completion_require_lsp,
                provision_max_attempts: config.lsp.lsp_provision_max_attempts,
                auto_provision: config.lsp.lsp_auto_provision,
                runtime_lsp_config_path,
            },
            strict_mode: config.completion.completion_validation_mode == CompletionValidationMode::Strict,
            require_discovered_gates: config.completion.completion_require_discovered_gates,
            gate_disallow_masking: config.completion.gate_disallow_masking,
            compaction_enabled: config.compaction.compaction_enabled,
            compaction_trigger_ratio: config.compaction.compaction_trigger_ratio,
            compaction_preserve_recent_messages: config.compaction.compaction_preserve_recent_messages as usize,
            context_window_tokens: config.compaction.context_window_tokens,
            doom_loop_threshold: config.guardrails.doom_loop_threshold,
            stagnation_window: config.guardrails.stagnation_window as usize,
            readonly_stagnation_window: config.guardrails.readonly_stagnation_window as usize,
            write_regression_error_spike: config.guardrails.write_regression_error_spike,
            transient_retry_max_attempts: config.retry.transient_retry_max_attempts,
            transient_retry_max_delay_ms: config.retry.transient_retry_max_delay_ms,
            executor_analysis_policy: map_analysis_policy(config.retry.executor_analysis),
            planner_output_mode: map_planner_mode(config.planner.planner_output_mode),
            planner_parse_max_repairs: config.planner.planner_parse_max_repairs,
            planner_max_invalid_artifact_chars: config.planner.planner_max_invalid_artifact_chars,
            doc_context_mode: map_doc_mode(config.docs.doc_context_mode),
            doc_context_max_files: config.docs.doc_context_max_files,
            doc_context_max_chars: config.docs.doc_context_max_chars,
            approval_rules_path: project_root.join(&config.approval.approval_rules_path),
            pending_action_max_age_ms: config.approval.pending_action_max_age_ms,
        }
    }
}
