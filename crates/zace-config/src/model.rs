//! `ZaceConfig`: the full set of recognized configuration options (§6
//! Configuration, §4.11).

use std::fmt;

use serde::{Deserialize, Serialize};

fn default_max_steps() -> u32 {
    50
}

fn default_true() -> bool {
    true
}

fn default_risky_confirmation_token() -> String {
    "CONFIRM".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ZaceConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub approval: ApprovalConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub lsp: LspConfig,
    #[serde(default)]
    pub compaction: CompactionConfig,
    #[serde(default)]
    pub guardrails: GuardrailsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub docs: DocsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

impl ZaceConfig {
    fn defaults() -> Self {
        Self {
            max_steps: default_max_steps(),
            stream: false,
            approval: ApprovalConfig::default(),
            completion: CompletionConfig::default(),
            lsp: LspConfig::default(),
            compaction: CompactionConfig::default(),
            guardrails: GuardrailsConfig::default(),
            retry: RetryConfig::default(),
            planner: PlannerConfig::default(),
            docs: DocsConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    pub require_risky_confirmation: bool,
    #[serde(default = "default_risky_confirmation_token")]
    pub risky_confirmation_token: String,
    #[serde(default = "default_true")]
    pub approval_memory_enabled: bool,
    pub approval_rules_path: String,
    #[serde(default = "default_pending_action_max_age_ms")]
    pub pending_action_max_age_ms: u64,
}

fn default_pending_action_max_age_ms() -> u64 {
    15 * 60 * 1000
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            require_risky_confirmation: true,
            risky_confirmation_token: default_risky_confirmation_token(),
            approval_memory_enabled: true,
            approval_rules_path: ".zace/approval_rules.json".to_string(),
            pending_action_max_age_ms: default_pending_action_max_age_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionValidationMode {
    Strict,
    Balanced,
    LlmOnly,
}

impl Default for CompletionValidationMode {
    fn default() -> Self {
        Self::Balanced
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub completion_validation_mode: CompletionValidationMode,
    pub completion_require_discovered_gates: bool,
    pub completion_require_lsp: bool,
    #[serde(default = "default_true")]
    pub gate_disallow_masking: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            completion_validation_mode: CompletionValidationMode::default(),
            completion_require_discovered_gates: false,
            completion_require_lsp: false,
            gate_disallow_masking: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LspConfig {
    pub lsp_enabled: bool,
    pub lsp_server_config_path: Option<String>,
    #[serde(default = "default_true")]
    pub lsp_auto_provision: bool,
    pub lsp_bootstrap_block_on_failed: bool,
    #[serde(default = "default_lsp_provision_max_attempts")]
    pub lsp_provision_max_attempts: u32,
    #[serde(default = "default_lsp_wait_for_diagnostics_ms")]
    pub lsp_wait_for_diagnostics_ms: u64,
    #[serde(default = "default_lsp_max_diagnostics_per_file")]
    pub lsp_max_diagnostics_per_file: u32,
    #[serde(default = "default_lsp_max_files_in_output")]
    pub lsp_max_files_in_output: u32,
}

fn default_lsp_provision_max_attempts() -> u32 {
    3
}

fn default_lsp_wait_for_diagnostics_ms() -> u64 {
    5_000
}

fn default_lsp_max_diagnostics_per_file() -> u32 {
    20
}

fn default_lsp_max_files_in_output() -> u32 {
    10
}

impl Default for LspConfig {
    fn default() -> Self {
        Self {
            lsp_enabled: false,
            lsp_server_config_path: None,
            lsp_auto_provision: true,
            lsp_bootstrap_block_on_failed: false,
            lsp_provision_max_attempts: default_lsp_provision_max_attempts(),
            lsp_wait_for_diagnostics_ms: default_lsp_wait_for_diagnostics_ms(),
            lsp_max_diagnostics_per_file: default_lsp_max_diagnostics_per_file(),
            lsp_max_files_in_output: default_lsp_max_files_in_output(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    #[serde(default = "default_true")]
    pub compaction_enabled: bool,
    #[serde(default = "default_compaction_trigger_ratio")]
    pub compaction_trigger_ratio: f64,
    #[serde(default = "default_compaction_preserve_recent_messages")]
    pub compaction_preserve_recent_messages: u32,
    pub context_window_tokens: Option<u64>,
}

fn default_compaction_trigger_ratio() -> f64 {
    0.8
}

fn default_compaction_preserve_recent_messages() -> u32 {
    10
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            compaction_enabled: true,
            compaction_trigger_ratio: default_compaction_trigger_ratio(),
            compaction_preserve_recent_messages: default_compaction_preserve_recent_messages(),
            context_window_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailsConfig {
    #[serde(default = "default_doom_loop_threshold")]
    pub doom_loop_threshold: u32,
    #[serde(default = "default_stagnation_window")]
    pub stagnation_window: u32,
    #[serde(default = "default_readonly_stagnation_window")]
    pub readonly_stagnation_window: u32,
    #[serde(default = "default_write_regression_error_spike")]
    pub write_regression_error_spike: u32,
}

fn default_doom_loop_threshold() -> u32 {
    3
}

fn default_stagnation_window() -> u32 {
    5
}

fn default_readonly_stagnation_window() -> u32 {
    4
}

fn default_write_regression_error_spike() -> u32 {
    5
}

impl Default for GuardrailsConfig {
    fn default() -> Self {
        Self {
            doom_loop_threshold: default_doom_loop_threshold(),
            stagnation_window: default_stagnation_window(),
            readonly_stagnation_window: default_readonly_stagnation_window(),
            write_regression_error_spike: default_write_regression_error_spike(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorAnalysisPolicy {
    Always,
    OnFailure,
    Never,
}

impl Default for ExecutorAnalysisPolicy {
    fn default() -> Self {
        Self::OnFailure
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    #[serde(default = "default_transient_retry_max_attempts")]
    pub transient_retry_max_attempts: u32,
    #[serde(default = "default_transient_retry_max_delay_ms")]
    pub transient_retry_max_delay_ms: u64,
    pub executor_analysis: ExecutorAnalysisPolicy,
}

fn default_transient_retry_max_attempts() -> u32 {
    3
}

fn default_transient_retry_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            transient_retry_max_attempts: default_transient_retry_max_attempts(),
            transient_retry_max_delay_ms: default_transient_retry_max_delay_ms(),
            executor_analysis: ExecutorAnalysisPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerOutputMode {
    Auto,
    SchemaStrict,
    PromptOnly,
}

impl Default for PlannerOutputMode {
    fn default() -> Self {
        Self::Auto
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub planner_output_mode: PlannerOutputMode,
    #[serde(default = "default_true")]
    pub planner_schema_strict: bool,
    #[serde(default = "default_planner_parse_max_repairs")]
    pub planner_parse_max_repairs: u32,
    #[serde(default = "default_true")]
    pub planner_parse_retry_on_failure: bool,
    #[serde(default = "default_planner_max_invalid_artifact_chars")]
    pub planner_max_invalid_artifact_chars: usize,
}

fn default_planner_parse_max_repairs() -> u32 {
    2
}

fn default_planner_max_invalid_artifact_chars() -> usize {
    4_000
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            planner_output_mode: PlannerOutputMode::default(),
            planner_schema_strict: true,
            planner_parse_max_repairs: default_planner_parse_max_repairs(),
            planner_parse_retry_on_failure: true,
            planner_max_invalid_artifact_chars: default_planner_max_invalid_artifact_chars(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocContextMode {
    Off,
    Targeted,
    Broad,
}

impl Default for DocContextMode {
    fn default() -> Self {
        Self::Targeted
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsConfig {
    pub doc_context_mode: DocContextMode,
    #[serde(default = "default_doc_context_max_files")]
    pub doc_context_max_files: usize,
    #[serde(default = "default_doc_context_max_chars")]
    pub doc_context_max_chars: usize,
}

fn default_doc_context_max_files() -> usize {
    5
}

fn default_doc_context_max_chars() -> usize {
    8_000
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            doc_context_mode: DocContextMode::default(),
            doc_context_max_files: default_doc_context_max_files(),
            doc_context_max_chars: default_doc_context_max_chars(),
        }
    }
}

/// LLM endpoint configuration, consumed by `zace-exec`'s `ChatClient` and
/// reported on by `zace doctor`.
#[derive(Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl LlmConfig {
    pub fn redacted_api_key(&self) -> String {
        mask_api_key(&self.api_key)
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.redacted_api_key())
            .field("model", &self.model)
            .finish()
    }
}

fn mask_api_key(api_key: &str) -> String {
    if api_key.is_empty() {
        return String::new();
    }
    let char_count = api_key.chars().count();
    let prefix: String = api_key.chars().take(3).collect();
    let suffix: String = api_key.chars().skip(char_count.saturating_sub(4)).collect();
    if char_count <= 4 {
        format!("***{suffix}")
    } else {
        format!("{prefix}...{suffix}")
    }
}
