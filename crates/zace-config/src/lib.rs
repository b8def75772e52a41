//! Project configuration loading and validation (`.zace/config.toml`, §4.11).

mod config;
mod model;
pub mod paths;
pub mod validate;

pub use config::{load, save};
pub use model::{
    ApprovalConfig, CompactionConfig, CompletionConfig, CompletionValidationMode, DocContextMode,
    DocsConfig, ExecutorAnalysisPolicy, GuardrailsConfig, LlmConfig, LspConfig, PlannerConfig,
    PlannerOutputMode, RetryConfig, ZaceConfig,
};
pub use validate::{validate_config, ConfigValidationError, ValidationIssue};
