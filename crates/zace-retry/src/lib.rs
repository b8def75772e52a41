//! Retry classification and bounded executor analysis (§4.9).

mod analysis;
mod classify;

pub use analysis::{bounded_retry_delay_ms, should_invoke_analysis, should_retry, ExecutorAnalysis, ExecutorAnalysisClient, ExecutorAnalysisPolicy};
pub use classify::classify_tool_failure;
