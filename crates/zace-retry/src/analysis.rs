//! Executor analysis: an LLM call that recommends whether a failed tool
//! invocation is worth retrying, and the policy governing when to ask
//! (§4.9).

use async_trait::async_trait;
use zace_core::types::RetryCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorAnalysisPolicy {
    Always,
    OnFailure,
    Never,
}

#[derive(Debug, Clone)]
pub struct ExecutorAnalysis {
    pub analysis: String,
    pub should_retry: bool,
    pub retry_delay_ms: u64,
}

#[async_trait]
pub trait ExecutorAnalysisClient: Send + Sync {
    async fn analyze(&self, command: &str, output: &str, error: Option<&str>) -> ExecutorAnalysis;
}

pub fn should_invoke_analysis(policy: ExecutorAnalysisPolicy, tool_succeeded: bool) -> bool {
    match policy {
        ExecutorAnalysisPolicy::Always => true,
        ExecutorAnalysisPolicy::OnFailure => !tool_succeeded,
        ExecutorAnalysisPolicy::Never => false,
    }
}

/// Clamp an LLM-suggested delay to the hard cap; LLM delays are hints
/// only.
pub fn bounded_retry_delay_ms(requested: u64, retry_max_delay_ms: u64) -> u64 {
    requested.min(retry_max_delay_ms)
}

/// Retry only if the tool failed, attempts remain, analysis recommends
/// retrying, and the category is `transient`.
pub fn should_retry(tool_failed: bool, attempts_remaining: u32, category: RetryCategory, analysis_recommends_retry: bool) -> bool {
    tool_failed && attempts_remaining > 0 && category == RetryCategory::Transient && analysis_recommends_retry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_always_invokes_regardless_of_outcome() {
        assert!(should_invoke_analysis(ExecutorAnalysisPolicy::Always, true));
        assert!(should_invoke_analysis(ExecutorAnalysisPolicy::Always, false));
    }

    #[test]
    fn policy_on_failure_only_invokes_on_failure() {
        assert!(!should_invoke_analysis(ExecutorAnalysisPolicy::OnFailure, true));
        assert!(should_invoke_analysis(ExecutorAnalysisPolicy::OnFailure, false));
    }

    #[test]
    fn policy_never_never_invokes() {
        assert!(!should_invoke_analysis(ExecutorAnalysisPolicy::Never, false));
    }

    #[test]
    fn retry_delay_is_capped() {
        assert_eq!(bounded_retry_delay_ms(10_000, 3_000), 3_000);
        assert_eq!(bounded_retry_delay_ms(1_000, 3_000), 1_000);
    }

    #[test]
    fn should_retry_requires_every_condition() {
        assert!(should_retry(true, 1, RetryCategory::Transient, true));
        assert!(!should_retry(false, 1, RetryCategory::Transient, true));
        assert!(!should_retry(true, 0, RetryCategory::Transient, true));
        assert!(!should_retry(true, 1, RetryCategory::Permanent, true));
        assert!(!should_retry(true, 1, RetryCategory::Transient, false));
    }
}
