//! Deterministic retry classification from exit code and error text
//! (§4.9). Only `transient` ever permits a retry.

use std::sync::OnceLock;

use regex::Regex;
use zace_core::types::RetryCategory;

fn transient_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)timed? ?out|connection reset|connection refused|temporary failure|rate limit|429|too many requests|econnreset|etimedout|enotfound|network is unreachable")
            .expect("valid regex")
    })
}

fn permanent_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)syntax error|command not found|no such file or directory|permission denied|unknown option|invalid argument|not recognized as an internal")
            .expect("valid regex")
    })
}

/// Classify a failed tool invocation into a retry category.
pub fn classify_tool_failure(exit_code: Option<i32>, error_text: &str) -> RetryCategory {
    if transient_pattern().is_match(error_text) {
        return RetryCategory::Transient;
    }
    if permanent_pattern().is_match(error_text) {
        return RetryCategory::Permanent;
    }
    match exit_code {
        Some(124) | Some(137) => RetryCategory::Transient, // timeout / killed
        Some(127) => RetryCategory::Permanent,             // command not found
        _ => RetryCategory::Unknown,
    }
}
