//! Parses a planner reply into a [`PlanResult`] (§4.2).
//!
//! Parsing order: schema-transport mode, then legacy text prefixes, then a
//! best-effort JSON extraction with a bounded repair budget, finally a
//! failure artifact when nothing parses.

mod legacy;
mod repair;
mod schema;

use std::fs;
use std::path::Path;

use chrono::Utc;
use zace_core::types::{ParseMode, PlanAction, PlanResult};

pub use legacy::parse_legacy_prefixes;
pub use repair::{extract_json_payload, repair_json};
pub use schema::{validate_schema_tool_call, SchemaValidationError};

/// Planner output transport mode, matching the `plannerOutputMode` config
/// option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerOutputMode {
    Auto,
    SchemaStrict,
    PromptOnly,
}

/// What the transport actually returned for one planner call.
#[derive(Debug, Clone, Default)]
pub struct TransportReply {
    /// Structured JSON the transport parsed for us, when `responseFormat`
    /// was honored.
    pub structured: Option<serde_json::Value>,
    /// True when the transport reported `response_format` is unsupported.
    pub response_format_unsupported: bool,
    /// Raw text reply, used for legacy/JSON-extraction fallback and for
    /// the invalid-output artifact.
    pub raw_text: String,
}

/// Bounds on the parser's fallback behavior.
#[derive(Debug, Clone, Copy)]
pub struct ParserLimits {
    pub max_repairs: u32,
    pub max_invalid_artifact_chars: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_repairs: 2,
            max_invalid_artifact_chars: 8 * 1024,
        }
    }
}

/// Parse one planner reply, writing a failure artifact under
/// `<project_root>/.zace/runtime/planner/` if every parsing tier fails.
pub fn parse_planner_reply(
    reply: &TransportReply,
    mode: PlannerOutputMode,
    limits: ParserLimits,
    project_root: &Path,
) -> PlanResult {
    let mut attempts = 0u32;
    let mut raw_invalid_count = 0u32;

    // Tier 1: schema transport.
    if matches!(mode, PlannerOutputMode::Auto | PlannerOutputMode::SchemaStrict) {
        if let Some(structured) = &reply.structured {
            attempts += 1;
            match schema::plan_result_from_structured(structured) {
                Ok(mut result) => {
                    result.parse_mode = Some(ParseMode::SchemaTransport);
                    result.parse_attempts = attempts;
                    return result;
                }
                Err(_) => {
                    raw_invalid_count += 1;
                }
            }
        }

        if reply.response_format_unsupported {
            if mode == PlannerOutputMode::SchemaStrict {
                return PlanResult {
                    action: Some(PlanAction::Blocked),
                    reasoning: "planner transport does not support structured responses".into(),
                    parse_mode: Some(ParseMode::Failed),
                    parse_attempts: attempts,
                    raw_invalid_count,
                    schema_unsupported_reason: Some("response_format_unsupported".into()),
                    ..Default::default()
                };
            }
            // mode == Auto: fall through to tier 2/3 below.
        }
    }

    // Tier 2: legacy text prefixes.
    attempts += 1;
    if let Some(mut result) = legacy::parse_legacy_prefixes(&reply.raw_text) {
        result.parse_mode = Some(ParseMode::Legacy);
        result.parse_attempts = attempts;
        return result;
    }

    // Tier 3: best-effort JSON extraction with bounded repair.
    attempts += 1;
    if let Some(payload) = repair::extract_json_payload(&reply.raw_text) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&payload) {
            if let Ok(mut result) = schema::plan_result_from_structured(&value) {
                result.parse_mode = Some(ParseMode::JsonStrict);
                result.parse_attempts = attempts;
                return result;
            }
        }

        let mut repairs_used = 0u32;
        let mut candidate = payload;
        while repairs_used < limits.max_repairs {
            match repair::repair_json(&candidate, repairs_used) {
                Some(repaired) => {
                    candidate = repaired;
                    repairs_used += 1;
                    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&candidate) {
                        if let Ok(mut result) = schema::plan_result_from_structured(&value) {
                            result.parse_mode = Some(ParseMode::RepairJson);
                            result.parse_attempts = attempts + repairs_used;
                            return result;
                        }
                    }
                }
                None => break,
            }
        }
    }
    raw_invalid_count += 1;

    // All tiers failed: persist the raw reply and return a blocked result.
    let artifact_path = write_invalid_artifact(project_root, &reply.raw_text, limits.max_invalid_artifact_chars);

    PlanResult {
        action: Some(PlanAction::Blocked),
        reasoning: "planner reply could not be parsed".into(),
        parse_mode: Some(ParseMode::Failed),
        parse_attempts: attempts,
        raw_invalid_count,
        invalid_output_artifact_path: artifact_path,
        ..Default::default()
    }
}

fn write_invalid_artifact(project_root: &Path, raw_text: &str, max_chars: usize) -> Option<String> {
    let dir = project_root.join(".zace").join("runtime").join("planner");
    fs::create_dir_all(&dir).ok()?;
    let timestamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let path = dir.join(format!("invalid-{timestamp}.txt"));
    let truncated: String = raw_text.chars().take(max_chars).collect();
    fs::write(&path, truncated).ok()?;
    Some(path.to_string_lossy().into_owned())
}
