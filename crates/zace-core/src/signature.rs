//! Canonical signatures for tool calls (§4.1).
//!
//! Two distinct signatures are produced from the same inputs:
//! - the *planned* signature, used for doom-loop detection before a call
//!   runs and for approval-rule matching;
//! - the *loop* signature, computed from a finished call's output, which
//!   additionally collapses artifact paths and UUIDs so textually noisy but
//!   semantically identical repeats are still recognized as a loop.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

const LOOP_SIGNATURE_MAX_LEN: usize = 400;

fn uuid_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
        )
        .expect("valid uuid regex")
    })
}

fn artifact_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^.*(?:stdout|stderr|combined)[^\n]*artifact[^\n]*$")
            .expect("valid artifact-line regex")
    })
}

/// Serialize a JSON value with object keys sorted recursively, producing a
/// stable byte-for-byte representation for logically equal objects.
pub fn stable_json(value: &Value) -> String {
    serde_json::to_string(&sort_value(value)).expect("serializable value")
}

fn sort_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), sort_value(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_value).collect()),
        other => other.clone(),
    }
}

/// True if `token` looks like a filesystem path.
fn looks_like_path(token: &str) -> bool {
    token.contains('/')
        || token.contains('\\')
        || token.starts_with("./")
        || token.starts_with("../")
        || token.starts_with('.')
        || token.starts_with('/')
        || (token.len() > 1 && token.as_bytes()[1] == b':') // windows drive letter
}

fn to_forward_slashes(token: &str) -> String {
    token.replace('\\', "/")
}

fn relativize(token: &str, cwd: &Path) -> String {
    let normalized = to_forward_slashes(token);
    let candidate = Path::new(&normalized);
    if candidate.is_absolute() {
        if let Ok(rel) = candidate.strip_prefix(cwd) {
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            if rel_str.is_empty() {
                return ".".to_string();
            }
            return rel_str;
        }
    }
    normalized
}

fn normalize_token(token: &str, cwd: &Path) -> String {
    if let Some((key, value)) = token.split_once('=') {
        if !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return format!("{key}={}", normalize_token(value, cwd));
        }
    }

    let (quote, inner) = match token.chars().next() {
        Some('"') if token.ends_with('"') && token.len() >= 2 => {
            (Some('"'), &token[1..token.len() - 1])
        }
        Some('\'') if token.ends_with('\'') && token.len() >= 2 => {
            (Some('\''), &token[1..token.len() - 1])
        }
        _ => (None, token),
    };

    let normalized = if looks_like_path(inner) {
        relativize(inner, cwd)
    } else {
        inner.to_string()
    };

    match quote {
        Some(q) => format!("{q}{normalized}{q}"),
        None => normalized,
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonicalize an `execute_command`-style `{command, cwd}` argument pair.
///
/// `cwd` defaults to `default_cwd` (the process working directory) when
/// absent or empty. Returns the canonical `(command, cwd)` pair used to
/// build the final signature string.
pub fn canonicalize_execute_command(
    command: &str,
    cwd: Option<&str>,
    default_cwd: &Path,
) -> (String, PathBuf) {
    let resolved_cwd = match cwd {
        Some(c) if !c.trim().is_empty() => {
            let p = PathBuf::from(to_forward_slashes(c));
            if p.is_absolute() {
                p
            } else {
                default_cwd.join(p)
            }
        }
        _ => default_cwd.to_path_buf(),
    };

    let collapsed = collapse_whitespace(command);
    let normalized_command = collapsed
        .split(' ')
        .map(|tok| normalize_token(tok, &resolved_cwd))
        .collect::<Vec<_>>()
        .join(" ");

    (normalized_command, resolved_cwd)
}

/// Build the stable signature `toolName|stable_json(argumentsObject)` for a
/// generic tool call, with `execute_command` given special path/cwd
/// canonicalization first.
pub fn build_tool_call_signature(tool_name: &str, arguments: &Value, default_cwd: &Path) -> String {
    let canonical_args = if tool_name == "execute_command" {
        let command = arguments.get("command").and_then(Value::as_str).unwrap_or("");
        let cwd = arguments.get("cwd").and_then(Value::as_str);
        let (command, resolved_cwd) = canonicalize_execute_command(command, cwd, default_cwd);
        serde_json::json!({
            "command": command,
            "cwd": resolved_cwd.to_string_lossy(),
        })
    } else {
        arguments.clone()
    };

    format!("{tool_name}|{}", stable_json(&canonical_args))
}

/// Build the post-execution loop signature: the planned signature composed
/// with a noise-stripped digest of the tool's combined output.
pub fn build_loop_signature(planned_signature: &str, combined_output: &str) -> String {
    let without_artifacts = artifact_line_regex().replace_all(combined_output, "<artifact>");
    let without_uuids = uuid_regex().replace_all(&without_artifacts, "<uuid>");
    let collapsed = collapse_whitespace(&without_uuids);
    let truncated: String = collapsed.chars().take(LOOP_SIGNATURE_MAX_LEN).collect();
    format!("{planned_signature}::{truncated}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn signature_is_invariant_under_relative_absolute_cwd_equivalence() {
        let cwd = Path::new("/repo");
        let a = build_tool_call_signature(
            "execute_command",
            &serde_json::json!({"command": "ls -la src", "cwd": "/repo"}),
            cwd,
        );
        let b = build_tool_call_signature(
            "execute_command",
            &serde_json::json!({"command": "ls -la /repo/src", "cwd": "/repo"}),
            cwd,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn stable_json_sorts_object_keys() {
        let a = stable_json(&serde_json::json!({"b": 1, "a": 2}));
        let b = stable_json(&serde_json::json!({"a": 2, "b": 1}));
        assert_eq!(a, b);
        assert_eq!(a, r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn key_value_token_normalizes_only_the_value() {
        let cwd = Path::new("/repo");
        let (command, _) = canonicalize_execute_command("FOO=/repo/src/x.rs run", None, cwd);
        assert_eq!(command, "FOO=src/x.rs run");
    }

    #[test]
    fn missing_cwd_defaults_to_process_cwd() {
        let cwd = Path::new("/repo");
        let (_, resolved) = canonicalize_execute_command("ls", None, cwd);
        assert_eq!(resolved, cwd);
    }

    #[test]
    fn loop_signature_collapses_artifact_lines_and_uuids() {
        let planned = "execute_command|{}";
        let out_a = "stdout artifact path: /tmp/run-a1b2c3d4-e5f6-7890-abcd-ef1234567890/out.log\nOK";
        let out_b = "stdout artifact path: /tmp/run-11111111-2222-3333-4444-555555555555/out.log\nOK";
        assert_eq!(
            build_loop_signature(planned, out_a),
            build_loop_signature(planned, out_b)
        );
    }

    #[test]
    fn loop_signature_truncates_to_max_len() {
        let planned = "execute_command|{}";
        let huge = "x".repeat(2000);
        let sig = build_loop_signature(planned, &huge);
        let suffix = sig.strip_prefix(planned).unwrap().strip_prefix("::").unwrap();
        assert_eq!(suffix.len(), LOOP_SIGNATURE_MAX_LEN);
    }

    #[test]
    fn quoted_tokens_are_requoted_after_normalization() {
        let cwd = Path::new("/repo");
        let (command, _) = canonicalize_execute_command("cat '/repo/a.txt'", None, cwd);
        assert_eq!(command, "cat 'a.txt'");
    }
}
