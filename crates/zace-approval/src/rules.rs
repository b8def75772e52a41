//! Approval rule store: persisted allow/deny decisions scoped to a
//! session or a workspace (§4.3).

use std::fs;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use zace_core::types::{ApprovalDecision, ApprovalRule, ApprovalScope};
use zace_core::RunError;

/// On-disk shape of the approval rules file: `{ "rules": [ ApprovalRule, … ] }`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RulesFile {
    #[serde(default)]
    rules: Vec<ApprovalRule>,
}

/// Load the rules file, returning an empty list if it does not exist yet.
pub fn load_approval_rules(path: &Path) -> Result<Vec<ApprovalRule>, RunError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path).map_err(|source| RunError::ApprovalRulesIo {
        path: path.display().to_string(),
        source,
    })?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let file: RulesFile = serde_json::from_str(&raw).map_err(|source| RunError::ApprovalRulesParse {
        path: path.display().to_string(),
        source,
    })?;
    Ok(file.rules)
}

/// Atomically rewrite the rules file via a temp file + rename.
pub fn save_approval_rules(path: &Path, rules: &[ApprovalRule]) -> Result<(), RunError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| RunError::ApprovalRulesIo {
            path: path.display().to_string(),
            source,
        })?;
    }
    let file = RulesFile { rules: rules.to_vec() };
    let serialized = serde_json::to_string_pretty(&file).map_err(|source| RunError::ApprovalRulesParse {
        path: path.display().to_string(),
        source,
    })?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, serialized).map_err(|source| RunError::ApprovalRulesIo {
        path: tmp_path.display().to_string(),
        source,
    })?;
    fs::rename(&tmp_path, path).map_err(|source| RunError::ApprovalRulesIo {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

/// Split a `/body/flags` pattern into its regex body and flag letters, or
/// `None` when `pattern` is not wrapped in slashes (§3: a pattern is either
/// literal equality or a `/src/flags` regex).
fn regex_parts(pattern: &str) -> Option<(&str, &str)> {
    let body = pattern.strip_prefix('/')?;
    let slash = body.rfind('/')?;
    Some((&body[..slash], &body[slash + 1..]))
}

/// Whether `pattern` matches `command_signature`, as a regex when `pattern`
/// has the `/src/flags` shape, otherwise as literal equality. An invalid
/// regex body never matches rather than panicking on a malformed rule.
fn pattern_matches(pattern: &str, command_signature: &str) -> bool {
    let Some((body, flags)) = regex_parts(pattern) else {
        return pattern == command_signature;
    };
    let inline_flags: String = flags.chars().filter(|c| "imsx".contains(*c)).collect();
    let source = if inline_flags.is_empty() { body.to_string() } else { format!("(?{inline_flags}){body}") };
    Regex::new(&source).is_ok_and(|re| re.is_match(command_signature))
}

/// Select the newest rule (by `createdAt`) whose pattern matches
/// `command_signature` and whose scope is satisfied.
pub fn find_approval_rule_decision(
    rules: &[ApprovalRule],
    command_signature: &str,
    workspace_root: &str,
    session_id: &str,
) -> Option<ApprovalDecision> {
    rules
        .iter()
        .filter(|rule| pattern_matches(&rule.pattern, command_signature))
        .filter(|rule| match rule.scope {
            ApprovalScope::Workspace => rule.workspace_root == workspace_root,
            ApprovalScope::Session => rule.session_id.as_deref() == Some(session_id),
        })
        .max_by_key(|rule| rule.created_at)
        .map(|rule| rule.decision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tempfile::tempdir;

    fn rule(pattern: &str, decision: ApprovalDecision, scope: ApprovalScope, age_secs: i64) -> ApprovalRule {
        ApprovalRule {
            pattern: pattern.into(),
            decision,
            scope,
            session_id: Some("sess-1".into()),
            workspace_root: "/repo".into(),
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempdir().unwrap();
        let rules = load_approval_rules(&dir.path().join("rules.json")).unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.json");
        let rules = vec![rule("rm *", ApprovalDecision::Deny, ApprovalScope::Workspace, 0)];
        save_approval_rules(&path, &rules).unwrap();
        let loaded = load_approval_rules(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].pattern, "rm *");
    }

    #[test]
    fn picks_newest_matching_rule() {
        let rules = vec![
            rule("npm test", ApprovalDecision::Deny, ApprovalScope::Workspace, 100),
            rule("npm test", ApprovalDecision::Allow, ApprovalScope::Workspace, 10),
        ];
        let decision = find_approval_rule_decision(&rules, "npm test", "/repo", "sess-1").unwrap();
        assert_eq!(decision, ApprovalDecision::Allow);
    }

    #[test]
    fn workspace_scope_requires_matching_root() {
        let rules = vec![rule("npm test", ApprovalDecision::Allow, ApprovalScope::Workspace, 0)];
        assert!(find_approval_rule_decision(&rules, "npm test", "/other", "sess-1").is_none());
    }

    #[test]
    fn session_scope_requires_matching_session_id() {
        let rules = vec![rule("npm test", ApprovalDecision::Allow, ApprovalScope::Session, 0)];
        assert!(find_approval_rule_decision(&rules, "npm test", "/repo", "sess-2").is_none());
        assert!(find_approval_rule_decision(&rules, "npm test", "/repo", "sess-1").is_some());
    }

    #[test]
    fn no_matching_pattern_returns_none() {
        let rules = vec![rule("npm test", ApprovalDecision::Allow, ApprovalScope::Workspace, 0)];
        assert!(find_approval_rule_decision(&rules, "npm build", "/repo", "sess-1").is_none());
    }

    #[test]
    fn regex_pattern_matches_any_signature_it_covers() {
        let rules = vec![rule("/^npm (test|build)$/", ApprovalDecision::Allow, ApprovalScope::Workspace, 0)];
        assert_eq!(find_approval_rule_decision(&rules, "npm test", "/repo", "sess-1"), Some(ApprovalDecision::Allow));
        assert_eq!(find_approval_rule_decision(&rules, "npm build", "/repo", "sess-1"), Some(ApprovalDecision::Allow));
        assert!(find_approval_rule_decision(&rules, "npm publish", "/repo", "sess-1").is_none());
    }

    #[test]
    fn regex_pattern_honors_case_insensitive_flag() {
        let rules = vec![rule("/^NPM TEST$/i", ApprovalDecision::Deny, ApprovalScope::Workspace, 0)];
        assert_eq!(find_approval_rule_decision(&rules, "npm test", "/repo", "sess-1"), Some(ApprovalDecision::Deny));
    }

    #[test]
    fn invalid_regex_pattern_never_matches() {
        let rules = vec![rule("/[/", ApprovalDecision::Allow, ApprovalScope::Workspace, 0)];
        assert!(find_approval_rule_decision(&rules, "/[/", "/repo", "sess-1").is_none());
    }
}
