//! Legacy `COMPLETE:`/`BLOCKED:`/`ASK_USER:` text-prefix parsing (tier 2,
//! §4.2 step 3).

use zace_core::types::{PlanAction, PlanResult};

const GATES_SEPARATOR: &str = ";;";

/// Parse a reply that begins with one of the three legacy prefixes.
/// Returns `None` if no recognized prefix is present.
pub fn parse_legacy_prefixes(raw_text: &str) -> Option<PlanResult> {
    let trimmed = raw_text.trim_start();

    if let Some(rest) = trimmed.strip_prefix("COMPLETE:") {
        return Some(parse_complete(rest));
    }
    if let Some(rest) = trimmed.strip_prefix("BLOCKED:") {
        return Some(PlanResult {
            action: Some(PlanAction::Blocked),
            reasoning: rest.trim().to_string(),
            ..Default::default()
        });
    }
    if let Some(rest) = trimmed.strip_prefix("ASK_USER:") {
        let message = rest.trim().to_string();
        return Some(PlanResult {
            action: Some(PlanAction::AskUser),
            reasoning: message.clone(),
            user_message: Some(message),
            ..Default::default()
        });
    }
    None
}

fn parse_complete(rest: &str) -> PlanResult {
    let mut reasoning_lines = Vec::new();
    let mut gate_commands = Vec::new();
    let mut gates_declared_none = false;

    for line in rest.lines() {
        let line = line.trim();
        if let Some(gates) = line.strip_prefix("GATES:") {
            let gates = gates.trim();
            if gates.eq_ignore_ascii_case("none") {
                gates_declared_none = true;
            } else {
                gate_commands.extend(
                    gates
                        .split(GATES_SEPARATOR)
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string),
                );
            }
        } else if !line.is_empty() {
            reasoning_lines.push(line.to_string());
        }
    }

    let first_line = rest.lines().next().unwrap_or("").trim().to_string();
    let reasoning = if reasoning_lines.is_empty() {
        first_line
    } else {
        reasoning_lines.join(" ")
    };

    PlanResult {
        action: Some(PlanAction::Complete),
        reasoning,
        completion_gate_commands: gate_commands,
        completion_gates_declared_none: gates_declared_none,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_prefix_captures_reasoning() {
        let result = parse_legacy_prefixes("BLOCKED: cannot find the referenced file").unwrap();
        assert_eq!(result.action, Some(PlanAction::Blocked));
        assert_eq!(result.reasoning, "cannot find the referenced file");
    }

    #[test]
    fn ask_user_prefix_sets_user_message() {
        let result = parse_legacy_prefixes("ASK_USER: which branch should I target?").unwrap();
        assert_eq!(result.action, Some(PlanAction::AskUser));
        assert_eq!(result.user_message.as_deref(), Some("which branch should I target?"));
    }

    #[test]
    fn complete_with_multiple_gates() {
        let result = parse_legacy_prefixes("COMPLETE: all done\nGATES: npm test;;npm run lint").unwrap();
        assert_eq!(result.action, Some(PlanAction::Complete));
        assert_eq!(result.completion_gate_commands, vec!["npm test", "npm run lint"]);
        assert!(!result.completion_gates_declared_none);
    }

    #[test]
    fn complete_with_gates_none() {
        let result = parse_legacy_prefixes("COMPLETE: done\nGATES: none").unwrap();
        assert!(result.completion_gates_declared_none);
        assert!(result.completion_gate_commands.is_empty());
    }

    #[test]
    fn no_prefix_returns_none() {
        assert!(parse_legacy_prefixes("just some text").is_none());
    }

    #[test]
    fn leading_whitespace_before_prefix_is_tolerated() {
        let result = parse_legacy_prefixes("   BLOCKED: stuck").unwrap();
        assert_eq!(result.action, Some(PlanAction::Blocked));
    }
}
