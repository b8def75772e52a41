//! Tool-aware validation of a structured planner reply, shared by the
//! schema-transport and JSON-extraction tiers.

use serde_json::Value;
use zace_core::types::{PlanAction, PlanResult, ToolCall};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaValidationError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("'{0}' must be a string")]
    NotAString(&'static str),
    #[error("unrecognized action '{0}'")]
    UnknownAction(String),
    #[error("execute_command requires a 'command' argument")]
    MissingCommand,
    #[error("session tool requires a 'sessionId' argument")]
    MissingSessionId,
    #[error("session write requires a 'content' argument")]
    MissingContent,
}

/// Validate a tool call against the per-tool schema named in §4.2: a
/// `toolCall` must always carry the arguments its tool requires.
pub fn validate_schema_tool_call(call: &ToolCall) -> Result<(), SchemaValidationError> {
    match call.name.as_str() {
        "execute_command" => {
            if call.string_arg("command").is_none() {
                return Err(SchemaValidationError::MissingCommand);
            }
        }
        "search_session_messages" => {
            if call.string_arg("sessionId").is_none() {
                return Err(SchemaValidationError::MissingSessionId);
            }
        }
        "write_session_message" => {
            if call.string_arg("sessionId").is_none() {
                return Err(SchemaValidationError::MissingSessionId);
            }
            if call.string_arg("content").is_none() {
                return Err(SchemaValidationError::MissingContent);
            }
        }
        _ => {}
    }
    Ok(())
}

fn parse_action(raw: &str) -> Result<PlanAction, SchemaValidationError> {
    match raw {
        "continue" => Ok(PlanAction::Continue),
        "complete" => Ok(PlanAction::Complete),
        "blocked" => Ok(PlanAction::Blocked),
        "ask_user" => Ok(PlanAction::AskUser),
        other => Err(SchemaValidationError::UnknownAction(other.to_string())),
    }
}

/// Build a [`PlanResult`] from a structured JSON value, validating the
/// shape and any embedded tool call.
pub fn plan_result_from_structured(value: &Value) -> Result<PlanResult, SchemaValidationError> {
    let action_raw = value
        .get("action")
        .and_then(Value::as_str)
        .ok_or(SchemaValidationError::MissingField("action"))?;
    let action = parse_action(action_raw)?;

    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let user_message = value
        .get("userMessage")
        .map(|v| v.as_str().map(str::to_string).ok_or(SchemaValidationError::NotAString("userMessage")))
        .transpose()?;

    let tool_call = match value.get("toolCall") {
        Some(raw) if !raw.is_null() => {
            let call: ToolCall = serde_json::from_value(raw.clone())
                .map_err(|_| SchemaValidationError::MissingField("toolCall"))?;
            validate_schema_tool_call(&call)?;
            Some(call)
        }
        _ => None,
    };

    let completion_gate_commands = value
        .get("completionGateCommands")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    let completion_gates_declared_none = value
        .get("completionGatesDeclaredNone")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(PlanResult {
        action: Some(action),
        reasoning,
        user_message,
        tool_call,
        completion_gate_commands,
        completion_gates_declared_none,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn call(name: &str, args: &[(&str, &str)]) -> ToolCall {
        let mut arguments = HashMap::new();
        for (k, v) in args {
            arguments.insert(k.to_string(), Value::String(v.to_string()));
        }
        ToolCall {
            name: name.to_string(),
            arguments,
        }
    }

    #[test]
    fn execute_command_requires_command_argument() {
        assert!(validate_schema_tool_call(&call("execute_command", &[])).is_err());
        assert!(validate_schema_tool_call(&call("execute_command", &[("command", "ls")])).is_ok());
    }

    #[test]
    fn session_write_requires_session_id_and_content() {
        assert_eq!(
            validate_schema_tool_call(&call("write_session_message", &[])),
            Err(SchemaValidationError::MissingSessionId)
        );
        assert_eq!(
            validate_schema_tool_call(&call("write_session_message", &[("sessionId", "s1")])),
            Err(SchemaValidationError::MissingContent)
        );
        assert!(validate_schema_tool_call(&call(
            "write_session_message",
            &[("sessionId", "s1"), ("content", "hi")]
        ))
        .is_ok());
    }

    #[test]
    fn unknown_tool_names_are_treated_opaquely() {
        assert!(validate_schema_tool_call(&call("some_future_tool", &[])).is_ok());
    }

    #[test]
    fn plan_result_from_structured_rejects_unknown_action() {
        let value = serde_json::json!({"action": "what", "reasoning": "x"});
        assert!(matches!(
            plan_result_from_structured(&value),
            Err(SchemaValidationError::UnknownAction(_))
        ));
    }

    #[test]
    fn plan_result_from_structured_parses_continue_with_tool_call() {
        let value = serde_json::json!({
            "action": "continue",
            "reasoning": "listing files",
            "toolCall": {"name": "execute_command", "arguments": {"command": "ls -la"}}
        });
        let result = plan_result_from_structured(&value).unwrap();
        assert_eq!(result.action, Some(PlanAction::Continue));
        assert_eq!(result.tool_call.unwrap().name, "execute_command");
    }

    #[test]
    fn plan_result_from_structured_rejects_invalid_embedded_tool_call() {
        let value = serde_json::json!({
            "action": "continue",
            "reasoning": "x",
            "toolCall": {"name": "execute_command", "arguments": {}}
        });
        assert_eq!(plan_result_from_structured(&value), Err(SchemaValidationError::MissingCommand));
    }
}
