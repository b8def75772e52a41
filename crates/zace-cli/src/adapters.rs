//! LLM-backed implementations of the four classifier/prober traits the
//! loop consumes but doesn't implement (§6): safety classification,
//! approval-reply classification, executor analysis, and LSP file
//! probing. Each calls the configured chat transport with a dedicated
//! prompt and falls back to an unclassified/neutral result on a
//! malformed reply — the deterministic fallback for destructive-command
//! classification itself lives in `zace_approval` and runs automatically
//! whenever `classify` returns `Err`.

use async_trait::async_trait;
use serde::Deserialize;

use zace_approval::{ReplyClassifier, ReplyIntent, SafetyClassification, SafetyClassifier, SafetyContext};
use zace_core::traits::{CallKind, ChatClient, ChatRequest};
use zace_core::types::{LspStatus, Message, Role};
use zace_lsp::FileProber;
use zace_retry::{ExecutorAnalysis, ExecutorAnalysisClient};

/// Shared by every adapter: issue one chat call asking for a JSON object
/// and return its raw text.
async fn ask(chat: &dyn ChatClient, call_kind: CallKind, system_prompt: &str, user_prompt: String) -> Result<String, String> {
    let request = ChatRequest {
        messages: vec![Message::new(Role::System, system_prompt), Message::new(Role::User, user_prompt)],
        call_kind: Some(call_kind),
        response_format: None,
    };
    chat.chat(request).await.map(|reply| reply.content).map_err(|err| err.to_string())
}

/// Extracts the first top-level JSON object substring from `text`, since
/// chat transports often wrap JSON in prose or a code fence.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0i32;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

pub struct LlmSafetyClassifier<'a> {
    pub chat: &'a dyn ChatClient,
}

#[derive(Deserialize)]
struct SafetyReply {
    destructive: bool,
    #[serde(default)]
    reason: Option<String>,
}

const SAFETY_SYSTEM_PROMPT: &str = "You judge whether a shell command is destructive (irreversibly deletes or \
overwrites data, or otherwise causes damage outside the working directory). Reply with a single \
JSON object: {\"destructive\": bool, \"reason\": string|null}. No other text.";

#[async_trait]
impl SafetyClassifier for LlmSafetyClassifier<'_> {
    async fn classify(&self, command: &str, context: &SafetyContext) -> Result<SafetyClassification, String> {
        let prompt = format!(
            "command: {command}\nworking_directory: {}\noverwrite_redirect_targets: {}",
            context.working_directory,
            serde_json::to_string(&context.overwrite_redirect_targets).unwrap_or_default(),
        );
        let content = ask(self.chat, CallKind::Safety, SAFETY_SYSTEM_PROMPT, prompt).await?;
        let json = extract_json_object(&content).ok_or_else(|| "no JSON object in safety reply".to_string())?;
        let reply: SafetyReply = serde_json::from_str(json).map_err(|e| e.to_string())?;
        Ok(SafetyClassification { destructive: reply.destructive, reason: reply.reason })
    }
}

pub struct LlmReplyClassifier<'a> {
    pub chat: &'a dyn ChatClient,
}

#[derive(Deserialize)]
struct ReplyIntentReply {
    intent: String,
}

const REPLY_SYSTEM_PROMPT: &str = "You classify a user's reply to a pending command-approval prompt into one of: \
allow_once, allow_always_session, allow_always_workspace, deny, unclear. Reply with a single JSON \
object: {\"intent\": \"<one of the above>\"}. No other text.";

fn parse_reply_intent(raw: &str) -> Option<ReplyIntent> {
    match raw {
        "allow_once" => Some(ReplyIntent::AllowOnce),
        "allow_always_session" => Some(ReplyIntent::AllowAlwaysSession),
        "allow_always_workspace" => Some(ReplyIntent::AllowAlwaysWorkspace),
        "deny" => Some(ReplyIntent::Deny),
        "unclear" => Some(ReplyIntent::Unclear),
        _ => None,
    }
}

#[async_trait]
impl ReplyClassifier for LlmReplyClassifier<'_> {
    async fn classify(&self, reply_text: &str) -> Result<ReplyIntent, String> {
        let content = ask(self.chat, CallKind::Approval, REPLY_SYSTEM_PROMPT, reply_text.to_string()).await?;
        let json = extract_json_object(&content).ok_or_else(|| "no JSON object in reply-intent reply".to_string())?;
        let reply: ReplyIntentReply = serde_json::from_str(json).map_err(|e| e.to_string())?;
        parse_reply_intent(&reply.intent).ok_or_else(|| format!("unrecognized intent '{}'", reply.intent))
    }
}

pub struct LlmExecutorAnalysisClient<'a> {
    pub chat: &'a dyn ChatClient,
}

#[derive(Deserialize)]
struct ExecutorAnalysisReply {
    analysis: String,
    should_retry: bool,
    #[serde(default)]
    retry_delay_ms: Option<u64>,
}

const EXECUTOR_ANALYSIS_SYSTEM_PROMPT: &str = "You analyze a failed or completed tool invocation and recommend \
whether it is worth retrying. Reply with a single JSON object: {\"analysis\": string, \
\"should_retry\": bool, \"retry_delay_ms\": integer}. No other text.";

#[async_trait]
impl ExecutorAnalysisClient for LlmExecutorAnalysisClient<'_> {
    async fn analyze(&self, command: &str, output: &str, error: Option<&str>) -> ExecutorAnalysis {
        let prompt = format!("command: {command}\noutput: {output}\nerror: {}", error.unwrap_or("<none>"));
        let fallback = ExecutorAnalysis { analysis: "analysis unavailable".to_string(), should_retry: false, retry_delay_ms: 0 };
        let Ok(content) = ask(self.chat, CallKind::Executor, EXECUTOR_ANALYSIS_SYSTEM_PROMPT, prompt).await else {
            return fallback;
        };
        let Some(json) = extract_json_object(&content) else {
            return fallback;
        };
        match serde_json::from_str::<ExecutorAnalysisReply>(json) {
            Ok(reply) => ExecutorAnalysis { analysis: reply.analysis, should_retry: reply.should_retry, retry_delay_ms: reply.retry_delay_ms.unwrap_or(0) },
            Err(_) => fallback,
        }
    }
}

/// Probes changed files for diagnostics by asking the configured LLM to
/// reason over their current contents, since no real LSP client
/// subprocess is wired up here (out of scope per §1 — LSP client
/// subprocess management is a `ToolExecutor` concern). A missing/empty
/// file list, or any transport error, reports `NoChangedFiles`/`Failed`
/// rather than guessing.
pub struct LlmFileProber<'a> {
    pub chat: &'a dyn ChatClient,
}

#[derive(Deserialize)]
struct FileProbeReply {
    status: String,
}

const FILE_PROBE_SYSTEM_PROMPT: &str = "You report whether the listed changed files appear to contain diagnostics \
(syntax errors, obvious type errors). Reply with a single JSON object: {\"status\": \
\"diagnostics\"|\"no_errors\"|\"no_applicable_files\"}. No other text.";

fn parse_lsp_status(raw: &str) -> Option<LspStatus> {
    match raw {
        "diagnostics" => Some(LspStatus::Diagnostics),
        "no_errors" => Some(LspStatus::NoErrors),
        "no_applicable_files" => Some(LspStatus::NoApplicableFiles),
        _ => None,
    }
}

#[async_trait]
impl FileProber for LlmFileProber<'_> {
    async fn probe_files(&self, changed_files: &[String]) -> Result<LspStatus, String> {
        if changed_files.is_empty() {
            return Ok(LspStatus::NoChangedFiles);
        }
        let prompt = format!("changed_files: {}", changed_files.join(", "));
        let content = ask(self.chat, CallKind::Executor, FILE_PROBE_SYSTEM_PROMPT, prompt).await?;
        let json = extract_json_object(&content).ok_or_else(|| "no JSON object in file-probe reply".to_string())?;
        let reply: FileProbeReply = serde_json::from_str(json).map_err(|e| e.to_string())?;
        parse_lsp_status(&reply.status).ok_or_else(|| format!("unrecognized lsp status '{}'", reply.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_object_finds_object_in_prose() {
        let text = "Sure, here you go:\n{\"destructive\": true, \"reason\": \"rm -rf\"}\nHope that helps.";
        assert_eq!(extract_json_object(text), Some("{\"destructive\": true, \"reason\": \"rm -rf\"}"));
    }

    #[test]
    fn extract_json_object_handles_nested_braces() {
        let text = "{\"a\": {\"b\": 1}}";
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn extract_json_object_returns_none_without_braces() {
        assert_eq!(extract_json_object("no json here"), None);
    }

    #[test]
    fn parse_reply_intent_rejects_unknown_values() {
        assert!(parse_reply_intent("maybe").is_none());
        assert_eq!(parse_reply_intent("deny"), Some(ReplyIntent::Deny));
    }

    #[test]
    fn parse_lsp_status_rejects_unknown_values() {
        assert!(parse_lsp_status("bogus").is_none());
        assert_eq!(parse_lsp_status("no_errors"), Some(LspStatus::NoErrors));
    }
}
