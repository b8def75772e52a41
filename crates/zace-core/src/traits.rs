//! External interfaces the loop consumes but does not implement (§6):
//! the LLM transport and the tool/shell executor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cancel::CancellationToken;
use crate::types::{Message, ToolCall, ToolResult, Usage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Planner,
    Safety,
    Approval,
    Executor,
    Compaction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub schema: serde_json::Value,
    pub strict: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub call_kind: Option<CallKind>,
    #[serde(default)]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub content: String,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub normalized: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatErrorClass {
    RateLimit,
    InvalidMessageShape,
    ResponseFormatUnsupported,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatError {
    pub error_class: ChatErrorClass,
    #[serde(default)]
    pub provider_message: Option<String>,
    #[serde(default)]
    pub provider_code: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub response_format_unsupported: bool,
}

impl std::fmt::Display for ChatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.error_class, self.provider_message.as_deref().unwrap_or(""))
    }
}

impl std::error::Error for ChatError {}

/// The LLM transport, consumed sequentially from the loop (§5).
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, ChatError>;

    fn model_context_window_tokens(&self) -> Option<u64> {
        None
    }
}

/// Shell command execution, file I/O for artifacts, and LSP subprocess
/// management, consumed via one recognized-but-open tool namespace.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, call: &ToolCall, cancel: &CancellationToken) -> ToolResult;
}
