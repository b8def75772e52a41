//! HTTP `ChatClient` for an OpenAI-compatible chat completions endpoint
//! (§1, §6 ChatClient).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use zace_core::traits::{ChatClient, ChatError, ChatErrorClass, ChatReply, ChatRequest};
use zace_core::types::{Role, Usage};

pub struct HttpChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    context_window_tokens: Option<u64>,
}

impl HttpChatClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            context_window_tokens: None,
        }
    }

    pub fn with_context_window_tokens(mut self, tokens: u64) -> Self {
        self.context_window_tokens = Some(tokens);
        self
    }
}

#[derive(Serialize)]
struct ChatCompletionMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatCompletionMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    usage: Option<ChatCompletionUsage>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionResponseMessage,
}

#[derive(Deserialize)]
struct ChatCompletionResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatCompletionUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

#[derive(Deserialize)]
struct ChatCompletionError {
    error: ChatCompletionErrorBody,
}

#[derive(Deserialize)]
struct ChatCompletionErrorBody {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

fn role_str(role: Role) -> String {
    role.to_string()
}

fn classify_status(status: reqwest::StatusCode) -> ChatErrorClass {
    match status.as_u16() {
        429 => ChatErrorClass::RateLimit,
        400 | 422 => ChatErrorClass::InvalidMessageShape,
        _ => ChatErrorClass::Other,
    }
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, ChatError> {
        let messages = request
            .messages
            .iter()
            .map(|m| ChatCompletionMessage { role: role_str(m.role), content: m.content.clone() })
            .collect();

        let response_format = request.response_format.as_ref().map(|rf| {
            serde_json::json!({
                "type": rf.kind,
                "json_schema": { "name": rf.name, "schema": rf.schema, "strict": rf.strict },
            })
        });

        let body = ChatCompletionRequest { model: self.model.clone(), messages, response_format };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|source| ChatError {
                error_class: ChatErrorClass::Other,
                provider_message: Some(source.to_string()),
                provider_code: None,
                status_code: source.status().map(|s| s.as_u16()),
                response_format_unsupported: false,
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_class = classify_status(status);
            let text = response.text().await.unwrap_or_default();
            let parsed: Option<ChatCompletionError> = serde_json::from_str(&text).ok();
            let response_format_unsupported =
                request.response_format.is_some() && parsed.as_ref().is_some_and(|e| e.error.message.contains("response_format"));
            return Err(ChatError {
                error_class: if response_format_unsupported { ChatErrorClass::ResponseFormatUnsupported } else { error_class },
                provider_message: Some(parsed.as_ref().map(|e| e.error.message.clone()).unwrap_or(text)),
                provider_code: parsed.and_then(|e| e.error.code),
                status_code: Some(status.as_u16()),
                response_format_unsupported,
            });
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|source| ChatError {
            error_class: ChatErrorClass::Other,
            provider_message: Some(source.to_string()),
            provider_code: None,
            status_code: None,
            response_format_unsupported: false,
        })?;

        let content = parsed.choices.into_iter().next().and_then(|c| c.message.content).unwrap_or_default();

        Ok(ChatReply {
            content,
            usage: parsed.usage.map(|u| Usage { prompt_tokens: u.prompt_tokens, completion_tokens: u.completion_tokens, total_tokens: u.total_tokens }),
            normalized: None,
        })
    }

    fn model_context_window_tokens(&self) -> Option<u64> {
        self.context_window_tokens
    }
}
