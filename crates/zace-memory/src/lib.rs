//! Ordered message log, token-budget estimator, and summary-based
//! compaction (§4.8). Messages are also delivered to an optional async
//! sink (the session journal) through a single-writer serialized queue;
//! the sink's first error is captured and surfaced on [`Memory::flush_message_sink`].

mod sink;

pub use sink::MessageSink;

use zace_core::types::{Message, Role};

/// Ordered conversation memory for one run.
pub struct Memory {
    messages: Vec<Message>,
    sink: Option<MessageSink>,
}

impl Memory {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            sink: None,
        }
    }

    pub fn with_sink(sink: MessageSink) -> Self {
        Self {
            messages: Vec::new(),
            sink: Some(sink),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Append a message, forwarding it to the sink (if any) without
    /// blocking on the sink's own I/O.
    pub fn push(&mut self, message: Message) {
        if let Some(sink) = &self.sink {
            sink.send(message.clone());
        }
        self.messages.push(message);
    }

    pub fn push_system(&mut self, content: impl Into<String>) {
        self.push(Message::new(Role::System, content));
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Message::new(Role::User, content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Message::new(Role::Assistant, content));
    }

    pub fn push_tool(&mut self, content: impl Into<String>) {
        self.push(Message::new(Role::Tool, content));
    }

    /// `ceil(sum(len(content)) / 4)` — a byte-length estimator, not a
    /// word-count heuristic.
    pub fn estimate_token_count(&self) -> u64 {
        let total_bytes: usize = self.messages.iter().map(|m| m.content.len()).sum();
        total_bytes.div_ceil(4) as u64
    }

    pub fn non_system_count(&self) -> usize {
        self.messages.iter().filter(|m| m.role != Role::System).count()
    }

    fn system_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.role == Role::System)
    }

    /// Preserve the unique system message, insert a single assistant
    /// summary message, and keep only the last `preserve_recent_messages`
    /// non-system messages.
    pub fn compact_with_summary(&mut self, summary: impl Into<String>, preserve_recent_messages: usize) {
        let system = self.system_message().cloned();
        let mut non_system: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .cloned()
            .collect();

        if non_system.len() > preserve_recent_messages {
            let drop_count = non_system.len() - preserve_recent_messages;
            non_system.drain(0..drop_count);
        }

        let mut rebuilt = Vec::new();
        if let Some(system) = system {
            rebuilt.push(system);
        }
        rebuilt.push(Message::new(Role::Assistant, summary.into()));
        rebuilt.extend(non_system);
        self.messages = rebuilt;
    }

    /// Drain the sink's sentinel error slot, if any, returning the first
    /// error the sink encountered since the last flush.
    pub async fn flush_message_sink(&self) -> Option<String> {
        match &self.sink {
            Some(sink) => sink.flush().await,
            None => None,
        }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether current token usage crosses the compaction trigger ratio
/// (§4.8), given the planner's reported or estimated usage and the
/// context-window size.
pub fn should_compact(
    current_tokens: u64,
    context_window_tokens: u64,
    trigger_ratio: f64,
    non_system_message_count: usize,
    preserve_recent_messages: usize,
) -> bool {
    if context_window_tokens == 0 {
        return false;
    }
    let usage_ratio = current_tokens as f64 / context_window_tokens as f64;
    usage_ratio >= trigger_ratio && non_system_message_count > preserve_recent_messages
}
