//! Concrete `ToolExecutor` and `ChatClient` implementations: subprocess
//! execution and an OpenAI-compatible HTTP transport (§6).

mod chat;
mod process;

pub use chat::HttpChatClient;
pub use process::{ShellToolExecutor, DEFAULT_COMMAND_TIMEOUT};
