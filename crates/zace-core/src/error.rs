//! Top-level error type for the run loop and the crates it coordinates.
//!
//! Per §7, the loop never propagates an error to its caller — every
//! fallible operation inside `run_agent_loop` is folded into the returned
//! `AgentResult`. `RunError` exists for the boundary crates (journal,
//! config, approval persistence) that still need a typed `Result`.

#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("session journal I/O failed for '{session_id}': {source}")]
    JournalIo {
        session_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed journal line {line_number} in '{session_id}': {reason}")]
    MalformedJournalLine {
        session_id: String,
        line_number: usize,
        reason: String,
    },

    #[error("approval rules file '{path}' could not be read: {source}")]
    ApprovalRulesIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("approval rules file '{path}' is not valid JSON: {source}")]
    ApprovalRulesParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("planner produced an invalid tool call: {0}")]
    ToolCallValidation(String),

    #[error("transport error ({class}): {message}")]
    Transport { class: String, message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("memory sink failed: {0}")]
    MemorySink(String),

    #[error("script registry '{path}' could not be written: {source}")]
    ScriptRegistryIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config file '{path}' could not be read: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config file '{path}' is not valid TOML: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("config could not be serialized for '{path}': {source}")]
    ConfigSerialize {
        path: String,
        #[source]
        source: toml::ser::Error,
    },
}
