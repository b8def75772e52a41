//! Shared data model, canonical signatures, and journal primitives for the
//! agent run loop. Every other `zace-*` crate builds on the types here.

pub mod cancel;
pub mod error;
pub mod journal;
pub mod observer;
pub mod signature;
pub mod traits;
pub mod types;

pub use cancel::CancellationToken;
pub use error::RunError;
pub use observer::{AgentObserver, NullObserver, RunEvent};
pub use traits::{ChatClient, ToolExecutor};
pub use types::*;
