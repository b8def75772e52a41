//! The external probe call the bootstrap machine invokes when a write
//! touches the runtime LSP config path (§4.4).

use async_trait::async_trait;
use zace_core::types::LspStatus;

#[async_trait]
pub trait FileProber: Send + Sync {
    async fn probe_files(&self, changed_files: &[String]) -> Result<LspStatus, String>;
}
