//! Git-domain export: serialize one or more packages into an abapGit ZIP,
//! streamed back in base64 chunks.

use serde_json::json;

use crate::adapter::transport::websocket::client::VspClient;
use crate::adapter::transport::websocket::messages::WsDomain;
use crate::domain::error::Result;

/// 5 MiB, the server default.
pub const DEFAULT_CHUNK_SIZE: u64 = 5_242_880;

impl VspClient {
    /// Export `packages` (comma-separated patterns) as an abapGit ZIP.
    /// Progress callbacks report (objects done, objects total, note).
    pub async fn git_export<F>(
        &self,
        packages: &str,
        chunk_size: Option<u64>,
        on_progress: F,
    ) -> Result<Vec<u8>>
    where
        F: FnMut(u64, u64, Option<&str>),
    {
        self.call_streaming(
            WsDomain::Git,
            "export",
            Some(json!({"packages": packages})),
            Some(chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE)),
            Some(300_000),
            on_progress,
        )
        .await
    }
}
