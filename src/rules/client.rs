//! # Document database boundary.
//!
//! Rules talk to the document database only through [`DocumentClient`]. The
//! concrete HTTP client lives outside this crate; requests and responses are
//! passed through as raw JSON.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::RuleError;

/// Shared handle to a document client.
pub type ClientRef = std::sync::Arc<dyn DocumentClient>;

/// Operations the cleanup rules need from the document database.
#[async_trait]
pub trait DocumentClient: Send + Sync + 'static {
    /// Runs a database query and returns the raw response page.
    ///
    /// `query` is the request body (filter, sorts, `start_cursor`).
    async fn query_database(
        &self,
        database_id: &str,
        query: &Value,
        ctx: &CancellationToken,
    ) -> Result<Value, RuleError>;

    /// Moves a page to the trash.
    async fn archive_page(&self, page_id: &str, ctx: &CancellationToken) -> Result<(), RuleError>;
}
