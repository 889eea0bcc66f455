//! Storage backend contract.

use async_trait::async_trait;

use crate::error::Result;
use crate::events::{Event, PageView};
use crate::request::Request;
use crate::session::Session;

/// Batched writer for the append-only log.
///
/// Implementations must accept concurrent calls from several pipeline
/// workers. An error means the batch was not written.
#[async_trait]
pub trait Store: Send + Sync {
    /// Saves session rows, cancel rows included, in the given order.
    async fn save_sessions(&self, sessions: &[Session]) -> Result<()>;

    async fn save_page_views(&self, page_views: &[PageView]) -> Result<()>;

    async fn save_events(&self, events: &[Event]) -> Result<()>;

    /// Saves diagnostic request rows.
    async fn save_requests(&self, requests: &[Request]) -> Result<()>;
}
