//! Log store abstraction.

use crate::error::StoreResult;
use crate::query::{EntryFilter, OplogQuery};
use async_trait::async_trait;
use futures::stream::BoxStream;
use tailfeed_protocol::{LogEntry, Timestamp};

/// A live stream of log entries. Dropping it releases the underlying cursor.
pub type EntryStream = BoxStream<'static, StoreResult<LogEntry>>;

/// A timestamp-ordered, live-tailable replication log.
///
/// Implementations may share connections between callers, but every
/// stream returned by [`LogStore::tail`] keeps its own read position.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Returns the timestamp of the most recent entry matching `filter`,
    /// or of the most recent entry overall when `filter` is `None`.
    async fn latest(&self, filter: Option<&EntryFilter>) -> StoreResult<Option<Timestamp>>;

    /// Opens a tailing cursor for `query`.
    ///
    /// The stream yields matching entries in log order, waits indefinitely
    /// for new ones, and ends right after yielding an error.
    async fn tail(&self, query: &OplogQuery) -> StoreResult<EntryStream>;
}
