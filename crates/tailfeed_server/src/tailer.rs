//! Oplog tailer.

use crate::error::StoreResult;
use crate::query::OplogQuery;
use crate::store::{EntryStream, LogStore};
use futures::StreamExt;
use tailfeed_protocol::LogEntry;

/// A live, non-restartable cursor over the log.
///
/// Yields entries in log order until the store reports an error, after
/// which it yields nothing more. [`Tailer::close`] releases the cursor;
/// calling it again is a no-op, and dropping an open tailer closes it.
pub struct Tailer {
    stream: Option<EntryStream>,
    failed: bool,
}

impl Tailer {
    /// Opens a tailing cursor for `query`.
    pub async fn open(store: &dyn LogStore, query: &OplogQuery) -> StoreResult<Self> {
        let stream = store.tail(query).await?;
        tracing::debug!(after = %query.after, start = ?query.start, "tailer opened");
        Ok(Self {
            stream: Some(stream),
            failed: false,
        })
    }

    /// Returns the next entry, or `None` once closed or terminated.
    ///
    /// Cancel-safe: dropping the returned future loses no entry.
    pub async fn next(&mut self) -> Option<StoreResult<LogEntry>> {
        if self.failed {
            return None;
        }
        let item = self.stream.as_mut()?.next().await;
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }

    /// Releases the cursor. Returns true if this call released it.
    pub fn close(&mut self) -> bool {
        match self.stream.take() {
            Some(stream) => {
                drop(stream);
                tracing::debug!("tailer closed");
                true
            }
            None => false,
        }
    }

    /// Returns true once the cursor has been released.
    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}

impl Drop for Tailer {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::matcher::NamespaceFilter;
    use crate::oplog::MemoryOplog;
    use crate::query::QueryBuilder;
    use tailfeed_protocol::{Document, Timestamp, VerbSet};

    async fn open(oplog: &MemoryOplog, cursor: Option<Timestamp>) -> Tailer {
        let query = QueryBuilder::new(oplog)
            .build(NamespaceFilter::new(&["brands"]), &VerbSet::default(), cursor)
            .await
            .unwrap();
        Tailer::open(oplog, &query).await.unwrap()
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let oplog = MemoryOplog::new("shop");
        let mut tailer = open(&oplog, None).await;
        assert_eq!(oplog.open_cursors(), 1);

        assert!(tailer.close());
        assert!(!tailer.close());
        assert!(tailer.is_closed());
        assert_eq!(oplog.open_cursors(), 0);
        assert!(tailer.next().await.is_none());
    }

    #[tokio::test]
    async fn drop_closes_cursor() {
        let oplog = MemoryOplog::new("shop");
        let tailer = open(&oplog, None).await;
        assert_eq!(oplog.open_cursors(), 1);
        drop(tailer);
        assert_eq!(oplog.open_cursors(), 0);
    }

    #[tokio::test]
    async fn subscriber_without_cursor_sees_only_new_entries() {
        let oplog = MemoryOplog::new("shop");
        oplog.insert("brands", Document::new()).unwrap();
        let mut tailer = open(&oplog, None).await;

        let fresh = oplog.insert("brands", Document::new()).unwrap();
        let entry = tailer.next().await.unwrap().unwrap();
        assert_eq!(entry.timestamp, fresh);
    }

    #[tokio::test]
    async fn error_terminates_sequence() {
        let oplog = MemoryOplog::new("shop");
        let mut tailer = open(&oplog, None).await;

        oplog.fail_tailers("boom");
        assert!(matches!(
            tailer.next().await,
            Some(Err(StoreError::Unavailable(_)))
        ));
        assert!(tailer.next().await.is_none());
        assert!(!tailer.is_closed());
        assert!(tailer.close());
    }
}
