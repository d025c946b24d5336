//! In-memory replication log.

use crate::error::{StoreError, StoreResult};
use crate::query::{EntryFilter, OplogQuery};
use crate::store::{EntryStream, LogStore};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::collections::VecDeque;
use std::sync::Arc;
use tailfeed_protocol::{Document, LogEntry, Timestamp};
use tokio::sync::{broadcast, watch};

/// In-memory, append-only replication log.
///
/// The oplog maintains:
/// - All entries in timestamp order
/// - A head watch channel that wakes awaiting tailers on append
/// - A count of open tail cursors
///
/// An oplog built with [`MemoryOplog::with_retention`] is capped: once
/// full, each write evicts the oldest entry. A cursor older than the
/// retained window resumes at the oldest retained entry.
///
/// Cloning yields another handle to the same log.
#[derive(Clone)]
pub struct MemoryOplog {
    inner: Arc<OplogInner>,
}

struct OplogInner {
    database: String,
    /// Entries in timestamp order.
    entries: RwLock<VecDeque<LogEntry>>,
    /// Maximum number of retained entries.
    retention: Option<usize>,
    /// Timestamp of the last entry.
    head: watch::Sender<Option<Timestamp>>,
    /// Injected tailer failures.
    faults: broadcast::Sender<String>,
    unavailable: AtomicBool,
    open_cursors: AtomicUsize,
}

impl OplogInner {
    /// Returns matching entries after `after`, and the last timestamp scanned.
    fn scan(&self, after: Timestamp, filter: &EntryFilter) -> (Vec<LogEntry>, Timestamp) {
        let entries = self.entries.read();
        let start = entries.partition_point(|e| e.timestamp <= after);
        let scanned = match entries.back() {
            Some(last) if start < entries.len() => last.timestamp,
            _ => after,
        };
        let matched = entries
            .range(start..)
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        (matched, scanned)
    }
}

/// Decrements the open-cursor count when a tail stream is dropped.
struct CursorGuard(Arc<OplogInner>);

impl CursorGuard {
    fn open(inner: Arc<OplogInner>) -> Self {
        inner.open_cursors.fetch_add(1, Ordering::SeqCst);
        Self(inner)
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        self.0.open_cursors.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryOplog {
    /// Creates an empty oplog for `database`.
    pub fn new(database: impl Into<String>) -> Self {
        Self::build(database.into(), None)
    }

    /// Creates an empty oplog that keeps at most `max_entries` entries.
    pub fn with_retention(database: impl Into<String>, max_entries: usize) -> Self {
        Self::build(database.into(), Some(max_entries.max(1)))
    }

    fn build(database: String, retention: Option<usize>) -> Self {
        let (faults, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(OplogInner {
                database,
                entries: RwLock::new(VecDeque::new()),
                retention,
                head: watch::Sender::new(None),
                faults,
                unavailable: AtomicBool::new(false),
                open_cursors: AtomicUsize::new(0),
            }),
        }
    }

    /// Returns the database name.
    pub fn database(&self) -> &str {
        &self.inner.database
    }

    /// Returns the namespace of `collection` in this database.
    pub fn namespace(&self, collection: &str) -> String {
        format!("{}.{}", self.inner.database, collection)
    }

    /// Appends an entry with an explicit timestamp.
    ///
    /// The timestamp must be after the current last entry.
    pub fn append(&self, entry: LogEntry) -> StoreResult<()> {
        self.push(|_| entry).map(|_| ())
    }

    /// Records an insert into `collection`. Returns the assigned timestamp.
    pub fn insert(&self, collection: &str, document: Document) -> StoreResult<Timestamp> {
        let ns = self.namespace(collection);
        self.push(|last| LogEntry::insert(next_timestamp(last), ns, document))
    }

    /// Records a partial update in `collection`.
    pub fn update(&self, collection: &str, fields: Document) -> StoreResult<Timestamp> {
        let ns = self.namespace(collection);
        self.push(|last| LogEntry::update(next_timestamp(last), ns, fields))
    }

    /// Records a delete in `collection`.
    pub fn delete(&self, collection: &str, id: Value) -> StoreResult<Timestamp> {
        let ns = self.namespace(collection);
        self.push(|last| LogEntry::delete(next_timestamp(last), ns, id))
    }

    /// Builds an entry from the current last timestamp and appends it if it
    /// sorts after that timestamp.
    fn push(&self, build: impl FnOnce(Option<Timestamp>) -> LogEntry) -> StoreResult<Timestamp> {
        let mut entries = self.inner.entries.write();
        let last = entries.back().map(|e| e.timestamp);
        let entry = build(last);
        let ts = entry.timestamp;
        if let Some(last) = last {
            if ts <= last {
                return Err(StoreError::OutOfOrder {
                    last,
                    attempted: ts,
                });
            }
        }

        entries.push_back(entry);
        if let Some(max) = self.inner.retention {
            while entries.len() > max {
                entries.pop_front();
            }
        }
        drop(entries);

        self.inner.head.send_replace(Some(ts));
        Ok(ts)
    }

    /// Returns the timestamp of the last entry.
    pub fn last_timestamp(&self) -> Option<Timestamp> {
        *self.inner.head.borrow()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// Returns true if the oplog is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().is_empty()
    }

    /// Returns the number of tail cursors currently open.
    pub fn open_cursors(&self) -> usize {
        self.inner.open_cursors.load(Ordering::SeqCst)
    }

    /// Makes queries and new tails fail while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fails every open tail cursor with `message`.
    ///
    /// Returns the number of cursors notified.
    pub fn fail_tailers(&self, message: impl Into<String>) -> usize {
        self.inner.faults.send(message.into()).unwrap_or(0)
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable(format!(
                "oplog {} is unavailable",
                self.inner.database
            )))
        } else {
            Ok(())
        }
    }
}

/// Next timestamp after `last`: the current second with a fresh counter,
/// or the successor of `last` if the clock has not moved past it.
fn next_timestamp(last: Option<Timestamp>) -> Timestamp {
    let now = Timestamp::now();
    match last {
        Some(last) if last.high >= now.high => last.successor(),
        _ => Timestamp::new(now.high, 1),
    }
}

#[async_trait]
impl LogStore for MemoryOplog {
    async fn latest(&self, filter: Option<&EntryFilter>) -> StoreResult<Option<Timestamp>> {
        self.check_available()?;

        let entries = self.inner.entries.read();
        let found = match filter {
            Some(filter) => entries.iter().rev().find(|e| filter.matches(e)),
            None => entries.back(),
        };
        Ok(found.map(|e| e.timestamp))
    }

    async fn tail(&self, query: &OplogQuery) -> StoreResult<EntryStream> {
        self.check_available()?;

        let guard = CursorGuard::open(Arc::clone(&self.inner));
        let mut head = self.inner.head.subscribe();
        let mut faults = self.inner.faults.subscribe();
        let filter = query.filter.clone();
        let mut after = query.after;

        let stream = async_stream::stream! {
            let guard = guard;
            loop {
                // Mark the head seen before scanning so appends racing the
                // scan still wake us.
                head.borrow_and_update();
                let (batch, scanned) = guard.0.scan(after, &filter);
                after = scanned;
                for entry in batch {
                    yield Ok(entry);
                }

                let woken = tokio::select! {
                    changed = head.changed() => changed.map_err(|_| StoreError::Closed),
                    fault = faults.recv() => Err(StoreError::Unavailable(
                        fault.unwrap_or_else(|e| e.to_string()),
                    )),
                };
                if let Err(err) = woken {
                    yield Err(err);
                    break;
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
