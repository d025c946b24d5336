//! Start-position computation for oplog tailing.

use crate::error::StoreResult;
use crate::matcher::NamespaceFilter;
use crate::store::LogStore;
use tailfeed_protocol::{LogEntry, OpCode, Timestamp, VerbSet};

/// Namespace and operation predicate over log entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFilter {
    /// Accepted namespaces.
    pub namespaces: NamespaceFilter,
    /// Accepted operation codes.
    pub ops: Vec<OpCode>,
}

impl EntryFilter {
    /// Creates a filter from a namespace filter and a verb set.
    pub fn new(namespaces: NamespaceFilter, verbs: &VerbSet) -> Self {
        Self {
            namespaces,
            ops: verbs.op_codes(),
        }
    }

    /// Returns true if `entry` matches both namespace and operation.
    pub fn matches(&self, entry: &LogEntry) -> bool {
        self.ops.contains(&entry.op) && self.namespaces.matches(&entry.namespace)
    }
}

/// Where a query's start position came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPoint {
    /// The client's resumption cursor.
    Cursor,
    /// The most recent entry matching the filter.
    LatestMatching,
    /// The most recent entry of the whole log.
    LatestAny,
    /// The wall clock, because the log is empty.
    WallClock,
}

/// A tailing query: entries matching `filter` with timestamps after `after`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OplogQuery {
    /// Entry predicate.
    pub filter: EntryFilter,
    /// Exclusive lower bound on timestamps.
    pub after: Timestamp,
    /// How `after` was chosen.
    pub start: StartPoint,
}

impl OplogQuery {
    /// Returns true if `entry` is selected by this query.
    pub fn selects(&self, entry: &LogEntry) -> bool {
        entry.timestamp > self.after && self.filter.matches(entry)
    }
}

/// Builds tailing queries against a log store.
pub struct QueryBuilder<'a> {
    store: &'a dyn LogStore,
}

impl<'a> QueryBuilder<'a> {
    /// Creates a builder reading from `store`.
    pub fn new(store: &'a dyn LogStore) -> Self {
        Self { store }
    }

    /// Computes the query for a subscription.
    ///
    /// With a cursor the query resumes strictly after it and no I/O is
    /// performed. Without one, the subscriber starts after the most recent
    /// matching entry, else after the most recent entry of any kind, else
    /// at the current wall-clock timestamp. History is never replayed.
    pub async fn build(
        &self,
        namespaces: NamespaceFilter,
        verbs: &VerbSet,
        cursor: Option<Timestamp>,
    ) -> StoreResult<OplogQuery> {
        let filter = EntryFilter::new(namespaces, verbs);

        if let Some(after) = cursor {
            return Ok(OplogQuery {
                filter,
                after,
                start: StartPoint::Cursor,
            });
        }

        if let Some(after) = self.store.latest(Some(&filter)).await? {
            return Ok(OplogQuery {
                filter,
                after,
                start: StartPoint::LatestMatching,
            });
        }

        let (after, start) = match self.store.latest(None).await? {
            Some(ts) => (ts, StartPoint::LatestAny),
            None => (Timestamp::now(), StartPoint::WallClock),
        };

        Ok(OplogQuery {
            filter,
            after,
            start,
        })
    }
}
