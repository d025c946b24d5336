//! # tailfeed Server
//!
//! Resumable Server-Sent Events change feed over a replication oplog.
//!
//! This crate provides:
//! - HTTP endpoints (`/changes/streaming` and `/{resource}/changes/streaming`)
//! - Resource validation against an injected registry
//! - Start-position computation and live tailing of the log
//! - Keepalive ticker events
//! - An in-memory oplog implementing the [`LogStore`] trait
//!
//! # Session lifecycle
//!
//! 1. The request is validated (resources, cursor); failures are a 400
//! 2. The start position is computed: the `Last-Event-ID` cursor if given,
//!    otherwise the newest matching entry, otherwise the newest entry,
//!    otherwise the wall clock
//! 3. A tailer streams entries after that position; each is translated,
//!    field-filtered and written as an SSE event
//! 4. Disconnect, shutdown or a tailing error tears the session down,
//!    closing the tailer and stopping the ticker exactly once
//!
//! No history is replayed to a subscriber without a cursor.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod http;
mod matcher;
mod oplog;
mod query;
mod registry;
mod server;
mod session;
mod sink;
mod store;
mod tailer;
mod ticker;

pub use config::{FeedConfig, ServerConfig, DEFAULT_TICKER_INTERVAL};
pub use error::{FeedError, FeedResult, StoreError, StoreResult};
pub use http::{build_router, resource_path, AppState, LAST_EVENT_ID, STREAMING_PATH};
pub use matcher::{requested_resources, validate, NamespaceFilter};
pub use oplog::MemoryOplog;
pub use query::{EntryFilter, OplogQuery, QueryBuilder, StartPoint};
pub use registry::{ResourceRegistry, StaticRegistry};
pub use server::ChangeFeedServer;
pub use session::{
    Session, SessionHandle, SessionState, SubscriptionRequest, RESOURCES_PARAM,
};
pub use sink::{EventSink, SinkClosed};
pub use store::{EntryStream, LogStore};
pub use tailer::Tailer;
pub use ticker::KeepaliveTicker;
