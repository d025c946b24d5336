//! # tailfeed Protocol
//!
//! Oplog and change-event types for tailfeed.
//!
//! This crate provides:
//! - `Timestamp`, the logical replication timestamp, and its cursor codec
//! - `LogEntry` for raw replication log records
//! - `EventTranslator` turning log entries into `WireEvent`s
//! - `FieldFilter` for subscriber-supplied field predicates
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! ## Cursor format
//!
//! A cursor is the wire form of a logical timestamp, `"{high}_{low}"`,
//! where `high` is seconds since the epoch and `low` an increment within
//! that second. It is used both as the SSE event id and as the value of
//! the `Last-Event-ID` resumption header.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entry;
mod error;
mod event;
mod filter;
mod timestamp;

pub use entry::{Document, LogEntry, OpCode, Verb, VerbSet};
pub use error::{ProtocolError, ProtocolResult};
pub use event::{normalize_document, EventTranslator, WireEvent, TICKER_EVENT};
pub use filter::{is_subset, FieldFilter, RESERVED_PARAMS};
pub use timestamp::Timestamp;
