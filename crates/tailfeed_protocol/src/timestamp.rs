//! Logical replication timestamps and the resumption cursor codec.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Separator between the two halves of a cursor.
const CURSOR_SEPARATOR: char = '_';

/// A logical replication timestamp.
///
/// `high` holds seconds since the Unix epoch and `low` a counter that
/// orders writes within the same second. Timestamps order by `high`
/// first, then `low`, which is the append order of the log.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Timestamp {
    /// Seconds since the Unix epoch.
    #[serde(rename = "t")]
    pub high: u32,
    /// Increment within the second.
    #[serde(rename = "i")]
    pub low: u32,
}

impl Timestamp {
    /// Creates a timestamp from its two halves.
    pub const fn new(high: u32, low: u32) -> Self {
        Self { high, low }
    }

    /// Returns the wall-clock logical timestamp (current second, increment 0).
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self::new(u32::try_from(secs).unwrap_or(u32::MAX), 0)
    }

    /// Encodes the timestamp as a cursor string, `"{high}_{low}"`.
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.high, CURSOR_SEPARATOR, self.low)
    }

    /// Decodes a cursor string.
    ///
    /// Both halves must be present and parse as base-10 unsigned 32-bit
    /// integers. Anything else is rejected with
    /// [`ProtocolError::InvalidCursor`]; there is no partial recovery.
    pub fn decode(cursor: &str) -> ProtocolResult<Self> {
        let invalid = || ProtocolError::InvalidCursor(cursor.to_string());

        let (high, low) = cursor.split_once(CURSOR_SEPARATOR).ok_or_else(invalid)?;
        let high = parse_half(high).ok_or_else(invalid)?;
        let low = parse_half(low).ok_or_else(invalid)?;

        Ok(Self::new(high, low))
    }

    /// Returns the timestamp immediately following this one.
    pub fn successor(&self) -> Self {
        match self.low.checked_add(1) {
            Some(low) => Self::new(self.high, low),
            None => Self::new(self.high.saturating_add(1), 0),
        }
    }
}

fn parse_half(half: &str) -> Option<u32> {
    if half.is_empty() || !half.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    half.parse().ok()
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.high, CURSOR_SEPARATOR, self.low)
    }
}

impl FromStr for Timestamp {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}
