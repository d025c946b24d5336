//! Raw replication log entries.

use crate::error::{ProtocolError, ProtocolResult};
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A JSON document as stored in the log.
pub type Document = Map<String, Value>;

/// Field holding the document identifier.
pub(crate) const ID_FIELD: &str = "_id";

/// Update operator carrying the changed fields of an update entry.
pub(crate) const SET_OPERATOR: &str = "$set";

/// Operation code of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpCode {
    /// A document was inserted.
    #[serde(rename = "i")]
    Insert,
    /// A document was updated.
    #[serde(rename = "u")]
    Update,
    /// A document was deleted.
    #[serde(rename = "d")]
    Delete,
    /// A database command.
    #[serde(rename = "c")]
    Command,
    /// A no-op marker.
    #[serde(rename = "n")]
    Noop,
}

impl OpCode {
    /// Returns the single-letter code used in the log and in event names.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpCode::Insert => "i",
            OpCode::Update => "u",
            OpCode::Delete => "d",
            OpCode::Command => "c",
            OpCode::Noop => "n",
        }
    }

    /// Parses a single-letter code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "i" => Some(OpCode::Insert),
            "u" => Some(OpCode::Update),
            "d" => Some(OpCode::Delete),
            "c" => Some(OpCode::Command),
            "n" => Some(OpCode::Noop),
            _ => None,
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpCode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| ProtocolError::UnknownOperation(s.to_string()))
    }
}

/// A subscribable write verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verb {
    /// Document creation (`post`).
    Create,
    /// Document update (`put`).
    Update,
    /// Document deletion.
    Delete,
}

impl Verb {
    /// Returns the log operation this verb subscribes to.
    pub fn op_code(&self) -> OpCode {
        match self {
            Verb::Create => OpCode::Insert,
            Verb::Update => OpCode::Update,
            Verb::Delete => OpCode::Delete,
        }
    }

    /// Returns the canonical verb name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Delete => "delete",
        }
    }
}

impl FromStr for Verb {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" | "post" => Ok(Verb::Create),
            "update" | "put" => Ok(Verb::Update),
            "delete" => Ok(Verb::Delete),
            _ => Err(ProtocolError::UnknownVerb(s.to_string())),
        }
    }
}

/// A non-empty set of verbs. Defaults to `{create}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerbSet(BTreeSet<Verb>);

impl VerbSet {
    /// Creates a verb set. An empty input yields the default set.
    pub fn new(verbs: impl IntoIterator<Item = Verb>) -> Self {
        let set: BTreeSet<Verb> = verbs.into_iter().collect();
        if set.is_empty() {
            Self::default()
        } else {
            Self(set)
        }
    }

    /// Returns the set of all verbs.
    pub fn all() -> Self {
        Self::new([Verb::Create, Verb::Update, Verb::Delete])
    }

    /// Parses a comma-separated verb list, e.g. `"post,put,delete"`.
    pub fn parse_list(list: &str) -> ProtocolResult<Self> {
        let verbs = list
            .split(',')
            .filter(|v| !v.trim().is_empty())
            .map(Verb::from_str)
            .collect::<ProtocolResult<Vec<_>>>()?;
        Ok(Self::new(verbs))
    }

    /// Returns the operation codes the set subscribes to, in verb order.
    pub fn op_codes(&self) -> Vec<OpCode> {
        self.0.iter().map(Verb::op_code).collect()
    }

    /// Returns true if entries with this operation code are subscribed.
    pub fn includes(&self, op: OpCode) -> bool {
        self.0.iter().any(|v| v.op_code() == op)
    }

    /// Iterates the verbs in the set.
    pub fn iter(&self) -> impl Iterator<Item = &Verb> {
        self.0.iter()
    }
}

impl Default for VerbSet {
    fn default() -> Self {
        Self(BTreeSet::from([Verb::Create]))
    }
}

impl fmt::Display for VerbSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.0.iter().map(Verb::as_str).collect();
        f.write_str(&names.join(","))
    }
}

/// A single record of the replication log.
///
/// The layout mirrors the oplog document: `ts`, `ns`, `op` and the
/// operation payload `o`. Inserts carry the full document, updates a
/// `{"$set": {...}}` document and deletes only the removed identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Logical timestamp; unique and increasing in log order.
    #[serde(rename = "ts")]
    pub timestamp: Timestamp,
    /// Namespace, `"{database}.{collection}"`.
    #[serde(rename = "ns")]
    pub namespace: String,
    /// Operation code.
    pub op: OpCode,
    /// Operation payload.
    #[serde(rename = "o", default)]
    pub payload: Document,
}

impl LogEntry {
    /// Creates an insert entry carrying the full document.
    pub fn insert(timestamp: Timestamp, namespace: impl Into<String>, document: Document) -> Self {
        Self {
            timestamp,
            namespace: namespace.into(),
            op: OpCode::Insert,
            payload: document,
        }
    }

    /// Creates an update entry carrying the changed fields.
    pub fn update(timestamp: Timestamp, namespace: impl Into<String>, fields: Document) -> Self {
        let mut payload = Document::new();
        payload.insert(SET_OPERATOR.to_string(), Value::Object(fields));
        Self {
            timestamp,
            namespace: namespace.into(),
            op: OpCode::Update,
            payload,
        }
    }

    /// Creates a delete entry for the given document id.
    pub fn delete(timestamp: Timestamp, namespace: impl Into<String>, id: Value) -> Self {
        let mut payload = Document::new();
        payload.insert(ID_FIELD.to_string(), id);
        Self {
            timestamp,
            namespace: namespace.into(),
            op: OpCode::Delete,
            payload,
        }
    }

    /// Returns the collection component of the namespace.
    ///
    /// Everything after the first `.` is the collection name, so
    /// `"shop.system.views"` yields `"system.views"`. A namespace with no
    /// database part has no collection.
    pub fn collection(&self) -> Option<&str> {
        self.namespace.split_once('.').map(|(_, coll)| coll)
    }

    /// Returns the partial-update fields of an update entry.
    pub fn set_fields(&self) -> Option<&Document> {
        self.payload.get(SET_OPERATOR).and_then(Value::as_object)
    }
}
