//! Change events delivered to subscribers.

use crate::entry::{Document, LogEntry, OpCode, ID_FIELD};
use serde::Serialize;
use serde_json::Value;

/// Event name of synthetic keepalive events.
pub const TICKER_EVENT: &str = "ticker";

/// Public identifier field exposed to subscribers.
const PUBLIC_ID_FIELD: &str = "id";

/// Internal version field stripped from inserted documents.
const VERSION_FIELD: &str = "__v";

/// An event as written to the reply stream.
///
/// `id` doubles as the resumption cursor for change events; keepalive
/// events carry their tick counter instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireEvent {
    /// Event id.
    pub id: String,
    /// Event name, `"{resource}_{opcode}"` for change events.
    pub event: String,
    /// JSON payload.
    pub data: Value,
}

impl WireEvent {
    /// Creates a keepalive event for the given tick.
    pub fn ticker(tick: u64) -> Self {
        Self {
            id: tick.to_string(),
            event: TICKER_EVENT.to_string(),
            data: Value::from(tick),
        }
    }

    /// Returns true for keepalive events.
    pub fn is_ticker(&self) -> bool {
        self.event == TICKER_EVENT
    }
}

/// Translates log entries into wire events.
///
/// Events are named after a single resource fixed at construction, the
/// first resource of the subscription. An entry from another subscribed
/// collection is still named after that first resource.
#[derive(Debug, Clone)]
pub struct EventTranslator {
    resource: String,
}

impl EventTranslator {
    /// Creates a translator naming events after `resource`.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
        }
    }

    /// Returns the resource name used in event names.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Translates one log entry.
    pub fn translate(&self, entry: &LogEntry) -> WireEvent {
        WireEvent {
            id: entry.timestamp.encode(),
            event: format!("{}_{}", self.resource, entry.op),
            data: Value::Object(event_data(entry)),
        }
    }
}

fn event_data(entry: &LogEntry) -> Document {
    match entry.op {
        OpCode::Insert => normalize_document(entry.payload.clone()),
        OpCode::Update => entry.set_fields().cloned().unwrap_or_default(),
        _ => Document::new(),
    }
}

/// Converts a stored document into its public form.
///
/// The internal `_id` becomes `id` and the `__v` version field is
/// dropped. A document without `_id` gets no `id`.
pub fn normalize_document(mut document: Document) -> Document {
    document.remove(VERSION_FIELD);
    if let Some(id) = document.remove(ID_FIELD) {
        document.insert(PUBLIC_ID_FIELD.to_string(), id);
    }
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::Timestamp;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn insert_promotes_id_and_strips_version() {
        let entry = LogEntry::insert(
            Timestamp::new(100, 2),
            "shop.brands",
            doc(json!({"_id": "x", "__v": 1, "name": "A"})),
        );
        let event = EventTranslator::new("brands").translate(&entry);

        assert_eq!(event.id, "100_2");
        assert_eq!(event.event, "brands_i");
        assert_eq!(event.data, json!({"id": "x", "name": "A"}));
    }

    #[test]
    fn insert_without_id() {
        let entry = LogEntry::insert(Timestamp::new(1, 1), "shop.brands", doc(json!({"a": 1})));
        let event = EventTranslator::new("brands").translate(&entry);
        assert_eq!(event.data, json!({"a": 1}));
    }

    #[test]
    fn update_yields_set_fields_only() {
        let entry = LogEntry::update(
            Timestamp::new(5, 1),
            "shop.brands",
            doc(json!({"description": "new"})),
        );
        let event = EventTranslator::new("brands").translate(&entry);

        assert_eq!(event.event, "brands_u");
        assert_eq!(event.data, json!({"description": "new"}));
    }

    #[test]
    fn update_without_set_operator_is_empty() {
        let mut entry = LogEntry::update(Timestamp::new(5, 1), "shop.brands", Document::new());
        entry.payload = doc(json!({"$unset": {"code": ""}}));
        let event = EventTranslator::new("brands").translate(&entry);
        assert_eq!(event.data, json!({}));
    }

    #[test]
    fn delete_yields_empty_object() {
        let entry = LogEntry::delete(Timestamp::new(9, 3), "shop.brands", json!("x"));
        let event = EventTranslator::new("brands").translate(&entry);

        assert_eq!(event.id, "9_3");
        assert!(event.event.ends_with("_d"));
        assert_eq!(event.data, json!({}));
    }

    #[test]
    fn event_named_after_first_resource() {
        let entry = LogEntry::insert(Timestamp::new(1, 1), "shop.products", Document::new());
        let event = EventTranslator::new("brands").translate(&entry);
        assert_eq!(event.event, "brands_i");
    }

    #[test]
    fn ticker_event() {
        let event = WireEvent::ticker(4);
        assert_eq!(event.id, "4");
        assert_eq!(event.data, json!(4));
        assert!(event.is_ticker());
    }
}
