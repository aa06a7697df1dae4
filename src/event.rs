//! Event payloads: decoded events from feeds and writable events for appends.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::error::EventStoreError;

/// A recorded event read back from a stream.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Event {
    /// Application-defined type name.
    pub event_type: String,
    /// Position of the event within its stream.
    pub version: u64,
    /// Event payload.
    pub data: Value,
    /// Event metadata; `None` when the server sent nothing useful.
    pub metadata: Option<Value>,
    /// Unique identifier, when the server exposes one.
    pub event_id: Option<Uuid>,
}

/// Raw shape of an event document as served by the Atom API.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    event_type: String,
    event_number: u64,
    data: Value,
    #[serde(default)]
    metadata: Value,
    #[serde(default)]
    event_id: Option<String>,
}

impl Event {
    /// Decode an event document.
    ///
    /// Accepts both the enveloped shape (`{"content": {...}}`) returned by
    /// event URIs and the bare shape embedded in rich feeds.
    pub(crate) fn decode(body: &Value) -> Result<Self, EventStoreError> {
        let raw = body.get("content").unwrap_or(body);
        let wire: WireEvent = serde_json::from_value(raw.clone())?;

        // The server serializes "no id" as an empty string.
        let event_id = match wire.event_id.as_deref() {
            None | Some("") => None,
            Some(id) => Some(
                Uuid::parse_str(id).map_err(|err| EventStoreError::Json(err.to_string()))?,
            ),
        };

        Ok(Event {
            event_type: wire.event_type,
            version: wire.event_number,
            data: wire.data,
            metadata: none_if_empty(wire.metadata),
            event_id,
        })
    }
}

/// Collapse the server's assorted "empty" metadata encodings to `None`.
fn none_if_empty(value: Value) -> Option<Value> {
    match &value {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        Value::Array(items) if items.is_empty() => None,
        _ => Some(value),
    }
}

/// An event to be appended to a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct WritableEvent {
    /// Idempotency key for the append.
    pub id: Uuid,
    /// Application-defined type name.
    pub event_type: String,
    /// Event payload.
    pub data: Value,
    /// Event metadata; serialized as `{}` when null.
    pub metadata: Value,
}

impl WritableEvent {
    /// New event with a random id and empty metadata.
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self::with_id(Uuid::new_v4(), event_type, data)
    }

    /// New event with a caller-chosen id, for idempotent retries.
    pub fn with_id(id: Uuid, event_type: impl Into<String>, data: Value) -> Self {
        WritableEvent {
            id,
            event_type: event_type.into(),
            data,
            metadata: Value::Null,
        }
    }

    /// Attach metadata to the event.
    #[must_use]
    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

impl Serialize for WritableEvent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // The write media type requires all four fields; metadata must be an
        // object even when the caller left it empty.
        let mut state = serializer.serialize_struct("WritableEvent", 4)?;
        state.serialize_field("eventId", &self.id)?;
        state.serialize_field("eventType", &self.event_type)?;
        state.serialize_field("data", &self.data)?;
        if self.metadata.is_null() {
            state.serialize_field("metadata", &Value::Object(serde_json::Map::new()))?;
        } else {
            state.serialize_field("metadata", &self.metadata)?;
        }
        state.end()
    }
}

/// Non-empty batch of events appended atomically.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct WritableEventCollection {
    events: Vec<WritableEvent>,
}

impl WritableEventCollection {
    /// Build a collection, rejecting an empty batch.
    pub fn new(events: Vec<WritableEvent>) -> Result<Self, EventStoreError> {
        if events.is_empty() {
            return Err(EventStoreError::EmptyEventCollection);
        }
        Ok(WritableEventCollection { events })
    }

    pub fn events(&self) -> &[WritableEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl From<WritableEvent> for WritableEventCollection {
    fn from(event: WritableEvent) -> Self {
        WritableEventCollection {
            events: vec![event],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_enveloped_event() {
        let body = json!({
            "title": "2@orders",
            "content": {
                "eventStreamId": "orders",
                "eventNumber": 2,
                "eventType": "order_created",
                "eventId": "804dc0ab-ba4f-4ebc-8329-01f3a8f7ab35",
                "data": {"order_id": 12},
                "metadata": {"user": "alice"}
            }
        });

        let event = Event::decode(&body).unwrap();
        assert_eq!(event.event_type, "order_created");
        assert_eq!(event.version, 2);
        assert_eq!(event.data, json!({"order_id": 12}));
        assert_eq!(event.metadata, Some(json!({"user": "alice"})));
        assert_eq!(
            event.event_id,
            Some("804dc0ab-ba4f-4ebc-8329-01f3a8f7ab35".parse().unwrap())
        );
    }

    #[test]
    fn test_decode_bare_event() {
        let body = json!({
            "eventType": "order_created",
            "eventNumber": 0,
            "data": {"order_id": 1}
        });

        let event = Event::decode(&body).unwrap();
        assert_eq!(event.event_type, "order_created");
        assert_eq!(event.version, 0);
        assert_eq!(event.metadata, None);
        assert_eq!(event.event_id, None);
    }

    #[test]
    fn test_decode_normalizes_empty_metadata() {
        for metadata in [json!(null), json!(""), json!({}), json!([])] {
            let body = json!({
                "eventType": "noop",
                "eventNumber": 0,
                "data": {},
                "metadata": metadata.clone()
            });
            let event = Event::decode(&body).unwrap();
            assert_eq!(event.metadata, None, "metadata {metadata}");
        }

        // Absent entirely.
        let body = json!({"eventType": "noop", "eventNumber": 0, "data": {}});
        assert_eq!(Event::decode(&body).unwrap().metadata, None);
    }

    #[test]
    fn test_decode_empty_event_id_is_none() {
        let body = json!({
            "eventType": "noop",
            "eventNumber": 3,
            "data": {},
            "eventId": ""
        });
        assert_eq!(Event::decode(&body).unwrap().event_id, None);
    }

    #[test]
    fn test_decode_requires_data() {
        let body = json!({"eventType": "noop", "eventNumber": 0});
        assert!(matches!(
            Event::decode(&body),
            Err(EventStoreError::Json(_))
        ));
    }

    #[test]
    fn test_writable_event_wire_shape() {
        let id: Uuid = "804dc0ab-ba4f-4ebc-8329-01f3a8f7ab35".parse().unwrap();
        let event = WritableEvent::with_id(id, "order_created", json!({"order_id": 12}))
            .metadata(json!({"user": "alice"}));

        let encoded = serde_json::to_value(&event).unwrap();
        assert_eq!(
            encoded,
            json!({
                "eventId": "804dc0ab-ba4f-4ebc-8329-01f3a8f7ab35",
                "eventType": "order_created",
                "data": {"order_id": 12},
                "metadata": {"user": "alice"}
            })
        );
    }

    #[test]
    fn test_writable_event_null_metadata_serializes_as_object() {
        let event = WritableEvent::new("noop", json!({}));
        let encoded = serde_json::to_value(&event).unwrap();
        assert_eq!(encoded["metadata"], json!({}));
    }

    #[test]
    fn test_collection_preserves_order_and_rejects_empty() {
        let first = WritableEvent::new("a", json!(1));
        let second = WritableEvent::new("b", json!(2));
        let collection =
            WritableEventCollection::new(vec![first.clone(), second.clone()]).unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.events()[0], first);
        assert_eq!(collection.events()[1], second);

        assert!(matches!(
            WritableEventCollection::new(vec![]),
            Err(EventStoreError::EmptyEventCollection)
        ));
    }

    #[test]
    fn test_writable_event_round_trips_through_decode() {
        let written = WritableEvent::new("order_created", json!({"order_id": 9}));
        let mut body = serde_json::to_value(&written).unwrap();
        body["eventNumber"] = json!(0);

        let read = Event::decode(&body).unwrap();
        assert_eq!(read.event_type, written.event_type);
        assert_eq!(read.data, written.data);
        // Empty metadata is not round-trip stable: `{}` reads back as `None`.
        assert_eq!(read.metadata, None);
        assert_eq!(read.event_id, Some(written.id));
    }
}
