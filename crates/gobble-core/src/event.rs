//! Raw events delivered by a realtime session.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GobbleError, GobbleResult};

/// The event type the runtime acts on.
pub const MESSAGE_EVENT_TYPE: &str = "message";

/// A raw event record as delivered by the transport.
///
/// Events are kept as untyped JSON since backends deliver many event kinds
/// (presence changes, typing notifications, ...) and only messages are of
/// interest. Accessors return `None` when a field is absent or has an
/// unexpected type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEvent(Value);

impl RawEvent {
    /// Wraps a JSON value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Parses an event from its JSON string form.
    pub fn from_json(raw: &str) -> GobbleResult<Self> {
        serde_json::from_str(raw)
            .map(Self)
            .map_err(|e| GobbleError::malformed(format!("invalid event JSON: {e}")))
    }

    /// Returns the underlying JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Returns the event's fields if it is a JSON object.
    pub fn fields(&self) -> Option<&Map<String, Value>> {
        self.0.as_object()
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// The `type` field.
    pub fn event_type(&self) -> Option<&str> {
        self.str_field("type")
    }

    /// Whether this is a `message` event.
    pub fn is_message(&self) -> bool {
        self.event_type() == Some(MESSAGE_EVENT_TYPE)
    }

    /// Whether the backend marked this event as hidden.
    ///
    /// Empty or zero markers (`""`, `0`, `[]`, `{}`) do not hide an event.
    pub fn is_hidden(&self) -> bool {
        match self.0.get("hidden") {
            Some(Value::Bool(hidden)) => *hidden,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Object(fields)) => !fields.is_empty(),
            Some(Value::Null) | None => false,
        }
    }

    /// The sending user's id.
    pub fn user(&self) -> Option<&str> {
        self.str_field("user")
    }

    /// The message text.
    pub fn text(&self) -> Option<&str> {
        self.str_field("text")
    }

    /// The channel the event happened in.
    pub fn channel(&self) -> Option<&str> {
        self.str_field("channel")
    }

    /// The team the event belongs to.
    pub fn team(&self) -> Option<&str> {
        self.str_field("team")
    }

    /// The backend timestamp, normalized to a string.
    ///
    /// Backends send timestamps either as strings (`"1459618784.000031"`) or
    /// as plain numbers.
    pub fn timestamp(&self) -> Option<String> {
        match self.0.get("ts")? {
            Value::String(ts) => Some(ts.clone()),
            Value::Number(ts) => Some(ts.to_string()),
            _ => None,
        }
    }
}

impl From<Value> for RawEvent {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl fmt::Display for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accessors() {
        let event = RawEvent::new(json!({
            "type": "message",
            "team": "TFAKE123",
            "user": "UFAKE123",
            "text": "edi test",
            "channel": "CFAKE123",
            "ts": "1459618784.000031"
        }));

        assert!(event.is_message());
        assert!(!event.is_hidden());
        assert_eq!(event.user(), Some("UFAKE123"));
        assert_eq!(event.text(), Some("edi test"));
        assert_eq!(event.channel(), Some("CFAKE123"));
        assert_eq!(event.team(), Some("TFAKE123"));
        assert_eq!(event.timestamp().as_deref(), Some("1459618784.000031"));
    }

    #[test]
    fn test_numeric_timestamp() {
        let event = RawEvent::new(json!({"type": "message", "ts": 1459618784.5}));
        assert_eq!(event.timestamp().as_deref(), Some("1459618784.5"));
    }

    #[test]
    fn test_hidden_markers() {
        assert!(RawEvent::new(json!({"hidden": true})).is_hidden());
        assert!(!RawEvent::new(json!({"hidden": false})).is_hidden());
        assert!(!RawEvent::new(json!({"hidden": null})).is_hidden());
        assert!(RawEvent::new(json!({"hidden": "yes"})).is_hidden());
        assert!(RawEvent::new(json!({"hidden": 1})).is_hidden());
        assert!(RawEvent::new(json!({"hidden": ["bot"]})).is_hidden());
        assert!(!RawEvent::new(json!({"hidden": ""})).is_hidden());
        assert!(!RawEvent::new(json!({"hidden": 0})).is_hidden());
        assert!(!RawEvent::new(json!({"hidden": 0.0})).is_hidden());
        assert!(!RawEvent::new(json!({"hidden": []})).is_hidden());
        assert!(!RawEvent::new(json!({"hidden": {}})).is_hidden());
    }

    #[test]
    fn test_untyped_event() {
        let event = RawEvent::from_json(r#"{"reply_to": 1, "ok": true}"#).unwrap();
        assert_eq!(event.event_type(), None);
        assert!(!event.is_message());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            RawEvent::from_json("{not json"),
            Err(GobbleError::MalformedEvent(_))
        ));
    }
}
