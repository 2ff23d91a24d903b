use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single message exchanged over the event-stream connection.
///
/// `data` is left as an untyped [`Value`] at this layer: the dispatcher looks
/// up `event` in the [`crate::event_descriptor`] table to decide which
/// handler (and therefore which typed payload in [`crate::events`]) applies,
/// then deserializes `data` into that type. `uuid`, when present on an
/// inbound frame, is echoed verbatim on the correlated response so a client
/// can match requests to replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// The protocol verb, e.g. `"INIT_LESSON"` or `"FILE_SAVE"`.
    pub event: String,
    /// The event-specific payload. `null` for events that take no data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Client-supplied correlation id, echoed on the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

impl Frame {
    /// Builds an outbound frame with no correlation id.
    pub fn new(event: impl Into<String>, data: impl Serialize) -> Self {
        Self {
            event: event.into(),
            data: serde_json::to_value(data).ok(),
            uuid: None,
        }
    }

    /// Builds an outbound frame that echoes the given correlation id.
    pub fn with_uuid(event: impl Into<String>, data: impl Serialize, uuid: Option<String>) -> Self {
        Self {
            event: event.into(),
            data: serde_json::to_value(data).ok(),
            uuid,
        }
    }

    /// Deserializes `data` into `T`, treating a missing payload as an empty object.
    pub fn parse<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        match &self.data {
            Some(value) => serde_json::from_value(value.clone()),
            None => serde_json::from_value(Value::Object(Default::default())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let frame = Frame {
            event: "FILE_READ".to_string(),
            data: Some(serde_json::json!({"ownerId": 7, "file": "a.py"})),
            uuid: Some("abc-123".to_string()),
        };
        let text = serde_json::to_string(&frame).unwrap();
        let parsed: Frame = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.event, "FILE_READ");
        assert_eq!(parsed.uuid.as_deref(), Some("abc-123"));
    }

    #[test]
    fn missing_data_parses_as_empty_object() {
        let frame = Frame {
            event: "ALL_PARTICIPANT".to_string(),
            data: None,
            uuid: None,
        };
        #[derive(Deserialize)]
        struct Empty {}
        frame.parse::<Empty>().unwrap();
    }
}
