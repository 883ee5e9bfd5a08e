//! Normalized notification events.
//!
//! A [`NotificationEvent`] is built once per inbound push, handed through the
//! relay, and discarded after delivery. Its JSON form is the record injected
//! into the consumer context:
//!
//! ```json
//! {"id":"m1","title":"Alert","body":"Check","data":{"postId":"42"},"receivedAt":1700000000000}
//! ```

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One normalized push message.
///
/// Fields are private: once constructed the event is immutable. The `id` is
/// guaranteed non-empty, both on construction and on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "WireEvent")]
pub struct NotificationEvent {
    id: String,
    title: String,
    body: String,
    data: HashMap<String, String>,
    received_at: i64,
}

/// Tolerant decode shape: only `id` is required.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    data: HashMap<String, String>,
    #[serde(default)]
    received_at: i64,
}

impl TryFrom<WireEvent> for NotificationEvent {
    type Error = Error;

    fn try_from(wire: WireEvent) -> Result<Self> {
        Self::new(wire.id, wire.title, wire.body, wire.data, wire.received_at)
    }
}

impl NotificationEvent {
    /// Construct an event, rejecting an empty `id`.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        data: HashMap<String, String>,
        received_at: i64,
    ) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidEvent("id must not be empty".into()));
        }
        Ok(Self {
            id,
            title: title.into(),
            body: body.into(),
            data,
            received_at,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub const fn data(&self) -> &HashMap<String, String> {
        &self.data
    }

    /// Unix timestamp in milliseconds at which the event was normalized.
    pub const fn received_at(&self) -> i64 {
        self.received_at
    }

    /// Encode to the self-describing JSON record.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a JSON record produced by [`NotificationEvent::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Returns the current time as a Unix timestamp in milliseconds.
#[allow(clippy::cast_possible_truncation)]
pub fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample(data: HashMap<String, String>) -> NotificationEvent {
        NotificationEvent::new("m1", "Alert", "Check", data, 1_700_000_000_000).unwrap()
    }

    #[test]
    fn empty_id_is_rejected() {
        let err = NotificationEvent::new("", "t", "b", HashMap::new(), 0).unwrap_err();
        assert!(matches!(err, Error::InvalidEvent(_)));
    }

    #[test]
    fn json_has_all_fields_with_nested_data() {
        let mut data = HashMap::new();
        data.insert("postId".to_string(), "42".to_string());
        let json: serde_json::Value =
            serde_json::from_str(&sample(data).to_json().unwrap()).unwrap();

        assert_eq!(json["id"], "m1");
        assert_eq!(json["title"], "Alert");
        assert_eq!(json["body"], "Check");
        assert_eq!(json["data"]["postId"], "42");
        assert_eq!(json["receivedAt"], 1_700_000_000_000_i64);
    }

    #[test]
    fn empty_fields_are_still_encoded() {
        let event = NotificationEvent::new("x", "", "", HashMap::new(), 5).unwrap();
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();

        assert_eq!(json["title"], "");
        assert_eq!(json["body"], "");
        assert!(json["data"].as_object().unwrap().is_empty());
    }

    #[test]
    fn decode_restores_every_field() {
        let mut data = HashMap::new();
        data.insert("a".to_string(), "1".to_string());
        data.insert("b".to_string(), String::new());
        let original = sample(data);

        let decoded = NotificationEvent::from_json(&original.to_json().unwrap()).unwrap();
        assert_eq!(decoded, original);

        let bare = sample(HashMap::new());
        assert_eq!(NotificationEvent::from_json(&bare.to_json().unwrap()).unwrap(), bare);
    }

    #[test]
    fn decode_tolerates_missing_optional_fields() {
        let event = NotificationEvent::from_json(r#"{"id":"only-id"}"#).unwrap();
        assert_eq!(event.id(), "only-id");
        assert_eq!(event.title(), "");
        assert_eq!(event.body(), "");
        assert!(event.data().is_empty());
    }

    #[test]
    fn decode_rejects_empty_or_missing_id() {
        assert!(NotificationEvent::from_json(r#"{"id":""}"#).is_err());
        assert!(NotificationEvent::from_json(r#"{"title":"t"}"#).is_err());
    }

    #[test]
    fn unix_millis_is_after_2020() {
        assert!(unix_millis() > 1_577_836_800_000);
    }
}
