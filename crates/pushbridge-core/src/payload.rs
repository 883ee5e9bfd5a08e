//! Raw ingress payload as delivered by the external push source.
//!
//! Implements tolerant reader pattern: unknown fields ignored, every section
//! optional. A data-only push (no `notification` block) is valid.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Display block of a push message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawNotification {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

/// One inbound push message before normalization.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPayload {
    /// Sender reported by the push source. Used for logging only.
    #[serde(default)]
    pub from: Option<String>,

    /// Source-assigned message id.
    #[serde(default)]
    pub message_id: Option<String>,

    #[serde(default)]
    pub notification: Option<RawNotification>,

    /// Key-value data section. Values are kept as raw JSON until
    /// normalization decides whether they fit the string map. `null` reads
    /// as an empty section.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl RawPayload {
    /// Parse a payload from its JSON text form.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::MalformedPayload(e.to_string()))
    }

    /// Message id, treating an empty string as absent.
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Notification title, or `""` when absent.
    pub fn title(&self) -> &str {
        self.notification
            .as_ref()
            .and_then(|n| n.title.as_deref())
            .unwrap_or("")
    }

    /// Notification body, or `""` when absent.
    pub fn body(&self) -> &str {
        self.notification
            .as_ref()
            .and_then(|n| n.body.as_deref())
            .unwrap_or("")
    }

    /// Copy the data section into a string map.
    ///
    /// Strings are copied verbatim; numbers and booleans use their JSON text.
    /// `null`, arrays and objects have no string encoding and fail with
    /// [`Error::MalformedPayload`].
    pub fn data_entries(&self) -> Result<HashMap<String, String>> {
        self.data
            .iter()
            .map(|(key, value)| {
                let encoded = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    Value::Null | Value::Array(_) | Value::Object(_) => {
                        return Err(Error::MalformedPayload(format!(
                            "data entry '{key}' is not a scalar value"
                        )));
                    }
                };
                Ok((key.clone(), encoded))
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_payload() {
        let payload = RawPayload::from_json(
            r#"{"from":"sender-1","messageId":"m1",
                "notification":{"title":"Alert","body":"Check"},
                "data":{"postId":"42"}}"#,
        )
        .unwrap();

        assert_eq!(payload.from.as_deref(), Some("sender-1"));
        assert_eq!(payload.message_id(), Some("m1"));
        assert_eq!(payload.title(), "Alert");
        assert_eq!(payload.body(), "Check");
        assert_eq!(payload.data_entries().unwrap()["postId"], "42");
    }

    #[test]
    fn empty_object_is_a_valid_payload() {
        let payload = RawPayload::from_json("{}").unwrap();
        assert_eq!(payload.message_id(), None);
        assert_eq!(payload.title(), "");
        assert_eq!(payload.body(), "");
        assert!(payload.data_entries().unwrap().is_empty());
    }

    #[test]
    fn null_sections_read_as_absent() {
        let payload = RawPayload::from_json(
            r#"{"messageId":"m1","notification":null,"data":null,"from":null}"#,
        )
        .unwrap();
        assert_eq!(payload.message_id(), Some("m1"));
        assert_eq!(payload.title(), "");
        assert!(payload.data_entries().unwrap().is_empty());
    }

    #[test]
    fn notification_without_title_defaults_to_empty() {
        let payload = RawPayload::from_json(r#"{"notification":{"body":"only body"}}"#).unwrap();
        assert_eq!(payload.title(), "");
        assert_eq!(payload.body(), "only body");
    }

    #[test]
    fn empty_message_id_counts_as_absent() {
        let payload = RawPayload::from_json(r#"{"messageId":""}"#).unwrap();
        assert_eq!(payload.message_id(), None);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let payload = RawPayload::from_json(r#"{"ttl":3600,"priority":"high"}"#).unwrap();
        assert_eq!(payload, RawPayload::default());
    }

    #[test]
    fn scalar_data_values_are_stringified() {
        let payload =
            RawPayload::from_json(r#"{"data":{"count":3,"urgent":true,"ratio":0.5}}"#).unwrap();
        let data = payload.data_entries().unwrap();
        assert_eq!(data["count"], "3");
        assert_eq!(data["urgent"], "true");
        assert_eq!(data["ratio"], "0.5");
    }

    #[test]
    fn nested_data_values_are_malformed() {
        for raw in [
            r#"{"data":{"k":null}}"#,
            r#"{"data":{"k":[1,2]}}"#,
            r#"{"data":{"k":{"nested":"x"}}}"#,
        ] {
            let payload = RawPayload::from_json(raw).unwrap();
            let err = payload.data_entries().unwrap_err();
            assert!(matches!(err, Error::MalformedPayload(_)), "{raw}: {err}");
        }
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = RawPayload::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::MalformedPayload(_)));
    }
}
