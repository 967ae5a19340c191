//! Wire types for the feed API.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One page of a group timeline.
///
/// Records stay untyped here so a single malformed entry cannot fail the whole
/// page; the fetcher decodes them one by one into [`RawMessage`].
#[derive(Debug, Default, Deserialize)]
pub struct TimelinePage {
    #[serde(default)]
    pub messages: Vec<Value>,
    #[serde(default)]
    pub continuation: Option<String>,
}

/// A timeline record as delivered by the API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawMessage {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default, deserialize_with = "deserialize_loose_text")]
    pub text: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default, deserialize_with = "deserialize_loose_bool")]
    pub is_favorite: Option<bool>,
    #[serde(default)]
    pub member_id: Option<i64>,
}

/// Accepts `true`, `1`, `"true"` and `"1"` style flags. Anything else reads
/// as unset rather than failing the record.
fn deserialize_loose_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => Some(b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// Message body; non-string values are kept in their JSON text form.
fn deserialize_loose_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

impl RawMessage {
    /// Media URL carried by the record: `file`, falling back to `thumbnail`.
    pub fn media_url(&self) -> Option<&str> {
        self.file
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.thumbnail.as_deref().filter(|s| !s.is_empty()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    #[serde(default)]
    pub state: Option<String>,
}

/// A subscribed group (artist).
#[derive(Debug, Clone, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub subscription: Option<Subscription>,
}

impl Group {
    fn subscription_state(&self) -> Option<&str> {
        self.subscription.as_ref().and_then(|s| s.state.as_deref())
    }

    pub fn is_active(&self) -> bool {
        self.subscription_state() == Some("active")
    }

    /// Active subscriptions always sync; lapsed ones only when asked to.
    pub fn is_syncable(&self, include_inactive: bool) -> bool {
        match self.subscription_state() {
            Some("active") => true,
            Some("expired" | "suspended" | "canceled") => include_inactive,
            _ => false,
        }
    }
}

/// A member timeline within a group.
#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub portrait: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub phone_image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn group(state: Option<&str>) -> Group {
        serde_json::from_value(json!({
            "id": 1,
            "name": "g",
            "subscription": state.map(|s| json!({"state": s})),
        }))
        .unwrap()
    }

    #[test]
    fn test_media_url_prefers_file() {
        let raw: RawMessage = serde_json::from_value(json!({
            "id": 1, "file": "http://x/a.jpg", "thumbnail": "http://x/t.jpg"
        }))
        .unwrap();
        assert_eq!(raw.media_url(), Some("http://x/a.jpg"));
    }

    #[test]
    fn test_media_url_falls_back_to_thumbnail() {
        let raw: RawMessage = serde_json::from_value(json!({
            "id": 1, "file": null, "thumbnail": "http://x/t.jpg"
        }))
        .unwrap();
        assert_eq!(raw.media_url(), Some("http://x/t.jpg"));
    }

    #[test]
    fn test_favorite_flag_accepts_numbers_and_strings() {
        let flag = |v: Value| {
            serde_json::from_value::<RawMessage>(json!({"id": 1, "is_favorite": v}))
                .unwrap()
                .is_favorite
        };
        assert_eq!(flag(json!(true)), Some(true));
        assert_eq!(flag(json!(1)), Some(true));
        assert_eq!(flag(json!(0)), Some(false));
        assert_eq!(flag(json!("1")), Some(true));
        assert_eq!(flag(json!("false")), Some(false));
        assert_eq!(flag(json!({"x": 1})), None);
        assert_eq!(flag(Value::Null), None);
    }

    #[test]
    fn test_non_string_text_is_kept() {
        let raw: RawMessage =
            serde_json::from_value(json!({"id": 1, "type": "text", "text": 12345})).unwrap();
        assert_eq!(raw.text.as_deref(), Some("12345"));

        let raw: RawMessage =
            serde_json::from_value(json!({"id": 2, "type": "text", "text": null})).unwrap();
        assert_eq!(raw.text, None);
    }

    #[test]
    fn test_raw_message_requires_id() {
        assert!(serde_json::from_value::<RawMessage>(json!({"type": "text"})).is_err());
    }

    #[test]
    fn test_page_tolerates_missing_fields() {
        let page: TimelinePage = serde_json::from_value(json!({})).unwrap();
        assert!(page.messages.is_empty());
        assert!(page.continuation.is_none());
    }

    #[test]
    fn test_group_syncable_states() {
        assert!(group(Some("active")).is_syncable(false));
        assert!(group(Some("active")).is_active());
        assert!(!group(Some("expired")).is_syncable(false));
        assert!(group(Some("expired")).is_syncable(true));
        assert!(group(Some("canceled")).is_syncable(true));
        assert!(!group(Some("pending")).is_syncable(true));
        assert!(!group(None).is_syncable(true));
    }
}
