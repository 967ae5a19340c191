//! Canonical message schema persisted in `messages.json`.

use serde::{Deserialize, Deserializer, Serialize};

/// Canonical message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Picture,
    Video,
    Voice,
}

impl MessageType {
    /// Map an API record type onto the canonical kind. Unknown or missing
    /// types are text.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some("image" | "picture") => Self::Picture,
            Some("video" | "movie") => Self::Video,
            Some("voice") => Self::Voice,
            _ => Self::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Picture => "picture",
            Self::Video => "video",
            Self::Voice => "voice",
        }
    }

    /// Subdirectory of the member directory holding this kind's media.
    /// Text messages that still carry a file land in `other`.
    pub fn media_dir(&self) -> &'static str {
        match self {
            Self::Text => "other",
            Self::Picture => "picture",
            Self::Video => "video",
            Self::Voice => "voice",
        }
    }

    /// Extension used when the media URL does not reveal one.
    pub fn default_extension(&self) -> &'static str {
        match self {
            Self::Picture => "jpg",
            Self::Video => "mp4",
            Self::Voice => "m4a",
            Self::Text => "bin",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    /// ISO 8601 publication time as delivered by the API. Compared as a string.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub content: Option<String>,
    /// Media path relative to the output directory, `/`-separated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_file: Option<String>,
}

// Older exports may carry `"timestamp": null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_mapping_table() {
        assert_eq!(MessageType::from_raw(Some("image")), MessageType::Picture);
        assert_eq!(MessageType::from_raw(Some("picture")), MessageType::Picture);
        assert_eq!(MessageType::from_raw(Some("video")), MessageType::Video);
        assert_eq!(MessageType::from_raw(Some("movie")), MessageType::Video);
        assert_eq!(MessageType::from_raw(Some("voice")), MessageType::Voice);
        assert_eq!(MessageType::from_raw(Some("text")), MessageType::Text);
        assert_eq!(MessageType::from_raw(Some("sticker")), MessageType::Text);
        assert_eq!(MessageType::from_raw(None), MessageType::Text);
    }

    #[test]
    fn test_type_serializes_lowercase() {
        assert_eq!(serde_json::to_value(MessageType::Picture).unwrap(), json!("picture"));
    }

    #[test]
    fn test_message_without_media_omits_field() {
        let msg = Message {
            id: 1,
            timestamp: "2024-01-01T00:00:00Z".into(),
            kind: MessageType::Text,
            is_favorite: false,
            content: Some("hi".into()),
            media_file: None,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "text");
        assert!(value.get("media_file").is_none());
    }

    #[test]
    fn test_message_accepts_null_timestamp() {
        let msg: Message = serde_json::from_value(json!({
            "id": 5, "timestamp": null, "type": "voice", "is_favorite": true, "content": null
        }))
        .unwrap();
        assert_eq!(msg.timestamp, "");
        assert_eq!(msg.kind, MessageType::Voice);
        assert!(msg.is_favorite);
    }
}
