//! Raw timeline records → canonical [`Message`]s.
//!
//! The conversion goes through [`FeedRecord`], a per-kind record type, so
//! nothing past this module handles loosely shaped API data.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::message::{Message, MessageType};
use crate::api::responses::RawMessage;
use crate::download::paths;
use crate::download::DownloadTask;

/// Extensions taken verbatim from a media URL.
const KNOWN_MEDIA_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "m4a", "mp3", "wav", "mp4", "mov", "webm",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Message {id} has no published_at timestamp")]
    MissingTimestamp { id: i64 },

    #[error("Media path {path} for message {id} is outside the output directory")]
    MediaOutsideOutput { id: i64, path: PathBuf },
}

/// Fields shared by every record kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub id: i64,
    pub timestamp: String,
    pub content: Option<String>,
    pub is_favorite: bool,
}

/// A timeline record after validation, discriminated by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedRecord {
    /// Plain text. Some text records still carry a file.
    Text {
        header: RecordHeader,
        attachment: Option<String>,
    },
    Picture {
        header: RecordHeader,
        url: Option<String>,
    },
    Video {
        header: RecordHeader,
        url: Option<String>,
    },
    Voice {
        header: RecordHeader,
        url: Option<String>,
    },
}

impl FeedRecord {
    pub fn from_raw(raw: &RawMessage) -> Result<Self, NormalizeError> {
        let timestamp = raw
            .published_at
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(NormalizeError::MissingTimestamp { id: raw.id })?;
        let header = RecordHeader {
            id: raw.id,
            timestamp,
            content: raw.text.clone(),
            is_favorite: raw.is_favorite.unwrap_or(false),
        };
        let url = raw.media_url().map(str::to_owned);

        Ok(match MessageType::from_raw(raw.kind.as_deref()) {
            MessageType::Text => FeedRecord::Text {
                header,
                attachment: url,
            },
            MessageType::Picture => FeedRecord::Picture { header, url },
            MessageType::Video => FeedRecord::Video { header, url },
            MessageType::Voice => FeedRecord::Voice { header, url },
        })
    }

    pub fn kind(&self) -> MessageType {
        match self {
            FeedRecord::Text { .. } => MessageType::Text,
            FeedRecord::Picture { .. } => MessageType::Picture,
            FeedRecord::Video { .. } => MessageType::Video,
            FeedRecord::Voice { .. } => MessageType::Voice,
        }
    }

    pub fn header(&self) -> &RecordHeader {
        match self {
            FeedRecord::Text { header, .. }
            | FeedRecord::Picture { header, .. }
            | FeedRecord::Video { header, .. }
            | FeedRecord::Voice { header, .. } => header,
        }
    }

    pub fn media_url(&self) -> Option<&str> {
        match self {
            FeedRecord::Text { attachment, .. } => attachment.as_deref(),
            FeedRecord::Picture { url, .. }
            | FeedRecord::Video { url, .. }
            | FeedRecord::Voice { url, .. } => url.as_deref(),
        }
    }

    /// Canonical message without a resolved media path.
    pub fn to_message(&self) -> Message {
        let header = self.header();
        Message {
            id: header.id,
            timestamp: header.timestamp.clone(),
            kind: self.kind(),
            is_favorite: header.is_favorite,
            content: header.content.clone(),
            media_file: None,
        }
    }
}

/// Media referenced by a normalized message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub url: String,
    pub extension: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMessage {
    pub message: Message,
    pub media: Option<MediaRef>,
}

/// Determine a media file's extension from its URL, falling back to the
/// default for the message kind.
pub fn get_media_extension(url: Option<&str>, kind: MessageType) -> String {
    if let Some(ext) = url.and_then(url_extension) {
        if KNOWN_MEDIA_EXTENSIONS.contains(&ext.as_str()) {
            return ext;
        }
    }
    kind.default_extension().to_string()
}

/// Lowercased text after the last `.` of the URL path. Query strings and
/// fragments never contribute.
fn url_extension(raw: &str) -> Option<String> {
    let path = match url::Url::parse(raw) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    path.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

pub fn normalize_message(raw: &RawMessage) -> Result<NormalizedMessage, NormalizeError> {
    let record = FeedRecord::from_raw(raw)?;
    let media = record.media_url().map(|url| MediaRef {
        url: url.to_string(),
        extension: get_media_extension(Some(url), record.kind()),
    });
    Ok(NormalizedMessage {
        message: record.to_message(),
        media,
    })
}

/// Messages ready to merge, plus the downloads they require.
#[derive(Debug, Default)]
pub struct PreparedBatch {
    pub messages: Vec<Message>,
    pub tasks: Vec<DownloadTask>,
    pub errors: Vec<NormalizeError>,
}

/// Normalize a batch of records for one member, resolving each media
/// reference to `{member_dir}/{kind}/{id}.{ext}`.
///
/// A download task is produced only when that file is not already on disk.
/// An existence check that errors counts as absent; the download worker
/// reports the underlying problem. Bad records are collected in `errors` and
/// left out of `messages`.
pub async fn prepare_batch(
    records: &[RawMessage],
    output_dir: &Path,
    member_dir: &Path,
) -> PreparedBatch {
    let mut batch = PreparedBatch::default();

    for raw in records {
        let normalized = match normalize_message(raw) {
            Ok(n) => n,
            Err(e) => {
                batch.errors.push(e);
                continue;
            }
        };
        let mut message = normalized.message;

        if let Some(media) = normalized.media {
            let path = paths::media_path(member_dir, message.kind, message.id, &media.extension);
            let relative = match paths::relative_media_path(output_dir, &path) {
                Some(r) => r,
                None => {
                    batch.errors.push(NormalizeError::MediaOutsideOutput {
                        id: message.id,
                        path,
                    });
                    continue;
                }
            };
            if !matches!(tokio::fs::try_exists(&path).await, Ok(true)) {
                batch.tasks.push(DownloadTask {
                    url: media.url,
                    destination: path,
                    source_timestamp: Some(message.timestamp.clone()),
                });
            }
            message.media_file = Some(relative);
        }

        batch.messages.push(message);
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn raw(value: serde_json::Value) -> RawMessage {
        serde_json::from_value(value).unwrap()
    }

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("msgsync-rs")
            .join("normalize_tests")
            .join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_extension_from_url() {
        assert_eq!(get_media_extension(Some("http://example.com/file.jpg"), MessageType::Picture), "jpg");
        assert_eq!(
            get_media_extension(Some("http://example.com/file.mp4?query=1"), MessageType::Video),
            "mp4"
        );
        assert_eq!(get_media_extension(Some("http://example.com/a/B.PNG"), MessageType::Picture), "png");
    }

    #[test]
    fn test_extension_falls_back_to_kind_default() {
        assert_eq!(get_media_extension(Some("http://example.com/file"), MessageType::Picture), "jpg");
        assert_eq!(get_media_extension(None, MessageType::Voice), "m4a");
        assert_eq!(get_media_extension(Some("http://x/clip.avi"), MessageType::Video), "mp4");
        assert_eq!(get_media_extension(Some("http://x/blob.xyz"), MessageType::Text), "bin");
    }

    #[test]
    fn test_extension_ignores_dots_outside_path() {
        assert_eq!(
            get_media_extension(Some("https://cdn.example.com/media?name=a.png"), MessageType::Voice),
            "m4a"
        );
        assert_eq!(get_media_extension(Some("not a url/file.webm?x=1"), MessageType::Video), "webm");
    }

    #[test]
    fn test_normalize_picture() {
        let n = normalize_message(&raw(json!({
            "id": 123,
            "published_at": "2023-01-01T00:00:00Z",
            "text": "Hello",
            "type": "image",
            "file": "http://img.com/a.jpg"
        })))
        .unwrap();

        assert_eq!(n.message.id, 123);
        assert_eq!(n.message.kind, MessageType::Picture);
        assert_eq!(n.message.content.as_deref(), Some("Hello"));
        assert!(!n.message.is_favorite);
        assert_eq!(
            n.media,
            Some(MediaRef {
                url: "http://img.com/a.jpg".into(),
                extension: "jpg".into()
            })
        );
    }

    #[test]
    fn test_normalize_text_has_no_media() {
        let n = normalize_message(&raw(json!({
            "id": 1, "type": "text", "published_at": "t", "is_favorite": true
        })))
        .unwrap();
        assert_eq!(n.message.kind, MessageType::Text);
        assert!(n.message.is_favorite);
        assert!(n.media.is_none());
    }

    #[test]
    fn test_normalize_requires_timestamp() {
        let err = normalize_message(&raw(json!({"id": 9, "type": "movie"}))).unwrap_err();
        assert_eq!(err, NormalizeError::MissingTimestamp { id: 9 });
    }

    #[test]
    fn test_feed_record_kinds() {
        let movie = FeedRecord::from_raw(&raw(json!({
            "id": 2, "type": "movie", "published_at": "t", "thumbnail": "http://x/t.jpg"
        })))
        .unwrap();
        assert_eq!(movie.kind(), MessageType::Video);
        assert_eq!(movie.media_url(), Some("http://x/t.jpg"));

        let unknown = FeedRecord::from_raw(&raw(json!({
            "id": 3, "published_at": "t", "file": "http://x/f.bin"
        })))
        .unwrap();
        assert!(matches!(unknown, FeedRecord::Text { .. }));
        assert_eq!(unknown.media_url(), Some("http://x/f.bin"));
    }

    #[tokio::test]
    async fn test_prepare_batch_resolves_paths_and_tasks() {
        let out = test_dir("prepare_paths");
        let member_dir = out.join("1_Group").join("2_Member");
        let records = vec![
            raw(json!({"id": 10, "type": "image", "published_at": "t1", "file": "http://x/a.jpg"})),
            raw(json!({"id": 11, "type": "voice", "published_at": "t2", "file": "http://x/v"})),
            raw(json!({"id": 12, "type": "text", "published_at": "t3", "text": "hey"})),
        ];

        let batch = prepare_batch(&records, &out, &member_dir).await;

        assert!(batch.errors.is_empty());
        assert_eq!(batch.messages.len(), 3);
        assert_eq!(
            batch.messages[0].media_file.as_deref(),
            Some("1_Group/2_Member/picture/10.jpg")
        );
        assert_eq!(
            batch.messages[1].media_file.as_deref(),
            Some("1_Group/2_Member/voice/11.m4a")
        );
        assert!(batch.messages[2].media_file.is_none());

        assert_eq!(batch.tasks.len(), 2);
        assert_eq!(batch.tasks[0].url, "http://x/a.jpg");
        assert_eq!(batch.tasks[0].destination, member_dir.join("picture").join("10.jpg"));
        assert_eq!(batch.tasks[0].source_timestamp.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn test_prepare_batch_skips_existing_files() {
        let out = test_dir("prepare_existing");
        let member_dir = out.join("m");
        fs::create_dir_all(member_dir.join("video")).unwrap();
        fs::write(member_dir.join("video").join("5.mp4"), b"x").unwrap();

        let records = vec![raw(
            json!({"id": 5, "type": "video", "published_at": "t", "file": "http://x/5.mp4"}),
        )];
        let batch = prepare_batch(&records, &out, &member_dir).await;

        assert!(batch.tasks.is_empty());
        assert_eq!(batch.messages[0].media_file.as_deref(), Some("m/video/5.mp4"));
    }

    #[tokio::test]
    async fn test_prepare_batch_isolates_bad_records() {
        let out = test_dir("prepare_bad");
        let records = vec![
            raw(json!({"id": 1, "type": "text", "published_at": "t"})),
            raw(json!({"id": 2, "type": "image", "file": "http://x/2.jpg"})),
            raw(json!({"id": 3, "type": "text", "published_at": "t"})),
        ];
        let batch = prepare_batch(&records, &out, &out.join("m")).await;

        assert_eq!(batch.messages.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(batch.errors, vec![NormalizeError::MissingTimestamp { id: 2 }]);
        assert!(batch.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_prepare_batch_text_attachment_goes_to_other() {
        let out = test_dir("prepare_other");
        let records = vec![raw(
            json!({"id": 7, "type": "link", "published_at": "t", "file": "http://x/doc"}),
        )];
        let batch = prepare_batch(&records, &out, &out.join("m")).await;
        assert_eq!(batch.messages[0].media_file.as_deref(), Some("m/other/7.bin"));
    }
}
