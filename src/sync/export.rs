//! Per-member `messages.json` export.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::SyncError;
use super::merge::{MergedSet, TypeCounts};
use super::message::Message;
use crate::api::responses::{Group, Member};
use crate::download::paths;
use crate::state::checkpoint::write_atomic;
use crate::state::StateError;

/// File name of the export inside each member directory.
pub const EXPORT_FILE: &str = "messages.json";

/// Member metadata written at the top of the export. `name` is the
/// sanitized form used for the member directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub id: i64,
    pub name: String,
    pub group_id: i64,
    pub portrait: Option<String>,
    pub thumbnail: Option<String>,
    pub phone_image: Option<String>,
    pub group_thumbnail: Option<String>,
    pub is_active: bool,
}

impl MemberInfo {
    pub fn new(group: &Group, member: &Member) -> Self {
        Self {
            id: member.id,
            name: paths::sanitize_name(&member.name),
            group_id: group.id,
            portrait: member.portrait.clone(),
            thumbnail: member.thumbnail.clone(),
            phone_image: member.phone_image.clone(),
            group_thumbnail: group.thumbnail.clone(),
            is_active: group.is_active(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberExport {
    pub exported_at: DateTime<Utc>,
    pub member: MemberInfo,
    pub total_messages: usize,
    pub message_type_counts: TypeCounts,
    pub messages: Vec<Message>,
}

impl MemberExport {
    pub fn new(member: MemberInfo, merged: MergedSet) -> Self {
        Self {
            exported_at: Utc::now(),
            member,
            total_messages: merged.messages.len(),
            message_type_counts: merged.counts,
            messages: merged.messages,
        }
    }
}

// Only the message list matters when reading back; older exports may lack
// or disagree on the metadata fields.
#[derive(Deserialize)]
struct StoredMessages {
    #[serde(default)]
    messages: Vec<Message>,
}

/// Messages already persisted at `path`. A missing file is an empty history;
/// an unparsable one is an error so the caller does not overwrite it.
pub fn load_existing(path: &Path) -> Result<Vec<Message>, SyncError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SyncError::io(path, e)),
    };
    let stored: StoredMessages =
        serde_json::from_str(&raw).map_err(|source| SyncError::CorruptExport {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(stored.messages)
}

/// Write `export` to `path` atomically.
pub fn write_export(path: &Path, export: &MemberExport) -> Result<(), SyncError> {
    let json = serde_json::to_string_pretty(export).map_err(|e| StateError::json(path, e))?;
    write_atomic(path, json.as_bytes())?;
    Ok(())
}
