use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;

use super::error::StateError;
use super::types::{Checkpoint, CheckpointKey};

/// File name of the checkpoint map inside the output directory.
pub const STATE_FILE: &str = "sync_state.json";

/// Checkpoints for every tracked entity, backed by one JSON file.
///
/// Single writer: the store is loaded once at startup and every update is
/// written through immediately.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    entries: BTreeMap<String, Checkpoint>,
}

impl CheckpointStore {
    /// Read the store at `path`. A missing file is an empty store; an
    /// unreadable or corrupt one is logged and also treated as empty, so the
    /// next update rewrites it.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Sync state is corrupt, starting from an empty state"
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Could not read sync state, starting from an empty state"
                );
                BTreeMap::new()
            }
        };
        tracing::debug!(path = %path.display(), entries = entries.len(), "Loaded sync state");
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Highest message id already synchronized for `key`.
    pub fn get(&self, key: CheckpointKey) -> Option<i64> {
        self.checkpoint(key).map(|cp| cp.last_message_id)
    }

    pub fn checkpoint(&self, key: CheckpointKey) -> Option<&Checkpoint> {
        self.entries.get(&key.to_string())
    }

    /// All checkpoints, ordered by key.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Checkpoint)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a successful sync of `key` and persist the whole store.
    ///
    /// `last_message_id` never decreases: a lower value than the stored one
    /// keeps the stored id while still refreshing the totals and timestamp.
    pub fn update(
        &mut self,
        key: CheckpointKey,
        last_message_id: i64,
        total_messages: usize,
    ) -> Result<(), StateError> {
        let last_message_id = self
            .get(key)
            .map_or(last_message_id, |prev| prev.max(last_message_id));
        self.entries.insert(
            key.to_string(),
            Checkpoint {
                last_message_id,
                total_messages,
                last_sync: Utc::now(),
            },
        );
        self.flush()
    }

    /// Write the whole map through a temporary file and rename it into place.
    pub fn flush(&self) -> Result<(), StateError> {
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| StateError::json(&self.path, e))?;
        write_atomic(&self.path, json.as_bytes())
    }
}

/// Write `contents` to a `.tmp` sibling of `path`, then rename over `path`.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StateError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| StateError::io(parent, e))?;
        }
    }
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    std::fs::write(&tmp, contents).map_err(|e| StateError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| StateError::io(path, e))?;
    Ok(())
}
