use std::path::PathBuf;

use thiserror::Error;

use crate::state::StateError;

/// Failure of one member's sync cycle. Never aborts the other members.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The existing export could not be parsed. It is left untouched.
    #[error("Existing export {path} is corrupt: {source}")]
    CorruptExport {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    State(#[from] StateError),
}

impl SyncError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
