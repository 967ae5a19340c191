//! Error types for the state module.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading or writing persisted state.
#[derive(Error, Debug)]
pub enum StateError {
    /// Filesystem failure on the state file or its temporary sibling.
    #[error("State I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The state could not be encoded or decoded.
    #[error("State file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl StateError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn json(path: &std::path::Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}
