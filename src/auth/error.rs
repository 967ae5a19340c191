use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while acquiring or refreshing the credential bundle.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No credentials found at {0}; capture a browser session first")]
    Missing(PathBuf),

    #[error("Invalid credentials file {path}: {source}")]
    Invalid {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Timed out after {0}s waiting for credentials")]
    Timeout(u64),

    #[error("No session cookies available for token refresh")]
    RefreshUnavailable,

    #[error("Token refresh rejected (HTTP {0})")]
    RefreshRejected(u16),

    #[error("Token refresh response did not contain an access token")]
    MissingToken,

    #[error("Credential value for header '{0}' is not a valid HTTP header")]
    InvalidHeader(&'static str),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
