use thiserror::Error;

use crate::auth::error::AuthError;

/// Failures talking to the feed API, classified so callers can pick a policy:
/// refresh credentials, skip the unit of work, or abort.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error requesting {url}: {source}")]
    Network { url: String, source: reqwest::Error },

    #[error("Unauthorized (HTTP {status}) requesting {url}")]
    Unauthorized { status: u16, url: String },

    #[error("HTTP {status} requesting {url}")]
    Status { status: u16, url: String },

    #[error("Malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ApiError {
    /// Whether new credentials might make the request succeed.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    pub(crate) fn from_status(status: u16, url: &str) -> Self {
        if status == 401 || status == 403 {
            ApiError::Unauthorized {
                status,
                url: url.to_string(),
            }
        } else {
            ApiError::Status {
                status,
                url: url.to_string(),
            }
        }
    }
}
