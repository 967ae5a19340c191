use thiserror::Error;

/// Why a single media download failed. Failures are never retried; the
/// variants exist so the log says what went wrong.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP error {status} downloading {url}")]
    HttpStatus { status: u16, url: String },

    #[error("HTTP error downloading {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Disk error: {0}")]
    Disk(#[from] std::io::Error),
}

impl DownloadError {
    /// Whether the failure came from the remote side rather than local disk.
    pub fn is_remote(&self) -> bool {
        !matches!(self, DownloadError::Disk(_))
    }
}
