use std::fs::FileTimes;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::DateTime;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::error::DownloadError;
use super::paths;

/// Fetches a URL into a local file. Implemented for [`reqwest::Client`];
/// tests substitute a counting fake.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Write the body of `url` to `path`, returning the number of bytes.
    async fn fetch_to(&self, url: &str, path: &Path) -> Result<u64, DownloadError>;
}

#[async_trait]
impl MediaFetcher for Client {
    async fn fetch_to(&self, url: &str, path: &Path) -> Result<u64, DownloadError> {
        let response = self.get(url).send().await.map_err(|source| DownloadError::Http {
            url: url.to_string(),
            source,
        })?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(DownloadError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .await?;

        let mut bytes_written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| DownloadError::Http {
                url: url.to_string(),
                source,
            })?;
            file.write_all(&chunk).await?;
            bytes_written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(bytes_written)
    }
}

/// Download `url` to `destination` through a `.part` file so an interrupted
/// transfer never leaves a file that would later pass the existence check.
pub async fn download_file(
    fetcher: &dyn MediaFetcher,
    url: &str,
    destination: &Path,
) -> Result<u64, DownloadError> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).await?;
    }

    let part = paths::part_path(destination);
    let _ = fs::remove_file(&part).await;

    let bytes = match fetcher.fetch_to(url, &part).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = fs::remove_file(&part).await;
            return Err(e);
        }
    };

    fs::rename(&part, destination).await?;
    Ok(bytes)
}

/// Parse an RFC 3339 publication time into a Unix timestamp.
pub fn parse_source_timestamp(ts: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(ts).ok().map(|dt| dt.timestamp())
}

/// Set the modification and access times of a file to the given Unix
/// timestamp. Timestamps before 1970 are clamped to the epoch.
pub fn set_file_mtime(path: &Path, timestamp: i64) -> std::io::Result<()> {
    let time = if timestamp >= 0 {
        UNIX_EPOCH + Duration::from_secs(timestamp as u64)
    } else {
        SystemTime::UNIX_EPOCH
    };
    let times = FileTimes::new().set_modified(time).set_accessed(time);
    let file = std::fs::File::options().write(true).open(path)?;
    file.set_times(times)?;
    Ok(())
}
