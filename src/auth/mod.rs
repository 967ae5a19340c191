//! Credential handling for the message feed API.
//!
//! Interactive login happens outside this program: a browser capture flow
//! records the bearer token, session cookies and impersonation headers into a
//! JSON bundle. This module loads that bundle, bounds how long acquisition may
//! take, and performs the cookie-based token refresh.

pub mod credentials;
pub mod error;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

pub use self::credentials::Credentials;
use self::error::AuthError;
use crate::api::ApiClient;

/// Source of credential bundles.
///
/// `refresh` never mutates shared state; it returns a new bundle which the
/// caller threads through subsequent requests.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn acquire(&self) -> Result<Credentials, AuthError>;

    async fn refresh(&self, current: &Credentials) -> Result<Credentials, AuthError>;
}

/// Acquire credentials, giving up after `timeout`.
pub async fn acquire_with_timeout(
    provider: &dyn CredentialProvider,
    timeout: Duration,
) -> Result<Credentials, AuthError> {
    match tokio::time::timeout(timeout, provider.acquire()).await {
        Ok(result) => result,
        Err(_) => Err(AuthError::Timeout(timeout.as_secs())),
    }
}

/// Provider backed by the bundle file written by the capture flow.
///
/// Refreshed tokens are written back so the next run starts from the newest
/// token.
pub struct FileCredentialProvider {
    path: PathBuf,
    api: ApiClient,
}

impl FileCredentialProvider {
    pub fn new(path: PathBuf, api: ApiClient) -> Self {
        Self { path, api }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, credentials: &Credentials) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(credentials)?;
        let tmp = self.path.with_extension("json.part");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialProvider for FileCredentialProvider {
    async fn acquire(&self) -> Result<Credentials, AuthError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AuthError::Missing(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        let credentials: Credentials =
            serde_json::from_str(&contents).map_err(|source| AuthError::Invalid {
                path: self.path.clone(),
                source,
            })?;
        tracing::debug!("Loaded credentials from {}", self.path.display());
        Ok(credentials)
    }

    async fn refresh(&self, current: &Credentials) -> Result<Credentials, AuthError> {
        if !current.can_refresh() {
            return Err(AuthError::RefreshUnavailable);
        }
        let token = self.api.update_token(current).await?;
        let refreshed = current.with_access_token(token);
        if let Err(e) = self.persist(&refreshed).await {
            tracing::warn!(
                "Refreshed token could not be saved to {}: {}",
                self.path.display(),
                e
            );
        }
        tracing::info!("Access token refreshed");
        Ok(refreshed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("msgsync-rs")
            .join("auth_tests")
            .join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn provider(path: PathBuf) -> FileCredentialProvider {
        FileCredentialProvider::new(path, ApiClient::new("http://127.0.0.1:1").unwrap())
    }

    struct NeverReady;

    #[async_trait]
    impl CredentialProvider for NeverReady {
        async fn acquire(&self) -> Result<Credentials, AuthError> {
            std::future::pending().await
        }

        async fn refresh(&self, _current: &Credentials) -> Result<Credentials, AuthError> {
            Err(AuthError::RefreshUnavailable)
        }
    }

    #[tokio::test]
    async fn test_acquire_reads_bundle() {
        let dir = test_dir("acquire_reads");
        let path = dir.join("credentials.json");
        fs::write(&path, r#"{"access_token": "tok", "cookies": {"s": "1"}}"#).unwrap();

        let creds = provider(path).acquire().await.unwrap();
        assert_eq!(creds.access_token, "tok");
        assert!(creds.can_refresh());
    }

    #[tokio::test]
    async fn test_acquire_missing_file() {
        let dir = test_dir("acquire_missing");
        let err = provider(dir.join("nope.json")).acquire().await.unwrap_err();
        assert!(matches!(err, AuthError::Missing(_)));
    }

    #[tokio::test]
    async fn test_acquire_invalid_file() {
        let dir = test_dir("acquire_invalid");
        let path = dir.join("credentials.json");
        fs::write(&path, "not json").unwrap();
        let err = provider(path).acquire().await.unwrap_err();
        assert!(matches!(err, AuthError::Invalid { .. }));
    }

    #[tokio::test]
    async fn test_refresh_without_cookies_is_unavailable() {
        let dir = test_dir("refresh_no_cookies");
        let err = provider(dir.join("credentials.json"))
            .refresh(&Credentials::new("tok"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::RefreshUnavailable));
    }

    #[tokio::test]
    async fn test_acquire_with_timeout_expires() {
        let err = acquire_with_timeout(&NeverReady, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_persist_round_trips_bundle() {
        let dir = test_dir("persist");
        let path = dir.join("nested").join("credentials.json");
        let p = provider(path.clone());
        let mut creds = Credentials::new("fresh");
        creds.cookies.insert("session".into(), "abc".into());
        p.persist(&creds).await.unwrap();

        let loaded = p.acquire().await.unwrap();
        assert_eq!(loaded, creds);
    }
}
