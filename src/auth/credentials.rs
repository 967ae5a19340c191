use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, COOKIE, USER_AGENT};
use serde::{Deserialize, Serialize};

use super::error::AuthError;

/// App id the web client sends when the capture flow did not record one.
pub const DEFAULT_APP_ID: &str = "jp.co.sonymusic.communication.keyakizaka 2.5";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Credential bundle captured from a logged-in browser session.
///
/// Treated as an immutable value: a token refresh produces a new bundle via
/// [`Credentials::with_access_token`] which callers pass explicitly to later
/// requests.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
    #[serde(rename = "x-talk-app-id", default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(rename = "user-agent", default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("cookies", &self.cookies.keys().collect::<Vec<_>>())
            .field("app_id", &self.app_id())
            .field("user_agent", &self.user_agent())
            .finish()
    }
}

impl Credentials {
    /// Bundle holding only an access token. Real bundles are read from disk.
    #[cfg(test)]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            cookies: BTreeMap::new(),
            app_id: None,
            user_agent: None,
        }
    }

    pub fn app_id(&self) -> &str {
        self.app_id.as_deref().unwrap_or(DEFAULT_APP_ID)
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    /// Whether a cookie-based token refresh can be attempted.
    pub fn can_refresh(&self) -> bool {
        !self.cookies.is_empty()
    }

    /// Return a copy of this bundle carrying a new access token.
    pub fn with_access_token(&self, token: impl Into<String>) -> Self {
        Self {
            access_token: token.into(),
            ..self.clone()
        }
    }

    /// Render the session cookies as a single `Cookie` header value.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        Some(pairs.join("; "))
    }

    /// Build the impersonation headers sent with every feed request.
    pub fn headers(&self) -> Result<HeaderMap, AuthError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-talk-app-id",
            HeaderValue::from_str(self.app_id())
                .map_err(|_| AuthError::InvalidHeader("x-talk-app-id"))?,
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(self.user_agent())
                .map_err(|_| AuthError::InvalidHeader("user-agent"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if !self.access_token.is_empty() {
            let mut bearer = HeaderValue::from_str(&format!("Bearer {}", self.access_token))
                .map_err(|_| AuthError::InvalidHeader("authorization"))?;
            bearer.set_sensitive(true);
            headers.insert(AUTHORIZATION, bearer);
        }
        if let Some(cookie) = self.cookie_header() {
            let mut value =
                HeaderValue::from_str(&cookie).map_err(|_| AuthError::InvalidHeader("cookie"))?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_capture_omitted_headers() {
        let creds = Credentials::new("tok");
        assert_eq!(creds.app_id(), DEFAULT_APP_ID);
        assert_eq!(creds.user_agent(), DEFAULT_USER_AGENT);
        assert!(!creds.can_refresh());
    }

    #[test]
    fn test_deserialize_captured_bundle_with_null_headers() {
        let raw = r#"{
            "access_token": "abc",
            "x-talk-app-id": null,
            "user-agent": "UA/1.0",
            "cookies": {"session": "s1", "csrf": "c2"}
        }"#;
        let creds: Credentials = serde_json::from_str(raw).unwrap();
        assert_eq!(creds.access_token, "abc");
        assert_eq!(creds.app_id(), DEFAULT_APP_ID);
        assert_eq!(creds.user_agent(), "UA/1.0");
        assert!(creds.can_refresh());
        assert!(creds.refresh_token.is_none());
    }

    #[test]
    fn test_cookie_header_is_sorted_and_joined() {
        let mut creds = Credentials::new("tok");
        creds.cookies.insert("b".into(), "2".into());
        creds.cookies.insert("a".into(), "1".into());
        assert_eq!(creds.cookie_header().as_deref(), Some("a=1; b=2"));
    }

    #[test]
    fn test_headers_carry_bearer_and_app_id() {
        let creds = Credentials::new("tok");
        let headers = creds.headers().unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer tok");
        assert_eq!(headers["x-talk-app-id"], DEFAULT_APP_ID);
        assert!(headers.get(COOKIE).is_none());
    }

    #[test]
    fn test_headers_reject_invalid_user_agent() {
        let mut creds = Credentials::new("tok");
        creds.user_agent = Some("bad\nagent".into());
        assert!(matches!(
            creds.headers(),
            Err(AuthError::InvalidHeader("user-agent"))
        ));
    }

    #[test]
    fn test_with_access_token_leaves_original_untouched() {
        let mut original = Credentials::new("old");
        original.cookies.insert("session".into(), "s".into());
        let refreshed = original.with_access_token("new");
        assert_eq!(original.access_token, "old");
        assert_eq!(refreshed.access_token, "new");
        assert_eq!(refreshed.cookies, original.cookies);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let mut creds = Credentials::new("secret-token");
        creds.refresh_token = Some("secret-refresh".into());
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("secret-token"));
        assert!(!rendered.contains("secret-refresh"));
    }
}
