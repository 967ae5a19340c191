//! HTTP client for the group-timeline message API.
//!
//! Every call takes the credential bundle explicitly; the client itself holds
//! no token state.

pub mod error;
pub mod responses;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;

use self::error::ApiError;
use self::responses::{Group, Member, TimelinePage, TokenResponse};
use crate::auth::error::AuthError;
use crate::auth::Credentials;
use crate::sync::fetch::{PageRequest, TimelineSource};

pub const API_BASE: &str = "https://api.message.hinatazaka46.com/v2";

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Organization whose groups are listed.
const ORGANIZATION_ID: u32 = 1;

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: String,
}

impl ApiClient {
    pub fn new(base: &str) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|source| ApiError::Network {
                url: base.to_string(),
                source,
            })?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    /// Underlying HTTP client, shared with the media downloader.
    pub fn http(&self) -> &Client {
        &self.http
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base, endpoint)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        credentials: &Credentials,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.url(endpoint);
        let response = self
            .http
            .get(&url)
            .headers(credentials.headers()?)
            .query(query)
            .send()
            .await
            .map_err(|source| ApiError::Network {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16(), &url));
        }

        let body = response.bytes().await.map_err(|source| ApiError::Network {
            url: url.clone(),
            source,
        })?;
        serde_json::from_slice(&body).map_err(|e| ApiError::Malformed {
            url,
            reason: e.to_string(),
        })
    }

    /// List subscribed groups, keeping only those whose subscription state
    /// allows syncing.
    pub async fn groups(
        &self,
        credentials: &Credentials,
        include_inactive: bool,
    ) -> Result<Vec<Group>, ApiError> {
        let groups: Vec<Group> = self
            .get_json(
                credentials,
                "/groups",
                &[("organization_id", ORGANIZATION_ID.to_string())],
            )
            .await?;
        Ok(groups
            .into_iter()
            .filter(|g| g.is_syncable(include_inactive))
            .collect())
    }

    pub async fn members(
        &self,
        credentials: &Credentials,
        group_id: i64,
    ) -> Result<Vec<Member>, ApiError> {
        let members: Option<Vec<Member>> = self
            .get_json(credentials, &format!("/groups/{}/members", group_id), &[])
            .await?;
        Ok(members.unwrap_or_default())
    }

    /// Exchange the session cookies for a fresh access token.
    pub async fn update_token(&self, credentials: &Credentials) -> Result<String, AuthError> {
        let response = self
            .http
            .post(self.url("/update_token"))
            .headers(credentials.headers()?)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::RefreshRejected(status.as_u16()));
        }

        let body: TokenResponse = response.json().await?;
        body.access_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)
    }
}

#[async_trait]
impl TimelineSource for ApiClient {
    async fn timeline_page(
        &self,
        credentials: &Credentials,
        group_id: i64,
        request: &PageRequest,
    ) -> Result<TimelinePage, ApiError> {
        let mut query = vec![
            ("count", request.count.to_string()),
            ("order", "desc".to_string()),
        ];
        if let Some(token) = &request.continuation {
            query.push(("continuation", token.clone()));
        }
        if let Some(max_id) = request.max_id {
            query.push(("max_id", max_id.to_string()));
        }
        self.get_json(
            credentials,
            &format!("/groups/{}/timeline", group_id),
            &query,
        )
        .await
    }
}
