//! Incremental timeline fetch.
//!
//! Walks a group timeline newest-first, one page at a time, until it reaches
//! the previously synced checkpoint or the feed runs out.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::api::error::ApiError;
use crate::api::responses::{RawMessage, TimelinePage};
use crate::auth::{CredentialProvider, Credentials};

/// Page size the web client uses.
pub const DEFAULT_PAGE_SIZE: u32 = 200;

/// Pause between page requests to stay under the API's rate limit.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub page_size: u32,
    pub page_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            page_delay: DEFAULT_PAGE_DELAY,
        }
    }
}

/// Parameters of a single timeline page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub count: u32,
    pub continuation: Option<String>,
    /// Forwarded on the first page only. The server-side effect is unverified,
    /// so nothing downstream depends on it.
    pub max_id: Option<i64>,
}

/// Anything that can serve timeline pages. Implemented by
/// [`crate::api::ApiClient`]; tests substitute an in-memory feed.
#[async_trait]
pub trait TimelineSource: Send + Sync {
    async fn timeline_page(
        &self,
        credentials: &Credentials,
        group_id: i64,
        request: &PageRequest,
    ) -> Result<TimelinePage, ApiError>;
}

/// Result of an incremental fetch.
#[derive(Debug)]
pub struct FetchOutcome {
    /// Records newer than the checkpoint, unique by id, ascending by id.
    pub messages: Vec<RawMessage>,
    /// Credentials in effect at the end of the walk. Differs from the input
    /// when a refresh happened.
    pub credentials: Credentials,
    /// Pages successfully received.
    pub pages: usize,
}

/// Fetch every record of `group_id` strictly newer than `since_id`.
///
/// A failure on the first page triggers exactly one credential refresh and a
/// retry. A failure on any later page truncates the result to what was
/// gathered so far. `on_page` receives the oldest timestamp in each page and
/// the running record count.
#[allow(clippy::too_many_arguments)]
pub async fn fetch_new_messages<F>(
    source: &dyn TimelineSource,
    provider: &dyn CredentialProvider,
    credentials: Credentials,
    group_id: i64,
    since_id: Option<i64>,
    max_id: Option<i64>,
    options: &FetchOptions,
    mut on_page: F,
) -> FetchOutcome
where
    F: FnMut(Option<&str>, usize),
{
    let mut credentials = credentials;
    let mut collected: BTreeMap<i64, RawMessage> = BTreeMap::new();
    let mut continuation: Option<String> = None;
    let mut pages = 0usize;
    let mut refreshed = false;

    loop {
        let request = PageRequest {
            count: options.page_size,
            continuation: continuation.clone(),
            max_id: if pages == 0 { max_id } else { None },
        };

        let page = match source.timeline_page(&credentials, group_id, &request).await {
            Ok(page) => page,
            Err(e) if pages == 0 && !refreshed => {
                refreshed = true;
                tracing::warn!(group_id, "First timeline page failed ({}), refreshing token", e);
                match provider.refresh(&credentials).await {
                    Ok(fresh) => {
                        credentials = fresh;
                        continue;
                    }
                    Err(refresh_err) => {
                        tracing::warn!(group_id, "Token refresh failed: {}", refresh_err);
                        break;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    group_id,
                    page = pages,
                    "Timeline request failed, keeping {} records gathered so far: {}",
                    collected.len(),
                    e
                );
                break;
            }
        };
        pages += 1;

        if page.messages.is_empty() {
            break;
        }

        let oldest = page
            .messages
            .last()
            .and_then(|m| m.get("published_at"))
            .and_then(Value::as_str)
            .map(str::to_owned);

        let mut reached_checkpoint = false;
        for value in page.messages {
            let record: RawMessage = match serde_json::from_value(value) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(group_id, "Skipping unreadable timeline record: {}", e);
                    continue;
                }
            };
            if since_id.is_some_and(|since| record.id <= since) {
                reached_checkpoint = true;
                break;
            }
            collected.insert(record.id, record);
        }

        on_page(oldest.as_deref(), collected.len());

        if reached_checkpoint {
            tracing::debug!(group_id, "Reached checkpoint {:?}", since_id);
            break;
        }

        let next = match page.continuation {
            Some(token) if !token.is_empty() => token,
            _ => break,
        };
        if request.continuation.as_deref() == Some(next.as_str()) {
            tracing::warn!(group_id, "Continuation token did not advance, stopping");
            break;
        }
        continuation = Some(next);

        tokio::time::sleep(options.page_delay).await;
    }

    tracing::debug!(group_id, pages, records = collected.len(), "Timeline fetch finished");

    FetchOutcome {
        messages: collected.into_values().collect(),
        credentials,
        pages,
    }
}
