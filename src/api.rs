use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::{
    consts::{DEFAULT_PAGE_LIMIT, ERROR_BODY_MAX_CHARS, MAX_PAGE_LIMIT, REQUEST_TIMEOUT_SECS},
    core::truncate_message,
    error::{Error, Result},
    model::{MarkReadWire, Notification, UnreadCountWire},
    settings::normalize_base_url,
};

/// Query parameters for one REST snapshot page.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotQuery {
    pub skip: usize,
    pub limit: usize,
    pub unread_only: bool,
}

impl Default for SnapshotQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_PAGE_LIMIT,
            unread_only: false,
        }
    }
}

impl SnapshotQuery {
    pub fn unread_only() -> Self {
        Self {
            unread_only: true,
            ..Self::default()
        }
    }
}

/// REST collaborator surface. Kept behind a trait so the reconciliation
/// store can be exercised against a scripted backend in tests.
#[async_trait]
pub trait NotificationBackend: Send + Sync {
    async fn fetch_page(&self, query: SnapshotQuery) -> Result<Vec<Notification>>;
    async fn fetch_unread_count(&self) -> Result<u64>;
    async fn set_read(&self, id: i64, read: bool) -> Result<Notification>;
    async fn mark_all_read(&self) -> Result<()>;
    async fn delete(&self, id: i64) -> Result<()>;
}

/// Live REST client for the server's notification API. Every call carries
/// the bearer token; HTTP 401 surfaces as [`Error::Unauthorized`] so callers
/// can force a re-login.
pub struct NotificationApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl NotificationApi {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let base_url = normalize_base_url(base_url)?;
        if token.trim().is_empty() {
            return Err(Error::MissingToken);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(Error::Network)?;

        Ok(Self {
            client,
            base_url,
            token: token.trim().to_string(),
        })
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::Unauthorized);
    }
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unable to read response body>".to_string());
        return Err(Error::Http {
            status: status.as_u16(),
            body: truncate_message(&body, ERROR_BODY_MAX_CHARS),
        });
    }
    Ok(response)
}

#[async_trait]
impl NotificationBackend for NotificationApi {
    async fn fetch_page(&self, query: SnapshotQuery) -> Result<Vec<Notification>> {
        let limit = if query.limit == 0 {
            DEFAULT_PAGE_LIMIT
        } else {
            query.limit.min(MAX_PAGE_LIMIT)
        };
        let endpoint = format!(
            "{}/notifications?skip={}&limit={}&unread_only={}",
            self.base_url, query.skip, limit, query.unread_only
        );

        let response = self
            .client
            .get(endpoint)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let page = response.json::<Vec<Notification>>().await?;
        log::debug!("fetched snapshot page: {} notifications", page.len());
        Ok(page)
    }

    async fn fetch_unread_count(&self) -> Result<u64> {
        let endpoint = format!("{}/notifications/unread-count", self.base_url);
        let response = self
            .client
            .get(endpoint)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<UnreadCountWire>().await?.count)
    }

    async fn set_read(&self, id: i64, read: bool) -> Result<Notification> {
        let endpoint = format!("{}/notifications/{id}/mark-read", self.base_url);
        let response = self
            .client
            .put(endpoint)
            .bearer_auth(&self.token)
            .json(&MarkReadWire { is_read: read })
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<Notification>().await?)
    }

    async fn mark_all_read(&self) -> Result<()> {
        let endpoint = format!("{}/notifications/mark-all-read", self.base_url);
        let response = self
            .client
            .put(endpoint)
            .bearer_auth(&self.token)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let endpoint = format!("{}/notifications/{id}", self.base_url);
        let response = self
            .client
            .delete(endpoint)
            .bearer_auth(&self.token)
            .send()
            .await?;

        // A row that is already gone server-side is a successful delete.
        if response.status() == StatusCode::NOT_FOUND {
            log::debug!("delete: notification {id} already gone server-side");
            return Ok(());
        }
        ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_blank_token() {
        assert!(matches!(
            NotificationApi::new("https://example.com", "  "),
            Err(Error::MissingToken)
        ));
    }

    #[test]
    fn new_rejects_bad_base_url() {
        assert!(matches!(
            NotificationApi::new("example.com", "tok"),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn default_query_uses_page_limit() {
        let query = SnapshotQuery::default();
        assert_eq!(query.skip, 0);
        assert_eq!(query.limit, DEFAULT_PAGE_LIMIT);
        assert!(!query.unread_only);
        assert!(SnapshotQuery::unread_only().unread_only);
    }
}
