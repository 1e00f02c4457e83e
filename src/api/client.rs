//! REST client for the notification resource.
//!
//! Translates store intents into calls against the versioned notification
//! endpoints and unwraps the uniform response envelope. Every call attaches
//! a freshly validated bearer credential plus the tenant-scope header, and
//! races a cancellation token scoped to the consumer's lifetime so teardown
//! never leaves requests dangling.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::auth::CredentialProvider;
use crate::errors::ClientError;
use crate::models::{ApiEnvelope, Notification, Pagination};

// ── Query types ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Parameters for the paginated list endpoint.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub page: u32,
    pub size: u32,
    pub sort_by: String,
    pub sort_direction: SortDirection,
    /// Read-state filter; `None` lists both read and unread.
    pub is_read: Option<bool>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 0,
            size: 10,
            sort_by: "createdAt".into(),
            sort_direction: SortDirection::Desc,
            is_read: None,
        }
    }
}

// ── Client ────────────────────────────────────────────────────

pub struct NotificationApi {
    http: Client,
    base_url: String,
    tenant_id: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl NotificationApi {
    pub fn new(
        base_url: impl Into<String>,
        tenant_id: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tenant_id: tenant_id.into(),
            credentials,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the bearer credential and tenant header, send, and map 401 to
    /// `AuthExpired`. The request is abandoned as soon as `cancel` fires.
    async fn send(
        &self,
        req: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, ClientError> {
        let creds = self.credentials.fresh_token().await?;
        let req = req
            .header("Authorization", format!("Bearer {}", creds.bearer))
            .header("X-Tenant-Id", &self.tenant_id);

        let resp = tokio::select! {
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            resp = req.send() => resp?,
        };

        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::AuthExpired);
        }
        Ok(resp)
    }

    /// Unwrap the `{success, message, data, ...}` envelope, surfacing
    /// non-2xx statuses and `success: false` as API errors.
    async fn unwrap_envelope<T: DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<ApiEnvelope<T>, ClientError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api(format!(
                "notification service returned {}: {}",
                status,
                truncate_body(&body, 200)
            )));
        }

        let envelope: ApiEnvelope<T> = resp.json().await?;
        if !envelope.success {
            return Err(ClientError::Api(
                envelope
                    .message
                    .unwrap_or_else(|| "notification service reported failure".into()),
            ));
        }
        Ok(envelope)
    }

    // ── Operations ────────────────────────────────────────────

    /// `GET /notifications`: paginated list.
    pub async fn list(
        &self,
        query: &ListQuery,
        cancel: &CancellationToken,
    ) -> Result<(Vec<Notification>, Option<Pagination>), ClientError> {
        let mut req = self.http.get(self.url("/notifications")).query(&[
            ("page", query.page.to_string()),
            ("size", query.size.to_string()),
            ("sortBy", query.sort_by.clone()),
            ("sortDirection", query.sort_direction.as_str().to_string()),
        ]);
        if let Some(is_read) = query.is_read {
            req = req.query(&[("isRead", is_read.to_string())]);
        }

        let resp = self.send(req, cancel).await?;
        let envelope = Self::unwrap_envelope::<Vec<Notification>>(resp).await?;
        debug!(
            count = envelope.data.as_ref().map(Vec::len).unwrap_or(0),
            page = query.page,
            "fetched notification page"
        );
        Ok((envelope.data.unwrap_or_default(), envelope.pagination))
    }

    /// `GET /notifications/recent`: the newest `limit` entries.
    pub async fn recent(
        &self,
        limit: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<Notification>, ClientError> {
        let req = self
            .http
            .get(self.url("/notifications/recent"))
            .query(&[("limit", limit.to_string())]);
        let resp = self.send(req, cancel).await?;
        let envelope = Self::unwrap_envelope::<Vec<Notification>>(resp).await?;
        Ok(envelope.data.unwrap_or_default())
    }

    /// `GET /notifications/unread-count`: server-computed unread count.
    pub async fn unread_count(&self, cancel: &CancellationToken) -> Result<u64, ClientError> {
        let req = self.http.get(self.url("/notifications/unread-count"));
        let resp = self.send(req, cancel).await?;
        let envelope = Self::unwrap_envelope::<u64>(resp).await?;
        envelope
            .data
            .ok_or_else(|| ClientError::Api("unread-count response carried no data".into()))
    }

    /// `GET /notifications/{id}`: a single record.
    pub async fn get(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Notification, ClientError> {
        let req = self.http.get(self.url(&format!("/notifications/{}", id)));
        let resp = self.send(req, cancel).await?;
        let envelope = Self::unwrap_envelope::<Notification>(resp).await?;
        envelope
            .data
            .ok_or_else(|| ClientError::Api("notification response carried no data".into()))
    }

    /// `PUT /notifications/{id}/read`: returns the updated record.
    pub async fn mark_read(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Notification, ClientError> {
        let req = self
            .http
            .put(self.url(&format!("/notifications/{}/read", id)));
        let resp = self.send(req, cancel).await?;
        let envelope = Self::unwrap_envelope::<Notification>(resp).await?;
        envelope
            .data
            .ok_or_else(|| ClientError::Api("mark-read response carried no data".into()))
    }

    /// `PUT /notifications/mark-all-read`.
    pub async fn mark_all_read(&self, cancel: &CancellationToken) -> Result<(), ClientError> {
        let req = self.http.put(self.url("/notifications/mark-all-read"));
        let resp = self.send(req, cancel).await?;
        Self::unwrap_envelope::<serde_json::Value>(resp).await?;
        Ok(())
    }

    /// `DELETE /notifications/{id}`.
    pub async fn delete(&self, id: Uuid, cancel: &CancellationToken) -> Result<(), ClientError> {
        let req = self.http.delete(self.url(&format!("/notifications/{}", id)));
        let resp = self.send(req, cancel).await?;
        Self::unwrap_envelope::<serde_json::Value>(resp).await?;
        Ok(())
    }
}

/// Cap an error body for display, backing up to a char boundary so
/// multi-byte text never splits.
fn truncate_body(body: &str, max_bytes: usize) -> &str {
    if body.len() <= max_bytes {
        return body;
    }
    let mut end = max_bytes;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

// ── Tests ─────────────────────────────────────────────────────
