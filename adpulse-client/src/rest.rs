//! HTTP data source for the portal REST API.
//!
//! `NotificationSource` is the seam the rest of the crate depends on; the
//! reqwest-backed [`RestClient`] is the production implementation. Endpoint
//! paths are scoped by portal side (`/api/v1/admin/...` vs
//! `/api/v1/client/...`), matching the token the request carries.

use crate::auth::TokenProvider;
use crate::error::ClientError;
use adpulse_core::{Notification, NotificationId, UserType};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Abstract portal data source.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    async fn list_notifications(
        &self,
        user_type: UserType,
    ) -> Result<Vec<Notification>, ClientError>;

    async fn unread_count(&self, user_type: UserType) -> Result<u64, ClientError>;

    async fn mark_read(
        &self,
        user_type: UserType,
        id: &NotificationId,
    ) -> Result<(), ClientError>;

    async fn mark_all_read(&self, user_type: UserType) -> Result<(), ClientError>;
}

#[derive(Debug, Deserialize)]
struct UnreadCountResponse {
    count: u64,
}

/// Error body the portal API returns alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[allow(dead_code)]
    code: Option<String>,
    message: String,
}

/// Production data source over the portal REST API.
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
    timeout_ms: u64,
}

impl RestClient {
    /// Build a client with a fixed per-request timeout. The timeout is
    /// independent of retry backoff; a timed-out request counts as a
    /// retryable failure upstream.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ClientError::Transport {
                message: err.to_string(),
            })?;
        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    fn url(&self, user_type: UserType, path: &str) -> String {
        format!("{}/api/v1/{}{}", self.base_url, user_type, path)
    }

    fn bearer(&self, user_type: UserType) -> Result<String, ClientError> {
        self.tokens
            .token(user_type)
            .ok_or(ClientError::MissingToken { user_type })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        user_type: UserType,
        path: &str,
    ) -> Result<T, ClientError> {
        let token = self.bearer(user_type)?;
        let response = self
            .client
            .get(self.url(user_type, path))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| ClientError::from_reqwest(err, self.timeout_ms))?;
        self.parse_response(response).await
    }

    async fn put_ack(&self, user_type: UserType, path: &str) -> Result<(), ClientError> {
        let token = self.bearer(user_type)?;
        let response = self
            .client
            .put(self.url(user_type, path))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| ClientError::from_reqwest(err, self.timeout_ms))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(self.status_error(status.as_u16(), response).await)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|err| ClientError::from_reqwest(err, self.timeout_ms));
        }
        Err(self.status_error(status.as_u16(), response).await)
    }

    async fn status_error(&self, status: u16, response: reqwest::Response) -> ClientError {
        let text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorBody>(&text) {
            Ok(body) => body.message,
            Err(_) => text,
        };
        ClientError::Status { status, message }
    }
}

#[async_trait]
impl NotificationSource for RestClient {
    async fn list_notifications(
        &self,
        user_type: UserType,
    ) -> Result<Vec<Notification>, ClientError> {
        self.get_json(user_type, "/notifications").await
    }

    async fn unread_count(&self, user_type: UserType) -> Result<u64, ClientError> {
        let response: UnreadCountResponse = self
            .get_json(user_type, "/notifications/unread-count")
            .await?;
        Ok(response.count)
    }

    async fn mark_read(
        &self,
        user_type: UserType,
        id: &NotificationId,
    ) -> Result<(), ClientError> {
        let path = format!("/notifications/{}/read", id);
        self.put_ack(user_type, &path).await
    }

    async fn mark_all_read(&self, user_type: UserType) -> Result<(), ClientError> {
        self.put_ack(user_type, "/notifications/read-all").await
    }
}
