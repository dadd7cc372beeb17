// Copyright (c) Sabq Platform Team
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::models::InteractionType;
use crate::tracking::ArticleFlags;

/// Caller identity attached to every request.
#[derive(Debug, Clone)]
pub enum Identity {
    /// Gateway-issued bearer token.
    Bearer(String),
    /// Pre-resolved user id, for trusted internal callers.
    UserId(String),
}

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned status {status}: {message}")]
    Status { status: u16, message: String },
}

impl TransportError {
    /// Connection-level failures and 5xx responses are worth retrying;
    /// every other status is terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network(_) => true,
            TransportError::Status { status, .. } => *status >= 500,
        }
    }
}

/// Wire shape of the toggle endpoint response. Exactly one of the flag
/// fields is populated, matching the toggled kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl ToggleResponse {
    /// The authoritative flag value, whichever field the server populated.
    pub fn flag(&self) -> Option<bool> {
        self.liked.or(self.saved).or(self.shared)
    }
}

/// Network boundary of the interaction store.
#[async_trait]
pub trait InteractionTransport: Send + Sync {
    async fn toggle(
        &self,
        article_id: &str,
        kind: InteractionType,
    ) -> Result<ToggleResponse, TransportError>;

    async fn fetch_flags(
        &self,
        article_ids: &[String],
    ) -> Result<HashMap<String, ArticleFlags>, TransportError>;
}

/// reqwest-backed transport speaking to the interaction service.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    identity: Identity,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, identity: Identity) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            identity,
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.identity {
            Identity::Bearer(token) => request.bearer_auth(token),
            Identity::UserId(user_id) => request.header("X-User-Id", user_id),
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl InteractionTransport for HttpTransport {
    async fn toggle(
        &self,
        article_id: &str,
        kind: InteractionType,
    ) -> Result<ToggleResponse, TransportError> {
        let body = serde_json::json!({
            "articleId": article_id,
            "type": kind,
            "action": "toggle",
        });
        let request = self
            .authorize(self.client.post(format!("{}/api/interactions/toggle", self.base_url)))
            .json(&body);
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let response = Self::check_status(response).await?;
        response
            .json::<ToggleResponse>()
            .await
            .map_err(|e| TransportError::Network(format!("invalid toggle response: {}", e)))
    }

    async fn fetch_flags(
        &self,
        article_ids: &[String],
    ) -> Result<HashMap<String, ArticleFlags>, TransportError> {
        let request = self
            .authorize(
                self.client
                    .get(format!("{}/api/interactions/user-flags", self.base_url)),
            )
            .query(&[("articleIds", article_ids.join(","))]);
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let response = Self::check_status(response).await?;
        response
            .json::<HashMap<String, ArticleFlags>>()
            .await
            .map_err(|e| TransportError::Network(format!("invalid flags response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable_client_errors_are_not() {
        let server = TransportError::Status {
            status: 503,
            message: String::new(),
        };
        let client = TransportError::Status {
            status: 401,
            message: String::new(),
        };
        let network = TransportError::Network("connection refused".into());
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert!(network.is_retryable());
    }

    #[test]
    fn toggle_response_exposes_whichever_flag_came_back() {
        let response = ToggleResponse {
            success: true,
            saved: Some(true),
            ..Default::default()
        };
        assert_eq!(response.flag(), Some(true));
        assert_eq!(ToggleResponse::default().flag(), None);
    }
}
