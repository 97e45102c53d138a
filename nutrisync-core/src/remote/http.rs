//! HTTP client for the nutrisync document server.
//!
//! Documents live at `/users/{user_id}/document`: `GET` returns the stored
//! [`RemoteDocument`] or 404 when none exists, `PUT` replaces it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{RemoteDocument, RemoteError, RemoteStore};

/// Timeout applied to every request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    server_url: String,
    client: reqwest::Client,
}

impl HttpRemoteStore {
    pub fn new(server_url: impl Into<String>) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;
        Ok(Self {
            server_url: server_url.into(),
            client,
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Checks that the server answers its health endpoint.
    pub async fn health(&self) -> Result<(), RemoteError> {
        let response = self
            .client
            .get(self.build_http_url("/health"))
            .send()
            .await
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }

    fn document_url(&self, user_id: &str) -> String {
        self.build_http_url(&format!(
            "/users/{}/document",
            urlencoding::encode(user_id)
        ))
    }

    /// Builds an HTTP URL for a given path.
    fn build_http_url(&self, path: &str) -> String {
        let base_url = if !self.server_url.starts_with("http://")
            && !self.server_url.starts_with("https://")
        {
            format!("http://{}", self.server_url)
        } else {
            self.server_url.clone()
        };

        format!("{}{}", base_url.trim_end_matches('/'), path)
    }
}

/// Maps a non-success response to an error, keeping the body as the message.
async fn status_error(response: reqwest::Response) -> RemoteError {
    let status = response.status();
    let message = response.text().await.unwrap_or_default();
    let message = if message.is_empty() {
        status.to_string()
    } else {
        message
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::PermissionDenied(message),
        _ => RemoteError::Http {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn fetch(
        &self,
        user_id: &str,
        token: &str,
    ) -> Result<Option<RemoteDocument>, RemoteError> {
        let response = self
            .client
            .get(self.document_url(user_id))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(user_id, "no remote document");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let document: RemoteDocument = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(Some(document))
    }

    async fn put(
        &self,
        user_id: &str,
        token: &str,
        document: &RemoteDocument,
    ) -> Result<(), RemoteError> {
        let response = self
            .client
            .put(self.document_url(user_id))
            .header("Authorization", format!("Bearer {}", token))
            .json(document)
            .send()
            .await
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        tracing::debug!(user_id, bytes = document.app_state.len(), "remote document stored");
        Ok(())
    }
}
