//! Remote document store.
//!
//! The remote store keeps one document per user id and offers nothing but
//! whole-document get and put: no compare-and-swap, last writer wins. Every
//! call carries a bearer token obtained from a [`TokenProvider`].

mod http;
mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::AppState;

pub use http::HttpRemoteStore;
pub use memory::MemoryRemoteStore;

/// The stored form of a user's document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    /// Serialized [`AppState`].
    pub app_state: String,
    pub updated_at: DateTime<Utc>,
}

impl RemoteDocument {
    pub fn from_state(state: &AppState) -> Result<Self, serde_json::Error> {
        Ok(Self {
            app_state: state.to_json()?,
            updated_at: Utc::now(),
        })
    }
}

/// Errors obtaining a bearer token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("no active session")]
    NoSession,

    #[error("token provider failed: {0}")]
    Provider(String),
}

/// Errors talking to the remote store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote store unreachable: {0}")]
    Unreachable(String),

    #[error("Permission denied by remote store: {0}")]
    PermissionDenied(String),

    #[error("Remote store returned status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Invalid response from remote store: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Permission and configuration problems that retrying will not fix.
    pub fn is_permission(&self) -> bool {
        matches!(self, RemoteError::PermissionDenied(_))
    }
}

/// Whole-document access to the remote store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches the user's document. `Ok(None)` means none has been written
    /// yet, which is the normal first-login case.
    async fn fetch(
        &self,
        user_id: &str,
        token: &str,
    ) -> Result<Option<RemoteDocument>, RemoteError>;

    /// Replaces the user's document.
    async fn put(
        &self,
        user_id: &str,
        token: &str,
        document: &RemoteDocument,
    ) -> Result<(), RemoteError>;
}

/// Issues bearer tokens for the current session.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn bearer_token(&self) -> Result<String, AuthError>;
}

/// A provider holding a fixed token, or none when signed out.
#[derive(Debug, Clone, Default)]
pub struct StaticToken {
    token: Option<String>,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn signed_out() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn bearer_token(&self) -> Result<String, AuthError> {
        self.token.clone().ok_or(AuthError::NoSession)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_document_wire_format() {
        let doc = RemoteDocument::from_state(&AppState::default()).unwrap();
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json["appState"].is_string());
        assert!(json["updatedAt"].is_string());
    }

    #[tokio::test]
    async fn test_static_token() {
        assert_eq!(
            StaticToken::new("abc").bearer_token().await,
            Ok("abc".to_string())
        );
        assert_eq!(
            StaticToken::signed_out().bearer_token().await,
            Err(AuthError::NoSession)
        );
    }

    #[test]
    fn test_permission_errors() {
        assert!(RemoteError::PermissionDenied("403".to_string()).is_permission());
        assert!(!RemoteError::Unreachable("timeout".to_string()).is_permission());
    }
}
