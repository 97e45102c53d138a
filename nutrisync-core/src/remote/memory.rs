//! In-process remote store.
//!
//! Behaves like the HTTP server, one document per user and last writer wins,
//! with switches to simulate being offline, denied, or slow.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{RemoteDocument, RemoteError, RemoteStore};
use crate::models::AppState;
use crate::sanitize;

#[derive(Default)]
pub struct MemoryRemoteStore {
    documents: Mutex<HashMap<String, RemoteDocument>>,
    expected_token: Option<String>,
    offline: AtomicBool,
    denied: AtomicBool,
    latency: Mutex<Option<Duration>>,
    fetch_count: AtomicUsize,
    put_count: AtomicUsize,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects requests whose bearer token differs from `token`.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.expected_token = Some(token.into());
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_denied(&self, denied: bool) {
        self.denied.store(denied, Ordering::SeqCst);
    }

    /// Delays every request by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Stores `state` for `user_id` directly.
    pub fn insert(&self, user_id: &str, state: &AppState) -> Result<(), serde_json::Error> {
        let document = RemoteDocument::from_state(state)?;
        self.insert_document(user_id, document);
        Ok(())
    }

    /// Stores a raw document for `user_id` directly.
    pub fn insert_document(&self, user_id: &str, document: RemoteDocument) {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.to_string(), document);
    }

    pub fn document(&self, user_id: &str) -> Option<RemoteDocument> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
    }

    /// The sanitized state stored for `user_id`.
    pub fn state(&self, user_id: &str) -> Option<AppState> {
        self.document(user_id)
            .and_then(|doc| sanitize::sanitize_str(&doc.app_state))
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.put_count.load(Ordering::SeqCst)
    }

    async fn check(&self, token: &str) -> Result<(), RemoteError> {
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable("remote store offline".to_string()));
        }
        if self.denied.load(Ordering::SeqCst) {
            return Err(RemoteError::PermissionDenied("access revoked".to_string()));
        }
        if let Some(expected) = &self.expected_token {
            if expected != token {
                return Err(RemoteError::PermissionDenied("invalid token".to_string()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch(
        &self,
        user_id: &str,
        token: &str,
    ) -> Result<Option<RemoteDocument>, RemoteError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.check(token).await?;
        Ok(self.document(user_id))
    }

    async fn put(
        &self,
        user_id: &str,
        token: &str,
        document: &RemoteDocument,
    ) -> Result<(), RemoteError> {
        self.put_count.fetch_add(1, Ordering::SeqCst);
        self.check(token).await?;
        self.insert_document(user_id, document.clone());
        Ok(())
    }
}
