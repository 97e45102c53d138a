//! Sync error types.

use super::status::Phase;
use crate::remote::{AuthError, RemoteError};
use crate::store::StoreError;

/// Errors that can occur during orchestrated sync operations.
#[derive(Debug)]
pub enum SyncError {
    /// Another exclusive operation is running
    Busy(Phase),
    /// Restore was requested but no backup exists
    NoBackup,
    /// No bearer token could be obtained
    Auth(AuthError),
    /// The remote store failed
    Remote(RemoteError),
    /// The local store failed
    Local(StoreError),
    /// The app document could not be serialized
    Encode(String),
}

impl SyncError {
    /// Whether retrying later might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Busy(_) => true,
            SyncError::Remote(e) => !e.is_permission(),
            _ => false,
        }
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Busy(phase) => write!(f, "Sync busy: {} in progress", phase),
            SyncError::NoBackup => write!(f, "No local backup to restore"),
            SyncError::Auth(e) => write!(f, "Not signed in: {}", e),
            SyncError::Remote(e) => write!(f, "{}", e),
            SyncError::Local(e) => write!(f, "{}", e),
            SyncError::Encode(e) => write!(f, "Failed to encode document: {}", e),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Auth(e) => Some(e),
            SyncError::Remote(e) => Some(e),
            SyncError::Local(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AuthError> for SyncError {
    fn from(e: AuthError) -> Self {
        SyncError::Auth(e)
    }
}

impl From<RemoteError> for SyncError {
    fn from(e: RemoteError) -> Self {
        SyncError::Remote(e)
    }
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        SyncError::Local(e)
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Encode(e.to_string())
    }
}
