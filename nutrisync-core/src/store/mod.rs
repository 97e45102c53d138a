//! Local key-value store.
//!
//! The local store is the durability source of truth: a write that lands here
//! is never rolled back because of a remote failure. Reads and writes are
//! synchronous. Writes made through another handle (another tab or process)
//! are announced to subscribers as [`Notification`]s.

mod file;
mod memory;
mod state;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::broadcast;

pub use file::FileLocalStore;
pub use memory::MemoryLocalStore;
pub use state::LocalStateStore;

/// Key holding the serialized [`AppState`](crate::models::AppState).
pub const APP_STATE_KEY: &str = "nutrisync.appState";
/// Key holding the date the user last had selected.
pub const SELECTED_DATE_KEY: &str = "nutrisync.selectedDate";
/// Key set once onboarding has been shown.
pub const ONBOARDING_KEY: &str = "nutrisync.onboardingSeen";
/// Key holding a snapshot taken before risky sync operations.
pub const BACKUP_KEY: &str = "nutrisync.backup";

/// Origin used for changes detected outside this process.
pub const EXTERNAL_ORIGIN: u64 = 0;

static NEXT_ORIGIN: AtomicU64 = AtomicU64::new(1);

/// Allocates an origin id for a new store handle.
pub(crate) fn next_origin() -> u64 {
    NEXT_ORIGIN.fetch_add(1, Ordering::Relaxed)
}

/// Errors that can occur during local store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid store key: {0}")]
    InvalidKey(String),

    #[error("Failed to serialize value for {key}: {message}")]
    Serialize { key: String, message: String },

    #[error("Local store unavailable: {0}")]
    Unavailable(String),
}

/// A change broadcast by a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub origin: u64,
    pub key: String,
    /// New value; `None` when the key was removed.
    pub value: Option<String>,
}

/// What a subscriber sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Write { key: String, value: Option<String> },
    /// The subscriber fell behind and this many events were dropped.
    Lagged(u64),
}

/// Stream of writes made by other handles.
pub struct ExternalWrites {
    origin: u64,
    rx: broadcast::Receiver<StoreEvent>,
}

impl ExternalWrites {
    pub(crate) fn new(origin: u64, rx: broadcast::Receiver<StoreEvent>) -> Self {
        Self { origin, rx }
    }

    /// Waits for the next write from another origin.
    ///
    /// Returns `None` once the store stops publishing.
    pub async fn next(&mut self) -> Option<Notification> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.origin == self.origin => continue,
                Ok(event) => {
                    return Some(Notification::Write {
                        key: event.key,
                        value: event.value,
                    })
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    return Some(Notification::Lagged(skipped))
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Synchronous string key-value storage.
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Subscribes to writes made through other handles.
    fn subscribe(&self) -> ExternalWrites;
}
