//! Typed access to the well-known local keys.

use std::sync::Arc;

use chrono::NaiveDate;

use super::{
    ExternalWrites, LocalStore, StoreError, APP_STATE_KEY, BACKUP_KEY, ONBOARDING_KEY,
    SELECTED_DATE_KEY,
};
use crate::models::AppState;
use crate::sanitize;

/// Reads and writes the app document and its auxiliary keys.
///
/// Anything read back goes through the sanitizer; a value that cannot be
/// read or parsed counts as absent.
#[derive(Clone)]
pub struct LocalStateStore {
    store: Arc<dyn LocalStore>,
}

impl LocalStateStore {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "local store read failed");
                None
            }
        }
    }

    fn write_state(&self, key: &str, state: &AppState) -> Result<(), StoreError> {
        let json = state.to_json().map_err(|e| StoreError::Serialize {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.store.set(key, &json)
    }

    /// The serialized app document as stored, unsanitized.
    pub fn load_raw_state(&self) -> Option<String> {
        self.read(APP_STATE_KEY)
    }

    pub fn load_state(&self) -> Option<AppState> {
        self.load_raw_state()
            .and_then(|raw| sanitize::sanitize_str(&raw))
    }

    pub fn save_state(&self, state: &AppState) -> Result<(), StoreError> {
        self.write_state(APP_STATE_KEY, state)
    }

    pub fn load_backup(&self) -> Option<AppState> {
        self.read(BACKUP_KEY).and_then(|raw| sanitize::sanitize_str(&raw))
    }

    pub fn save_backup(&self, state: &AppState) -> Result<(), StoreError> {
        self.write_state(BACKUP_KEY, state)
    }

    pub fn selected_date(&self) -> Option<NaiveDate> {
        self.read(SELECTED_DATE_KEY)
            .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok())
    }

    pub fn set_selected_date(&self, date: NaiveDate) -> Result<(), StoreError> {
        self.store
            .set(SELECTED_DATE_KEY, &date.format("%Y-%m-%d").to_string())
    }

    pub fn onboarding_seen(&self) -> bool {
        self.read(ONBOARDING_KEY).as_deref() == Some("true")
    }

    pub fn mark_onboarding_seen(&self) -> Result<(), StoreError> {
        self.store.set(ONBOARDING_KEY, "true")
    }

    pub fn subscribe(&self) -> ExternalWrites {
        self.store.subscribe()
    }
}
