//! Wiring from configuration to a running orchestrator.

use std::sync::Arc;
use std::time::Duration;

use nutrisync_core::{
    FileLocalStore, HttpRemoteStore, LocalStateStore, RemoteError, StaticToken, SyncOrchestrator,
    SyncSettings,
};

use crate::config::Config;

/// An orchestrator over the configured data directory and server.
///
/// Without an API key the orchestrator still works locally; every remote
/// operation fails fast with a not-signed-in error.
pub struct Session {
    pub orchestrator: SyncOrchestrator,
    pub remote: Arc<HttpRemoteStore>,
}

impl Session {
    pub fn open(config: &Config) -> Result<Self, RemoteError> {
        let store = FileLocalStore::new(config.data_dir.value.clone());
        let local = LocalStateStore::new(Arc::new(store));

        let remote = Arc::new(HttpRemoteStore::new(config.server_url.value.clone())?);
        let auth = match &config.api_key {
            Some(key) => StaticToken::new(key.value.clone()),
            None => StaticToken::signed_out(),
        };

        let settings = SyncSettings::new(config.user_id.value.clone())
            .with_autosave_delay(Duration::from_millis(config.autosave_ms.value));

        tracing::debug!(
            data_dir = %config.data_dir.value.display(),
            server = %config.server_url.value,
            "opening session"
        );

        let orchestrator = SyncOrchestrator::new(settings, local, remote.clone(), Arc::new(auth));
        Ok(Self {
            orchestrator,
            remote,
        })
    }
}

/// Creates the runtime commands block on.
pub fn runtime() -> Result<tokio::runtime::Runtime, std::io::Error> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}
