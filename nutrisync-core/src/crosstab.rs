//! Propagates app-state writes made by other tabs or processes.

use tokio::task::JoinHandle;

use crate::store::{Notification, APP_STATE_KEY};
use crate::sync::{ExternalApply, SyncOrchestrator};

/// Background task feeding external writes of the app-state key into an
/// orchestrator. Stops when dropped.
pub struct CrossTabNotifier {
    handle: JoinHandle<()>,
}

impl CrossTabNotifier {
    /// Subscribes to the orchestrator's local store and starts listening.
    pub fn spawn(orchestrator: SyncOrchestrator) -> Self {
        let mut writes = orchestrator.local().subscribe();

        let handle = tokio::spawn(async move {
            while let Some(notification) = writes.next().await {
                let raw = match notification {
                    Notification::Write { key, value } if key == APP_STATE_KEY => value,
                    Notification::Write { .. } => continue,
                    Notification::Lagged(skipped) => {
                        tracing::warn!(skipped, "missed external writes; re-reading app state");
                        orchestrator.local().load_raw_state()
                    }
                };

                if orchestrator.apply_external(raw.as_deref()) == ExternalApply::Applied {
                    tracing::debug!("external app state applied");
                }
            }
            tracing::debug!("local store closed; cross-tab notifier stopping");
        });

        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for CrossTabNotifier {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
