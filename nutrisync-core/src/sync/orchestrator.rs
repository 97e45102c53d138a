use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use super::debounce::Debouncer;
use super::error::SyncError;
use super::status::{ExternalApply, InitialLoad, Phase, SyncStatus, SyncSummary};
use crate::merge::merge_cloud_first;
use crate::models::AppState;
use crate::remote::{RemoteDocument, RemoteStore, TokenProvider};
use crate::sanitize::{self, migrations, Sanitized};
use crate::store::{LocalStateStore, StoreError};

/// Delay between the last state change and the autosave push.
pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub user_id: String,
    pub autosave_delay: Duration,
}

impl SyncSettings {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            autosave_delay: DEFAULT_AUTOSAVE_DELAY,
        }
    }

    pub fn with_autosave_delay(mut self, delay: Duration) -> Self {
        self.autosave_delay = delay;
        self
    }
}

struct Core {
    state: AppState,
    phase: Phase,
    /// Set once a migrated remote document has been written back.
    legacy_written_back: bool,
    /// A change arrived while the initial load held the state and has not
    /// been replaced by an adopted remote document.
    edited_while_loading: bool,
}

struct Shared {
    settings: SyncSettings,
    local: LocalStateStore,
    remote: Arc<dyn RemoteStore>,
    auth: Arc<dyn TokenProvider>,
    core: Mutex<Core>,
    status: watch::Sender<SyncStatus>,
    autosave: Debouncer,
}

/// Resets the phase to idle when an exclusive operation ends.
///
/// Changes kept back during the initial load are scheduled for autosave here.
struct PhaseGuard<'a> {
    shared: &'a Arc<Shared>,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        let edited = {
            let mut core = self.shared.core();
            core.phase = Phase::Idle;
            std::mem::take(&mut core.edited_while_loading)
        };
        if edited {
            tracing::debug!("scheduling autosave for changes made during initial load");
            self.shared.schedule_autosave();
        }
    }
}

/// Keeps the in-memory app state, the local store, and the remote store in
/// step.
///
/// Cloning yields another handle on the same orchestrator. Methods that
/// schedule work must be called from within a tokio runtime.
#[derive(Clone)]
pub struct SyncOrchestrator {
    shared: Arc<Shared>,
}

impl SyncOrchestrator {
    /// Creates an orchestrator starting from whatever the local store holds.
    pub fn new(
        settings: SyncSettings,
        local: LocalStateStore,
        remote: Arc<dyn RemoteStore>,
        auth: Arc<dyn TokenProvider>,
    ) -> Self {
        let state = local.load_state().unwrap_or_default();
        let (status, _) = watch::channel(SyncStatus::Idle);
        let autosave = Debouncer::new(settings.autosave_delay);

        Self {
            shared: Arc::new(Shared {
                settings,
                local,
                remote,
                auth,
                core: Mutex::new(Core {
                    state,
                    phase: Phase::Idle,
                    legacy_written_back: false,
                    edited_while_loading: false,
                }),
                status,
                autosave,
            }),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.shared.settings
    }

    pub fn local(&self) -> &LocalStateStore {
        &self.shared.local
    }

    /// A copy of the current in-memory state.
    pub fn state(&self) -> AppState {
        self.shared.core().state.clone()
    }

    pub fn phase(&self) -> Phase {
        self.shared.core().phase
    }

    pub fn status(&self) -> SyncStatus {
        self.shared.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.shared.status.subscribe()
    }

    /// Whether an autosave is waiting for its delay to elapse.
    pub fn autosave_pending(&self) -> bool {
        self.shared.autosave.is_pending()
    }

    /// Replaces the app state.
    ///
    /// The new state is kept in memory and written to the local store right
    /// away, then an autosave is (re)scheduled. A failed local write is
    /// returned but the in-memory state keeps the change. Changes made while
    /// the initial load is running are scheduled once it ends, unless a
    /// remote document was adopted over them.
    pub fn update_app_state(&self, state: AppState) -> Result<(), StoreError> {
        self.shared.store_state(state, true)
    }

    /// Applies `f` to a copy of the current state and stores the result.
    pub fn mutate<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut AppState),
    {
        let mut state = self.state();
        f(&mut state);
        self.update_app_state(state)
    }

    /// Stores `state` and pushes it to the remote store immediately.
    ///
    /// Any pending autosave is dropped, so the state is pushed once. The push
    /// outcome is reported through [`status`](Self::status) only; a failed
    /// push never undoes the local write.
    pub async fn save_now(&self, state: AppState) -> Result<(), StoreError> {
        let local = self.shared.store_state(state.clone(), false);
        self.shared.autosave.cancel();

        self.shared.set_status(SyncStatus::Saving);
        let pushed = self.shared.push_state(&state).await;
        self.shared.report_push(pushed);

        if let Err(e) = &local {
            self.shared.set_status(SyncStatus::Error {
                message: e.to_string(),
            });
        }
        local
    }

    /// Runs a pending autosave now instead of waiting for the delay.
    ///
    /// Returns false when nothing was pending.
    pub async fn flush_autosave(&self) -> bool {
        if !self.shared.autosave.cancel() {
            return false;
        }
        Arc::clone(&self.shared).autosave().await;
        true
    }

    /// Fetches the remote document and adopts it as-is.
    ///
    /// No merge happens here: the remote copy replaces local state. When the
    /// remote document needed migrating it is written back once per
    /// orchestrator.
    pub async fn initial_load(&self) -> Result<InitialLoad, SyncError> {
        let _guard = self.shared.enter(Phase::LoadingInitial)?;
        let result = self.shared.load_initial().await;
        if let Err(e) = &result {
            self.shared.report_failure("initial load", e);
        }
        result
    }

    /// Merges the remote document into local state and pushes the result.
    ///
    /// Nothing is written if the remote document cannot be fetched.
    pub async fn force_sync(&self) -> Result<SyncSummary, SyncError> {
        let _guard = self.shared.enter(Phase::ForceSyncing)?;
        let result = self.shared.reconcile(None).await;
        if let Err(e) = &result {
            self.shared.report_failure("force sync", e);
        }
        result
    }

    /// Merges the remote document with the local backup snapshot and
    /// adopts the result.
    pub async fn restore_backup(&self) -> Result<SyncSummary, SyncError> {
        let _guard = self.shared.enter(Phase::Restoring)?;
        let result = match self.shared.local.load_backup() {
            Some(backup) => self.shared.reconcile(Some(backup)).await,
            None => Err(SyncError::NoBackup),
        };
        if let Err(e) = &result {
            self.shared.report_failure("restore", e);
        }
        result
    }

    /// Writes the current state to the backup key.
    pub fn snapshot_backup(&self) -> Result<(), StoreError> {
        let state = self.state();
        self.shared.local.save_backup(&state)?;
        tracing::info!(days = state.log.len(), "backup snapshot written");
        Ok(())
    }

    /// Folds a value written to the app-state key by another tab or process
    /// into memory.
    ///
    /// The local store already holds the value, so only the remote store is
    /// updated, in the background.
    pub fn apply_external(&self, raw: Option<&str>) -> ExternalApply {
        let Some(state) = raw.and_then(sanitize::sanitize_str) else {
            tracing::debug!("ignoring unusable external app state");
            return ExternalApply::Ignored;
        };

        {
            let mut core = self.shared.core();
            if core.state == state {
                return ExternalApply::Unchanged;
            }
            core.state = state.clone();
        }
        tracing::info!(days = state.log.len(), "applied app state from another tab");

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            shared.set_status(SyncStatus::Saving);
            let pushed = shared.push_state(&state).await;
            shared.report_push(pushed);
        });
        ExternalApply::Applied
    }
}

impl Shared {
    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: SyncStatus) {
        self.status.send_replace(status);
    }

    /// Keeps `state` in memory and writes it locally, scheduling an autosave
    /// when `autosave` is set.
    fn store_state(self: &Arc<Self>, state: AppState, autosave: bool) -> Result<(), StoreError> {
        let loading = {
            let mut core = self.core();
            core.state = state.clone();
            let loading = core.phase == Phase::LoadingInitial;
            if loading && autosave {
                core.edited_while_loading = true;
            }
            loading
        };

        let result = self.local.save_state(&state);
        if let Err(e) = &result {
            tracing::error!(error = %e, "failed to write app state locally");
            self.set_status(SyncStatus::Error {
                message: e.to_string(),
            });
        }

        if autosave && !loading {
            self.schedule_autosave();
        }
        result
    }

    fn enter(self: &Arc<Self>, phase: Phase) -> Result<PhaseGuard<'_>, SyncError> {
        let mut core = self.core();
        if core.phase.is_exclusive() {
            tracing::info!(requested = %phase, running = %core.phase, "sync busy");
            return Err(SyncError::Busy(core.phase));
        }
        core.phase = phase;
        Ok(PhaseGuard { shared: self })
    }

    fn schedule_autosave(self: &Arc<Self>) {
        let shared = Arc::downgrade(self);
        self.autosave.schedule(move || async move {
            if let Some(shared) = shared.upgrade() {
                shared.autosave().await;
            }
        });
    }

    /// Pushes the current state. Deferred while an exclusive operation owns
    /// the state.
    async fn autosave(self: Arc<Self>) {
        let state = {
            let mut core = self.core();
            if core.phase.is_exclusive() {
                None
            } else {
                core.phase = Phase::SavingDebounced;
                Some(core.state.clone())
            }
        };
        let Some(state) = state else {
            tracing::debug!("autosave deferred");
            self.schedule_autosave();
            return;
        };

        self.set_status(SyncStatus::Saving);
        let pushed = self.push_state(&state).await;
        {
            let mut core = self.core();
            if core.phase == Phase::SavingDebounced {
                core.phase = Phase::Idle;
            }
        }
        self.report_push(pushed);
    }

    async fn push_state(&self, state: &AppState) -> Result<(), SyncError> {
        let token = self.auth.bearer_token().await?;
        self.push_with_token(&token, state).await
    }

    async fn push_with_token(&self, token: &str, state: &AppState) -> Result<(), SyncError> {
        let document = RemoteDocument::from_state(state)?;
        self.remote
            .put(&self.settings.user_id, token, &document)
            .await?;
        tracing::debug!(user_id = %self.settings.user_id, "pushed app state");
        Ok(())
    }

    /// Updates status from a push outcome. Returns whether it succeeded.
    fn report_push(&self, result: Result<(), SyncError>) -> bool {
        match result {
            Ok(()) => {
                self.set_status(SyncStatus::Saved { at: Utc::now() });
                true
            }
            Err(e) => {
                self.report_failure("push", &e);
                false
            }
        }
    }

    fn report_failure(&self, operation: &str, error: &SyncError) {
        if matches!(error, SyncError::Busy(_)) {
            return;
        }
        tracing::warn!(operation, error = %error, "sync operation failed");
        self.set_status(SyncStatus::Error {
            message: error.to_string(),
        });
    }

    /// Fetches and sanitizes the remote document. An unusable document is
    /// treated as absent.
    async fn fetch_remote(&self, token: &str) -> Result<Option<Sanitized>, SyncError> {
        let Some(document) = self.remote.fetch(&self.settings.user_id, token).await? else {
            return Ok(None);
        };

        let sanitized = sanitize::parse_and_sanitize(&document.app_state);
        if sanitized.is_none() {
            tracing::warn!(
                user_id = %self.settings.user_id,
                "remote document is unusable; treating as absent"
            );
        }
        Ok(sanitized)
    }

    async fn load_initial(&self) -> Result<InitialLoad, SyncError> {
        let token = self.auth.bearer_token().await?;
        let Some(Sanitized { state, report }) = self.fetch_remote(&token).await? else {
            tracing::info!("no remote document; keeping local state");
            return Ok(InitialLoad::NoRemoteDocument);
        };

        tracing::info!(
            days = state.log.len(),
            from_version = report.from_version,
            "adopting remote document without merging"
        );
        self.autosave.cancel();

        let write_back = {
            let mut core = self.core();
            core.state = state.clone();
            core.edited_while_loading = false;
            // Only a document that predates fasting sessions is written back.
            let write_back =
                report.changed(migrations::ADD_FASTING_SESSIONS) && !core.legacy_written_back;
            if write_back {
                core.legacy_written_back = true;
            }
            write_back
        };
        self.local.save_state(&state)?;

        if !write_back {
            return Ok(InitialLoad::Adopted { migrated: false });
        }

        match self.push_with_token(&token, &state).await {
            Ok(()) => {
                tracing::info!(
                    applied = ?report.applied,
                    "wrote migrated document back to remote store"
                );
                Ok(InitialLoad::Adopted { migrated: true })
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to write migrated document back");
                Ok(InitialLoad::Adopted { migrated: false })
            }
        }
    }

    /// Merges the remote document with `base`, or with the current state when
    /// `base` is `None`, then stores and pushes the result.
    async fn reconcile(&self, base: Option<AppState>) -> Result<SyncSummary, SyncError> {
        let token = self.auth.bearer_token().await?;
        let remote = self.fetch_remote(&token).await?.map(|sanitized| sanitized.state);

        self.autosave.cancel();
        let merged = {
            let mut core = self.core();
            let merged = merge_cloud_first(remote.as_ref(), base.as_ref().unwrap_or(&core.state));
            core.state = merged.clone();
            merged
        };
        self.local.save_state(&merged)?;

        self.set_status(SyncStatus::Saving);
        let pushed = self.report_push(self.push_with_token(&token, &merged).await);

        let summary = SyncSummary {
            had_remote: remote.is_some(),
            days: merged.log.len(),
            entries: merged.entry_count(),
            pushed,
        };
        tracing::info!(
            had_remote = summary.had_remote,
            days = summary.days,
            entries = summary.entries,
            pushed,
            "reconciled with remote store"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryRemoteStore, StaticToken};
    use crate::store::MemoryLocalStore;

    const USER: &str = "ana";

    async fn wait_for_puts(remote: &MemoryRemoteStore, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while remote.put_count() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("remote push did not happen");
    }

    fn orchestrator(remote: &Arc<MemoryRemoteStore>) -> SyncOrchestrator {
        let local = LocalStateStore::new(Arc::new(MemoryLocalStore::new()));
        SyncOrchestrator::new(
            SyncSettings::new(USER),
            local,
            remote.clone(),
            Arc::new(StaticToken::new("token")),
        )
    }

    #[tokio::test]
    async fn test_starts_from_local_state() {
        let memory = Arc::new(MemoryLocalStore::new());
        let local = LocalStateStore::new(memory.clone());
        let mut stored = AppState::default();
        stored.profile.name = "Ana".to_string();
        local.save_state(&stored).unwrap();

        let orchestrator = SyncOrchestrator::new(
            SyncSettings::new(USER),
            local,
            Arc::new(MemoryRemoteStore::new()),
            Arc::new(StaticToken::new("token")),
        );
        assert_eq!(orchestrator.state(), stored);
    }

    #[tokio::test]
    async fn test_exclusive_phase_rejects_second_operation() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let orchestrator = orchestrator(&remote);

        let guard = orchestrator.shared.enter(Phase::ForceSyncing).unwrap();
        assert!(matches!(
            orchestrator.restore_backup().await,
            Err(SyncError::Busy(Phase::ForceSyncing))
        ));
        assert!(matches!(
            orchestrator.force_sync().await,
            Err(SyncError::Busy(Phase::ForceSyncing))
        ));
        assert_eq!(remote.fetch_count(), 0);

        drop(guard);
        assert_eq!(orchestrator.phase(), Phase::Idle);
        assert!(orchestrator.force_sync().await.is_ok());
    }

    #[tokio::test]
    async fn test_busy_does_not_touch_status() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let orchestrator = orchestrator(&remote);

        let _guard = orchestrator.shared.enter(Phase::Restoring).unwrap();
        let _ = orchestrator.force_sync().await;
        assert_eq!(orchestrator.status(), SyncStatus::Idle);
    }

    #[tokio::test]
    async fn test_mutation_during_initial_load_autosaves_after_it() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let orchestrator = orchestrator(&remote);

        let guard = orchestrator.shared.enter(Phase::LoadingInitial).unwrap();
        orchestrator
            .mutate(|state| state.goals.water = 2500.0)
            .unwrap();
        assert!(!orchestrator.autosave_pending());
        drop(guard);

        assert_eq!(orchestrator.phase(), Phase::Idle);
        assert!(orchestrator.autosave_pending());
    }

    #[tokio::test]
    async fn test_idle_load_guard_schedules_nothing() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let orchestrator = orchestrator(&remote);

        drop(orchestrator.shared.enter(Phase::LoadingInitial).unwrap());
        assert!(!orchestrator.autosave_pending());
    }

    #[tokio::test]
    async fn test_save_now_drops_pending_autosave() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let orchestrator = orchestrator(&remote);

        orchestrator
            .mutate(|state| state.goals.water = 2500.0)
            .unwrap();
        assert!(orchestrator.autosave_pending());

        orchestrator.save_now(orchestrator.state()).await.unwrap();
        assert!(!orchestrator.autosave_pending());
        assert_eq!(remote.put_count(), 1);
    }

    #[tokio::test]
    async fn test_restore_without_backup() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let orchestrator = orchestrator(&remote);

        assert!(matches!(
            orchestrator.restore_backup().await,
            Err(SyncError::NoBackup)
        ));
        assert_eq!(remote.fetch_count(), 0);
        assert!(orchestrator.status().is_error());
        assert_eq!(orchestrator.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_apply_external_is_idempotent() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let orchestrator = orchestrator(&remote);

        let mut state = AppState::default();
        state.profile.name = "Carlos".to_string();
        let raw = state.to_json().unwrap();

        assert_eq!(orchestrator.apply_external(None), ExternalApply::Ignored);
        assert_eq!(
            orchestrator.apply_external(Some("not json")),
            ExternalApply::Ignored
        );
        assert_eq!(
            orchestrator.apply_external(Some(&raw)),
            ExternalApply::Applied
        );
        wait_for_puts(&remote, 1).await;
        assert_eq!(remote.state(USER), Some(state.clone()));

        assert_eq!(
            orchestrator.apply_external(Some(&raw)),
            ExternalApply::Unchanged
        );
        tokio::task::yield_now().await;
        assert_eq!(remote.put_count(), 1);
        assert_eq!(orchestrator.state().profile.name, "Carlos");
        assert!(!orchestrator.autosave_pending());
    }

    #[tokio::test]
    async fn test_flush_without_pending_autosave() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let orchestrator = orchestrator(&remote);
        assert!(!orchestrator.flush_autosave().await);
        assert_eq!(remote.put_count(), 0);
    }
}
