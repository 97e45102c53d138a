use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use nutrisync_core::remote::RemoteDocument;
use tempfile::TempDir;
use nutrisync_core::{
    AppState, AuthError, CrossTabNotifier, DayLog, FileLocalStore, FoodEntry, InitialLoad,
    LocalStateStore, LocalStore, MealSlot, MemoryLocalStore, MemoryRemoteStore, Phase, RemoteError, StaticToken,
    SyncError, SyncOrchestrator, SyncSettings, SyncStatus, CURRENT_SCHEMA_VERSION,
};

const USER: &str = "ana";
const TOKEN: &str = "token-ana";

struct Harness {
    orchestrator: SyncOrchestrator,
    memory: Arc<MemoryLocalStore>,
    remote: Arc<MemoryRemoteStore>,
}

fn harness() -> Harness {
    harness_with(Arc::new(MemoryLocalStore::new()), StaticToken::new(TOKEN))
}

fn harness_with(memory: Arc<MemoryLocalStore>, token: StaticToken) -> Harness {
    let remote = Arc::new(MemoryRemoteStore::new().with_token(TOKEN));
    let orchestrator = SyncOrchestrator::new(
        SyncSettings::new(USER),
        LocalStateStore::new(memory.clone()),
        remote.clone(),
        Arc::new(token),
    );
    Harness {
        orchestrator,
        memory,
        remote,
    }
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

fn day_with_entries(count: usize) -> DayLog {
    (0..count).fold(DayLog::new(), |day, i| {
        day.with_entry(
            MealSlot::Lunch,
            FoodEntry::new(format!("food {}", i))
                .with_id(format!("e{}", i))
                .with_grams(100.0)
                .with_macros(120.0, 10.0, 12.0, 3.0),
        )
    })
}

fn named_state(name: &str) -> AppState {
    let mut state = AppState::default();
    state.profile.name = name.to_string();
    state
}

#[tokio::test]
async fn test_initial_load_adopts_remote_verbatim() {
    let h = harness();
    let mut local = named_state("Carlos");
    local.log.insert(date(1), day_with_entries(3));
    h.orchestrator.update_app_state(local).unwrap();

    let mut remote = named_state("Ana");
    remote.log.insert(date(1), day_with_entries(1));
    h.remote.insert(USER, &remote).unwrap();

    let outcome = h.orchestrator.initial_load().await.unwrap();
    assert_eq!(outcome, InitialLoad::Adopted { migrated: false });
    assert_eq!(h.orchestrator.state(), remote);
    assert_eq!(h.orchestrator.local().load_state(), Some(remote));
    assert_eq!(h.orchestrator.phase(), Phase::Idle);

    // Adopting cancels the autosave scheduled by the earlier local edit.
    assert!(!h.orchestrator.autosave_pending());
    assert_eq!(h.remote.put_count(), 0);
}

#[tokio::test]
async fn test_initial_load_writes_legacy_document_back_once() {
    let h = harness();
    let legacy = r#"{"profile":{"nombre":"Ana"},"log":{"2024-01-01":{"water":500}}}"#;
    h.remote.insert_document(
        USER,
        RemoteDocument {
            app_state: legacy.to_string(),
            updated_at: Utc::now(),
        },
    );

    let outcome = h.orchestrator.initial_load().await.unwrap();
    assert_eq!(outcome, InitialLoad::Adopted { migrated: true });
    assert_eq!(h.remote.put_count(), 1);

    let stored = h.remote.state(USER).unwrap();
    assert_eq!(stored.schema_version, CURRENT_SCHEMA_VERSION);
    assert_eq!(stored.profile.name, "Ana");
    assert_eq!(stored.day(date(1)).unwrap().water, 500.0);

    // Another legacy document in the same session is adopted but not written.
    h.remote.insert_document(
        USER,
        RemoteDocument {
            app_state: legacy.to_string(),
            updated_at: Utc::now(),
        },
    );
    let outcome = h.orchestrator.initial_load().await.unwrap();
    assert_eq!(outcome, InitialLoad::Adopted { migrated: false });
    assert_eq!(h.remote.put_count(), 1);
}

#[tokio::test]
async fn test_unversioned_document_with_sessions_is_not_written_back() {
    let h = harness();
    let unversioned = r#"{"profile":{"nombre":"Ana"},"fastingSessions":[{"id":"f1","start":"2024-01-01T20:00:00Z"}],"log":{"2024-01-01":{"meals":{"cena":[{"id":"e1","qty":2,"unit":"u"}]}}}}"#;
    h.remote.insert_document(
        USER,
        RemoteDocument {
            app_state: unversioned.to_string(),
            updated_at: Utc::now(),
        },
    );

    let outcome = h.orchestrator.initial_load().await.unwrap();
    assert_eq!(outcome, InitialLoad::Adopted { migrated: false });
    assert_eq!(h.remote.put_count(), 0);

    let state = h.orchestrator.state();
    assert_eq!(state.schema_version, CURRENT_SCHEMA_VERSION);
    assert_eq!(state.fasting_sessions.len(), 1);
    assert_eq!(
        state.day(date(1)).unwrap().meals.slot(MealSlot::Dinner)[0].units,
        Some(2.0)
    );
}

#[tokio::test]
async fn test_initial_load_without_remote_document_keeps_local() {
    let h = harness();
    h.orchestrator
        .update_app_state(named_state("Carlos"))
        .unwrap();

    let outcome = h.orchestrator.initial_load().await.unwrap();
    assert_eq!(outcome, InitialLoad::NoRemoteDocument);
    assert_eq!(h.orchestrator.state().profile.name, "Carlos");
    assert_eq!(h.remote.put_count(), 0);
}

#[tokio::test]
async fn test_missing_token_short_circuits() {
    let h = harness_with(Arc::new(MemoryLocalStore::new()), StaticToken::signed_out());

    let result = h.orchestrator.initial_load().await;
    assert!(matches!(result, Err(SyncError::Auth(AuthError::NoSession))));
    assert_eq!(h.remote.fetch_count(), 0);
    assert!(h.orchestrator.status().is_error());

    // Saving still lands locally.
    h.orchestrator
        .save_now(named_state("Ana"))
        .await
        .unwrap();
    assert_eq!(h.remote.put_count(), 0);
    assert_eq!(
        h.orchestrator.local().load_state().unwrap().profile.name,
        "Ana"
    );
}

#[tokio::test]
async fn test_force_sync_merges_cloud_first() {
    let h = harness();

    let mut remote = named_state("Ana");
    remote.log.insert(date(1), day_with_entries(1));
    remote.log.insert(date(3), day_with_entries(2));
    h.remote.insert(USER, &remote).unwrap();

    let mut local = named_state("Carlos");
    local.log.insert(date(1), day_with_entries(3));
    local.log.insert(date(2), day_with_entries(1));
    h.orchestrator.update_app_state(local.clone()).unwrap();

    let summary = h.orchestrator.force_sync().await.unwrap();
    assert!(summary.had_remote);
    assert!(summary.pushed);
    assert_eq!(summary.days, 3);
    assert_eq!(summary.entries, 6);

    let merged = h.orchestrator.state();
    assert_eq!(merged.profile.name, "Ana");
    assert_eq!(merged.day(date(1)), local.day(date(1)));
    assert_eq!(merged.day(date(2)), local.day(date(2)));
    assert_eq!(merged.day(date(3)), remote.day(date(3)));

    assert_eq!(h.remote.state(USER), Some(merged.clone()));
    assert_eq!(h.orchestrator.local().load_state(), Some(merged));
    assert!(matches!(h.orchestrator.status(), SyncStatus::Saved { .. }));
}

#[tokio::test]
async fn test_force_sync_offline_writes_nothing() {
    let h = harness();
    h.orchestrator
        .update_app_state(named_state("Carlos"))
        .unwrap();
    let before = h.memory.get("nutrisync.appState").unwrap();
    h.remote.set_offline(true);

    let result = h.orchestrator.force_sync().await;
    assert!(matches!(
        result,
        Err(SyncError::Remote(RemoteError::Unreachable(_)))
    ));
    assert_eq!(h.memory.get("nutrisync.appState").unwrap(), before);
    assert_eq!(h.remote.put_count(), 0);
    assert!(h.orchestrator.status().is_error());
    assert_eq!(h.orchestrator.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_concurrent_force_sync_is_busy() {
    let h = harness();
    h.remote.set_latency(Some(Duration::from_millis(200)));

    let first = tokio::spawn({
        let orchestrator = h.orchestrator.clone();
        async move { orchestrator.force_sync().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(matches!(
        h.orchestrator.restore_backup().await,
        Err(SyncError::Busy(Phase::ForceSyncing))
    ));
    assert!(matches!(
        h.orchestrator.force_sync().await,
        Err(SyncError::Busy(Phase::ForceSyncing))
    ));

    first.await.unwrap().unwrap();
    assert_eq!(h.remote.fetch_count(), 1);
    assert_eq!(h.orchestrator.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_restore_merges_backup_under_remote() {
    let h = harness();

    let mut good = named_state("Ana");
    good.log.insert(date(1), day_with_entries(2));
    h.orchestrator.update_app_state(good.clone()).unwrap();
    h.orchestrator.snapshot_backup().unwrap();

    // Something goes wrong locally.
    h.orchestrator.update_app_state(AppState::default()).unwrap();

    let summary = h.orchestrator.restore_backup().await.unwrap();
    assert!(!summary.had_remote);
    assert!(summary.pushed);
    assert_eq!(h.orchestrator.state(), good);
    assert_eq!(h.remote.state(USER), Some(good));
}

#[tokio::test]
async fn test_save_now_keeps_local_when_remote_fails() {
    let h = harness();
    h.remote.set_offline(true);

    let mut state = named_state("Ana");
    state.log.insert(date(1), day_with_entries(1));
    h.orchestrator.save_now(state.clone()).await.unwrap();

    assert_eq!(h.orchestrator.local().load_state(), Some(state.clone()));
    assert!(h.orchestrator.status().is_error());
    assert!(h.remote.document(USER).is_none());

    h.remote.set_offline(false);
    h.orchestrator.save_now(state.clone()).await.unwrap();
    assert!(matches!(h.orchestrator.status(), SyncStatus::Saved { .. }));
    assert_eq!(h.remote.state(USER), Some(state));
}

#[tokio::test]
async fn test_save_now_reports_local_failure() {
    let h = harness();
    h.memory.fail_writes(true);

    let result = h.orchestrator.save_now(named_state("Ana")).await;
    assert!(result.is_err());
    assert_eq!(h.orchestrator.state().profile.name, "Ana");
    assert!(h.orchestrator.status().is_error());
    assert_eq!(h.remote.state(USER).unwrap().profile.name, "Ana");
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_mutations_pushes_once() {
    let h = harness();

    for ml in 1..=5u32 {
        h.orchestrator
            .mutate(|state| state.day_mut(date(1)).water = f64::from(ml) * 250.0)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(h.remote.put_count(), 0);

    // 1820ms since the last mutation.
    tokio::time::sleep(Duration::from_millis(1800)).await;
    assert_eq!(h.remote.put_count(), 0);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.remote.put_count(), 1);
    assert_eq!(h.remote.state(USER).unwrap().day(date(1)).unwrap().water, 1250.0);
    assert_eq!(h.orchestrator.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_flush_autosave_pushes_immediately() {
    let h = harness();
    h.orchestrator
        .mutate(|state| state.goals.water = 2500.0)
        .unwrap();
    assert!(h.orchestrator.autosave_pending());

    assert!(h.orchestrator.flush_autosave().await);
    assert_eq!(h.remote.put_count(), 1);
    assert_eq!(h.remote.state(USER).unwrap().goals.water, 2500.0);
    assert!(!h.orchestrator.autosave_pending());
}

#[tokio::test]
async fn test_cross_tab_write_is_applied() {
    let tab_a = harness();
    let tab_b = harness_with(
        Arc::new(tab_a.memory.open_tab()),
        StaticToken::new(TOKEN),
    );
    let notifier = CrossTabNotifier::spawn(tab_b.orchestrator.clone());

    tab_a
        .orchestrator
        .update_app_state(named_state("Ana"))
        .unwrap();

    wait_until(|| tab_b.orchestrator.state().profile.name == "Ana").await;

    // Tab B forwards the adopted state to its remote store once.
    wait_until(|| tab_b.remote.put_count() == 1).await;
    assert_eq!(tab_b.remote.state(USER), Some(named_state("Ana")));

    tab_a
        .orchestrator
        .update_app_state(named_state("Ana"))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(tab_b.remote.put_count(), 1);

    // Writes to other keys are ignored.
    tab_a.orchestrator.local().mark_onboarding_seen().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(tab_b.orchestrator.state().profile.name, "Ana");
    assert!(notifier.is_running());
    notifier.stop();
}

#[tokio::test(start_paused = true)]
async fn test_save_now_pushes_once() {
    let h = harness();
    h.orchestrator
        .mutate(|state| state.goals.water = 2000.0)
        .unwrap();
    assert!(h.orchestrator.autosave_pending());

    h.orchestrator.save_now(named_state("Ana")).await.unwrap();
    assert_eq!(h.remote.put_count(), 1);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(h.remote.put_count(), 1);
    assert_eq!(h.remote.state(USER), Some(named_state("Ana")));
}

#[tokio::test(start_paused = true)]
async fn test_edit_during_initial_load_reaches_remote() {
    let h = harness();
    h.remote.set_latency(Some(Duration::from_millis(500)));

    let load = tokio::spawn({
        let orchestrator = h.orchestrator.clone();
        async move { orchestrator.initial_load().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.orchestrator.phase(), Phase::LoadingInitial);
    h.orchestrator
        .mutate(|state| state.goals.water = 3333.0)
        .unwrap();

    assert_eq!(load.await.unwrap().unwrap(), InitialLoad::NoRemoteDocument);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.remote.put_count(), 1);
    assert_eq!(h.remote.state(USER).unwrap().goals.water, 3333.0);
}

#[tokio::test(start_paused = true)]
async fn test_edit_during_failed_initial_load_reaches_remote() {
    let h = harness();
    h.remote.set_latency(Some(Duration::from_millis(500)));
    h.remote.set_offline(true);

    let load = tokio::spawn({
        let orchestrator = h.orchestrator.clone();
        async move { orchestrator.initial_load().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.orchestrator
        .mutate(|state| state.goals.water = 3333.0)
        .unwrap();

    assert!(load.await.unwrap().is_err());
    h.remote.set_offline(false);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.remote.state(USER).unwrap().goals.water, 3333.0);
}

#[tokio::test(start_paused = true)]
async fn test_edit_during_initial_load_is_replaced_by_adopted_document() {
    let h = harness();
    h.remote.insert(USER, &named_state("Ana")).unwrap();
    h.remote.set_latency(Some(Duration::from_millis(500)));

    let load = tokio::spawn({
        let orchestrator = h.orchestrator.clone();
        async move { orchestrator.initial_load().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.orchestrator
        .mutate(|state| state.goals.water = 3333.0)
        .unwrap();

    assert_eq!(
        load.await.unwrap().unwrap(),
        InitialLoad::Adopted { migrated: false }
    );
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.remote.put_count(), 0);
    assert_eq!(h.orchestrator.state(), named_state("Ana"));
}

#[tokio::test]
async fn test_file_store_cross_process_write_is_applied() {
    let temp_dir = TempDir::new().unwrap();
    let writer = LocalStateStore::new(Arc::new(FileLocalStore::new(temp_dir.path())));

    let remote = Arc::new(MemoryRemoteStore::new().with_token(TOKEN));
    let reader = SyncOrchestrator::new(
        SyncSettings::new(USER),
        LocalStateStore::new(Arc::new(FileLocalStore::new(temp_dir.path()))),
        remote.clone(),
        Arc::new(StaticToken::new(TOKEN)),
    );
    let notifier = CrossTabNotifier::spawn(reader.clone());

    let mut state = named_state("Ana");
    state.log.insert(date(1), day_with_entries(2));
    writer.save_state(&state).unwrap();

    wait_until(|| reader.state() == state).await;
    wait_until(|| remote.put_count() == 1).await;
    assert_eq!(remote.state(USER), Some(state));
    assert!(notifier.is_running());
}
