//! nutrisync Core Library
//!
//! Models, sanitization, merging, storage adapters, and sync orchestration
//! for the nutrisync nutrition log.

pub mod crosstab;
pub mod merge;
pub mod models;
pub mod remote;
pub mod sanitize;
pub mod store;
pub mod sync;

pub use crosstab::CrossTabNotifier;
pub use merge::merge_cloud_first;
pub use models::{
    AppState, DayLog, FastingSession, FoodEntry, Goals, MealSlot, MealTotals, Meals, Profile,
};
pub use remote::{
    AuthError, HttpRemoteStore, MemoryRemoteStore, RemoteDocument, RemoteError, RemoteStore,
    StaticToken, TokenProvider,
};
pub use sanitize::{sanitize, sanitize_str, MigrationReport, Sanitized, CURRENT_SCHEMA_VERSION};
pub use store::{FileLocalStore, LocalStateStore, LocalStore, MemoryLocalStore, StoreError};
pub use sync::{
    ExternalApply, InitialLoad, Phase, SyncError, SyncOrchestrator, SyncSettings, SyncStatus,
    SyncSummary,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
