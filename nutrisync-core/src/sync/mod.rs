//! Sync orchestration between memory, the local store, and the remote store.
//!
//! ## Phases
//!
//! ```text
//! Idle -> LoadingInitial  -> Idle   initial_load
//! Idle -> SavingDebounced -> Idle   autosave push
//! Idle -> ForceSyncing    -> Idle   force_sync
//! Idle -> Restoring       -> Idle   restore_backup
//! ```
//!
//! `LoadingInitial`, `ForceSyncing` and `Restoring` exclude one another; a
//! request made while one of them runs fails with [`SyncError::Busy`] and does
//! nothing. Every state change is written locally first. Remote failures only
//! change the reported [`SyncStatus`] and never undo a local write.

mod debounce;
mod error;
mod orchestrator;
mod status;

pub use debounce::Debouncer;
pub use error::SyncError;
pub use orchestrator::{SyncOrchestrator, SyncSettings, DEFAULT_AUTOSAVE_DELAY};
pub use status::{ExternalApply, InitialLoad, Phase, SyncStatus, SyncSummary};
