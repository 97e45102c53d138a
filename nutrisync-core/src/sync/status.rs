//! Orchestrator phases and user-visible status.

use std::fmt;

use chrono::{DateTime, Utc};

/// What the orchestrator is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    LoadingInitial,
    SavingDebounced,
    ForceSyncing,
    Restoring,
}

impl Phase {
    /// Phases that must not overlap with one another.
    pub fn is_exclusive(&self) -> bool {
        matches!(
            self,
            Phase::LoadingInitial | Phase::ForceSyncing | Phase::Restoring
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::LoadingInitial => "initial load",
            Phase::SavingDebounced => "autosave",
            Phase::ForceSyncing => "force sync",
            Phase::Restoring => "restore",
        };
        write!(f, "{}", name)
    }
}

/// Save status shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    Saving,
    Saved { at: DateTime<Utc> },
    Error { message: String },
}

impl SyncStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, SyncStatus::Error { .. })
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Idle => write!(f, "idle"),
            SyncStatus::Saving => write!(f, "saving..."),
            SyncStatus::Saved { at } => write!(f, "saved at {}", at.format("%H:%M:%S")),
            SyncStatus::Error { message } => write!(f, "error: {}", message),
        }
    }
}

/// Outcome of [`initial_load`](super::SyncOrchestrator::initial_load).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitialLoad {
    /// The remote document was adopted. `migrated` is set when it was written
    /// back in the current schema.
    Adopted { migrated: bool },
    /// No usable remote document; local state stays in effect.
    NoRemoteDocument,
}

/// Outcome of a force sync or restore.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSummary {
    /// Whether a remote document took part in the merge.
    pub had_remote: bool,
    /// Days in the adopted state's log.
    pub days: usize,
    /// Food entries across all days.
    pub entries: usize,
    /// Whether the merged document reached the remote store.
    pub pushed: bool,
}

/// Outcome of applying a write observed from another tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalApply {
    /// The value was missing or unusable.
    Ignored,
    /// The value matched the state already in memory.
    Unchanged,
    Applied,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive_phases() {
        assert!(Phase::LoadingInitial.is_exclusive());
        assert!(Phase::ForceSyncing.is_exclusive());
        assert!(Phase::Restoring.is_exclusive());
        assert!(!Phase::Idle.is_exclusive());
        assert!(!Phase::SavingDebounced.is_exclusive());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(SyncStatus::Saving.to_string(), "saving...");
        assert_eq!(
            SyncStatus::Error {
                message: "offline".to_string()
            }
            .to_string(),
            "error: offline"
        );
        assert!(SyncStatus::Error {
            message: String::new()
        }
        .is_error());
    }
}
