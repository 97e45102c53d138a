//! Commands that reconcile local state with the server.

use nutrisync_core::{
    CrossTabNotifier, InitialLoad, RemoteError, StoreError, SyncError, SyncStatus, SyncSummary,
};

use super::session::{runtime, Session};
use crate::config::Config;

/// Which sync operation to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Adopt the server copy as-is
    Pull,
    /// Merge with the server copy, server first
    Sync,
    /// Merge the local backup with the server copy
    Restore,
    /// Snapshot current state into the backup slot
    Backup,
    /// Show configuration, local summary, and server health
    Status,
    /// Follow changes from other processes until interrupted
    Watch,
}

pub struct SyncCommand {
    action: SyncAction,
}

impl SyncCommand {
    pub fn new(action: SyncAction) -> Self {
        Self { action }
    }

    pub fn run(&self, config: &Config) -> Result<(), SyncCommandError> {
        let rt = runtime().map_err(|e| SyncCommandError::RuntimeError(e.to_string()))?;

        match self.action {
            SyncAction::Pull => rt.block_on(self.pull(config)),
            SyncAction::Sync => rt.block_on(self.sync(config)),
            SyncAction::Restore => rt.block_on(self.restore(config)),
            SyncAction::Backup => self.backup(config),
            SyncAction::Status => rt.block_on(self.status(config)),
            SyncAction::Watch => rt.block_on(self.watch(config)),
        }
    }

    fn require_remote(config: &Config) -> Result<(), SyncCommandError> {
        if config.is_signed_in() {
            Ok(())
        } else {
            Err(SyncCommandError::NotConfigured)
        }
    }

    async fn pull(&self, config: &Config) -> Result<(), SyncCommandError> {
        Self::require_remote(config)?;
        let session = Session::open(config)?;

        println!("Loading from {}...", config.server_url.value);
        match session.orchestrator.initial_load().await? {
            InitialLoad::Adopted { migrated } => {
                let state = session.orchestrator.state();
                println!(
                    "Loaded {} day(s), {} food entr{}.",
                    state.log.len(),
                    state.entry_count(),
                    if state.entry_count() == 1 { "y" } else { "ies" }
                );
                if migrated {
                    println!("Server copy was upgraded to the current format.");
                }
            }
            InitialLoad::NoRemoteDocument => {
                println!("Nothing stored on the server yet; keeping local data.");
            }
        }
        Ok(())
    }

    async fn sync(&self, config: &Config) -> Result<(), SyncCommandError> {
        Self::require_remote(config)?;
        let session = Session::open(config)?;

        // Keep a copy of what we had in case the merge goes the wrong way.
        session.orchestrator.snapshot_backup()?;

        println!("Syncing with {}...", config.server_url.value);
        let summary = session.orchestrator.force_sync().await?;
        print_summary(&summary);
        Ok(())
    }

    async fn restore(&self, config: &Config) -> Result<(), SyncCommandError> {
        Self::require_remote(config)?;
        let session = Session::open(config)?;

        println!("Restoring from local backup...");
        let summary = session.orchestrator.restore_backup().await?;
        print_summary(&summary);
        Ok(())
    }

    fn backup(&self, config: &Config) -> Result<(), SyncCommandError> {
        let session = Session::open(config)?;
        session.orchestrator.snapshot_backup()?;

        let state = session.orchestrator.state();
        println!(
            "Backed up {} day(s) to {}",
            state.log.len(),
            config.data_dir.value.display()
        );
        Ok(())
    }

    async fn status(&self, config: &Config) -> Result<(), SyncCommandError> {
        let session = Session::open(config)?;
        let local = session.orchestrator.local();
        let state = session.orchestrator.state();

        println!("Sync Status");
        println!("===========");
        println!();
        println!("Data dir:  {}", config.data_dir.value.display());
        println!("Server:    {}", config.server_url.value);
        println!("User:      {}", config.user_id.value);
        println!(
            "API key:   {}",
            if config.is_signed_in() { "set" } else { "not set" }
        );
        println!();
        println!("Days logged:    {}", state.log.len());
        println!("Food entries:   {}", state.entry_count());
        println!("Schema version: {}", state.schema_version);
        println!(
            "Backup:         {}",
            if local.load_backup().is_some() {
                "present"
            } else {
                "none"
            }
        );
        println!();

        print!("Server status: ");
        match session.remote.health().await {
            Ok(()) => println!("✓ reachable"),
            Err(RemoteError::Unreachable(_)) => println!("✗ unreachable"),
            Err(e) => println!("✗ error: {}", e),
        }

        if !config.is_signed_in() {
            println!();
            println!("To enable sync, add to your config file:");
            println!();
            println!("  remote:");
            println!("    user_id: \"you\"");
            println!("    api_key: \"your-key\"");
            println!();
            println!("Or set environment variables:");
            println!("  NUTRI_USER_ID, NUTRI_API_KEY");
        }
        Ok(())
    }

    async fn watch(&self, config: &Config) -> Result<(), SyncCommandError> {
        let session = Session::open(config)?;
        let orchestrator = session.orchestrator.clone();
        let notifier = CrossTabNotifier::spawn(orchestrator.clone());
        let mut status = orchestrator.subscribe_status();

        println!(
            "Watching {} (Ctrl-C to stop)",
            config.data_dir.value.display()
        );

        loop {
            tokio::select! {
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = status.borrow_and_update().clone();
                    print_status(&current);
                }
                _ = tokio::signal::ctrl_c() => {
                    break;
                }
            }
        }

        notifier.stop();
        if orchestrator.flush_autosave().await {
            print_status(&orchestrator.status());
        }
        Ok(())
    }
}

fn print_summary(summary: &SyncSummary) {
    if !summary.had_remote {
        println!("Nothing stored on the server yet.");
    }
    println!(
        "{} day(s), {} food entr{}.",
        summary.days,
        summary.entries,
        if summary.entries == 1 { "y" } else { "ies" }
    );
    if summary.pushed {
        println!("✓ Server updated.");
    } else {
        println!("✗ Saved locally, but the server was not updated.");
    }
}

fn print_status(status: &SyncStatus) {
    match status {
        SyncStatus::Idle => {}
        SyncStatus::Saving => println!("  saving..."),
        SyncStatus::Saved { .. } => println!("  ✓ {}", status),
        SyncStatus::Error { .. } => println!("  ✗ {}", status),
    }
}

/// Errors from sync commands
#[derive(Debug)]
pub enum SyncCommandError {
    NotConfigured,
    Sync(SyncError),
    Store(StoreError),
    Remote(RemoteError),
    RuntimeError(String),
}

impl std::fmt::Display for SyncCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncCommandError::NotConfigured => write!(
                f,
                "Sync not configured. Set remote.api_key in config or NUTRI_API_KEY."
            ),
            SyncCommandError::Sync(e) if e.is_transient() => {
                write!(f, "{}. Local data is safe; try again shortly.", e)
            }
            SyncCommandError::Sync(e) => write!(f, "{}", e),
            SyncCommandError::Store(e) => write!(f, "{}", e),
            SyncCommandError::Remote(e) => write!(f, "{}", e),
            SyncCommandError::RuntimeError(e) => write!(f, "Runtime error: {}", e),
        }
    }
}

impl std::error::Error for SyncCommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncCommandError::Sync(e) => Some(e),
            SyncCommandError::Store(e) => Some(e),
            SyncCommandError::Remote(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SyncError> for SyncCommandError {
    fn from(e: SyncError) -> Self {
        SyncCommandError::Sync(e)
    }
}

impl From<StoreError> for SyncCommandError {
    fn from(e: StoreError) -> Self {
        SyncCommandError::Store(e)
    }
}

impl From<RemoteError> for SyncCommandError {
    fn from(e: RemoteError) -> Self {
        SyncCommandError::Remote(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nutrisync_core::{AuthError, Phase};

    #[test]
    fn test_transient_errors_suggest_retry() {
        let offline = SyncCommandError::from(SyncError::Remote(RemoteError::Unreachable(
            "connection refused".to_string(),
        )));
        assert!(offline.to_string().ends_with("try again shortly."));

        let busy = SyncCommandError::from(SyncError::Busy(Phase::ForceSyncing));
        assert!(busy.to_string().contains("try again shortly"));
    }

    #[test]
    fn test_permanent_errors_do_not_suggest_retry() {
        let denied = SyncCommandError::from(SyncError::Remote(RemoteError::PermissionDenied(
            "invalid token".to_string(),
        )));
        assert!(!denied.to_string().contains("try again"));

        let signed_out = SyncCommandError::from(SyncError::Auth(AuthError::NoSession));
        assert!(!signed_out.to_string().contains("try again"));
    }
}
