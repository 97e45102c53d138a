use clap::Args;
use std::path::PathBuf;

use nutrisync_core::sanitize::parse_and_sanitize;
use nutrisync_core::SyncStatus;

use super::session::{runtime, Session};
use crate::config::Config;

#[derive(Args)]
pub struct ImportCommand {
    /// JSON export to import; replaces current data
    pub file: PathBuf,
}

impl ImportCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(&self.file)
            .map_err(|e| format!("Failed to read '{}': {}", self.file.display(), e))?;
        let imported = parse_and_sanitize(&contents)
            .ok_or_else(|| format!("'{}' is not a nutrisync export", self.file.display()))?;

        let rt = runtime()?;
        rt.block_on(async {
            let session = Session::open(config)?;
            let orchestrator = &session.orchestrator;

            // Replacing everything; keep what we had.
            orchestrator.snapshot_backup()?;

            let state = imported.state;
            println!(
                "Importing {} day(s), {} food entr{}",
                state.log.len(),
                state.entry_count(),
                if state.entry_count() == 1 { "y" } else { "ies" }
            );
            if imported.report.upgraded() {
                println!(
                    "Upgraded from schema version {} to {}",
                    imported.report.from_version, imported.report.to_version
                );
            }

            orchestrator.save_now(state).await?;
            match orchestrator.status() {
                SyncStatus::Error { message } => {
                    println!("Saved locally; not synced: {}", message)
                }
                _ => println!("Saved and synced."),
            }
            println!("Previous data kept as backup ('nutri restore' to merge it back).");
            Ok::<(), Box<dyn std::error::Error>>(())
        })
    }
}
