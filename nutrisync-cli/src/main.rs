use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::{
    ConfigCommand, ImportCommand, ShowCommand, SyncAction, SyncCommand, WaterCommand,
};
use config::Config;

#[derive(Parser)]
#[command(name = "nutri")]
#[command(version)]
#[command(about = "Nutrition and habit log with cloud sync", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace local data with the server copy
    Pull,

    /// Merge local data with the server copy
    Sync,

    /// Merge the local backup back in
    Restore,

    /// Save a backup of the current data
    Backup,

    /// Import a JSON export
    Import(ImportCommand),

    /// Log water intake
    Water(WaterCommand),

    /// Show a day's log
    Show(ShowCommand),

    /// Show sync status
    Status,

    /// Follow changes from other processes and push them
    Watch,

    /// Manage configuration
    Config(ConfigCommand),
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Save config path for init command
    let cli_config_path = cli.config.clone();

    let config = Config::load(cli.config)?;

    match &cli.command {
        Some(Commands::Pull) => SyncCommand::new(SyncAction::Pull).run(&config)?,
        Some(Commands::Sync) => SyncCommand::new(SyncAction::Sync).run(&config)?,
        Some(Commands::Restore) => SyncCommand::new(SyncAction::Restore).run(&config)?,
        Some(Commands::Backup) => SyncCommand::new(SyncAction::Backup).run(&config)?,
        Some(Commands::Status) => SyncCommand::new(SyncAction::Status).run(&config)?,
        Some(Commands::Watch) => SyncCommand::new(SyncAction::Watch).run(&config)?,
        Some(Commands::Import(cmd)) => cmd.run(&config)?,
        Some(Commands::Water(cmd)) => cmd.run(&config)?,
        Some(Commands::Show(cmd)) => cmd.run(&config)?,
        Some(Commands::Config(cmd)) => cmd.run(&config, cli_config_path)?,
        None => println!("Use --help to see available commands"),
    }

    Ok(())
}
