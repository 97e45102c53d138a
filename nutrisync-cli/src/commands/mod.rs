mod config_cmd;
mod day_cmd;
mod import_cmd;
mod session;
mod sync_cmd;

pub use config_cmd::ConfigCommand;
pub use day_cmd::{ShowCommand, WaterCommand};
pub use import_cmd::ImportCommand;
pub use sync_cmd::{SyncAction, SyncCommand};
