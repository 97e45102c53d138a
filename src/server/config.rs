//! Server configuration from the environment.
//!
//! Environment variables:
//! - `NUTRISYNC_PORT`: Port to listen on (default: 8080)
//! - `NUTRISYNC_DATA_DIR`: Directory to store documents (default: ~/.local/share/nutrisync-server)
//! - `NUTRISYNC_CONFIG`: Path to config file (default: ~/.config/nutrisync-server/config.yaml)
//!
//! # Config File Format
//!
//! ```yaml
//! api_keys:
//!   - key: "your-secret-key-here"
//!     user_id: "user1"
//! ```

use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 8080;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Directory to store documents
    pub data_dir: PathBuf,
    /// Path to config file
    pub config_path: PathBuf,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("NUTRISYNC_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let data_dir = lookup("NUTRISYNC_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("nutrisync-server")
            });

        let config_path = lookup("NUTRISYNC_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("nutrisync-server")
                    .join("config.yaml")
            });

        Self {
            port,
            data_dir,
            config_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(|_| None);
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.data_dir.ends_with("nutrisync-server"));
        assert!(config.config_path.ends_with("config.yaml"));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("NUTRISYNC_PORT", "9191"),
            ("NUTRISYNC_DATA_DIR", "/srv/nutrisync"),
            ("NUTRISYNC_CONFIG", "/etc/nutrisync.yaml"),
        ]
        .into_iter()
        .collect();

        let config = ServerConfig::from_lookup(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(config.port, 9191);
        assert_eq!(config.data_dir, PathBuf::from("/srv/nutrisync"));
        assert_eq!(config.config_path, PathBuf::from("/etc/nutrisync.yaml"));
    }

    #[test]
    fn test_invalid_port_falls_back() {
        let config = ServerConfig::from_lookup(|name| {
            (name == "NUTRISYNC_PORT").then(|| "not-a-port".to_string())
        });
        assert_eq!(config.port, DEFAULT_PORT);
    }
}
