use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server used when none is configured.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Remote section of the config file
#[derive(Debug, Clone, Deserialize, Default)]
struct RemoteFile {
    server_url: Option<String>,
    user_id: Option<String>,
    api_key: Option<String>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    autosave_ms: Option<u64>,
    remote: Option<RemoteFile>,
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Directory holding the local store
    pub data_dir: ConfigValue<PathBuf>,
    /// Remote document server
    pub server_url: ConfigValue<String>,
    /// Owner of the remote document
    pub user_id: ConfigValue<String>,
    /// Delay before a change is pushed, in milliseconds
    pub autosave_ms: ConfigValue<u64>,
    /// Bearer token for the server; never printed
    #[serde(skip_serializing)]
    pub api_key: Option<ConfigValue<String>>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut server_url =
            ConfigValue::new(DEFAULT_SERVER_URL.to_string(), ConfigSource::Default);
        let mut user_id = ConfigValue::new("default".to_string(), ConfigSource::Default);
        let mut autosave_ms = ConfigValue::new(2000, ConfigSource::Default);
        let mut api_key = None;
        let mut config_file = None;

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(dir) = file_config.data_dir {
                // Resolve relative paths against config file's directory
                let resolved = if dir.is_relative() {
                    path.parent().map(|p| p.join(&dir)).unwrap_or(dir)
                } else {
                    dir
                };
                data_dir = ConfigValue::new(resolved, ConfigSource::File);
            }
            if let Some(ms) = file_config.autosave_ms {
                autosave_ms = ConfigValue::new(ms, ConfigSource::File);
            }
            if let Some(remote) = file_config.remote {
                if let Some(url) = remote.server_url {
                    server_url = ConfigValue::new(url, ConfigSource::File);
                }
                if let Some(user) = remote.user_id {
                    user_id = ConfigValue::new(user, ConfigSource::File);
                }
                if let Some(key) = remote.api_key {
                    api_key = Some(ConfigValue::new(key, ConfigSource::File));
                }
            }
        }

        // Apply environment variable overrides
        if let Ok(dir) = std::env::var("NUTRI_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("NUTRI_SERVER_URL") {
            server_url = ConfigValue::new(url, ConfigSource::Environment);
        }
        if let Ok(user) = std::env::var("NUTRI_USER_ID") {
            user_id = ConfigValue::new(user, ConfigSource::Environment);
        }
        if let Ok(key) = std::env::var("NUTRI_API_KEY") {
            api_key = Some(ConfigValue::new(key, ConfigSource::Environment));
        }
        if let Ok(ms) = std::env::var("NUTRI_AUTOSAVE_MS") {
            let parsed = ms
                .parse()
                .map_err(|_| ConfigError::InvalidValue("NUTRI_AUTOSAVE_MS", ms.clone()))?;
            autosave_ms = ConfigValue::new(parsed, ConfigSource::Environment);
        }

        Ok(Self {
            data_dir,
            server_url,
            user_id,
            autosave_ms,
            api_key,
            config_file,
        })
    }

    /// True when an API key is available for the remote server
    pub fn is_signed_in(&self) -> bool {
        self.api_key.is_some()
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/nutrisync/
    /// - macOS: ~/Library/Application Support/nutrisync/
    /// - Windows: %APPDATA%/nutrisync/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nutrisync")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/nutrisync/
    /// - macOS: ~/Library/Application Support/nutrisync/
    /// - Windows: %APPDATA%/nutrisync/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nutrisync")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidValue(name, value) => {
                write!(f, "Invalid value for {}: '{}'", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
