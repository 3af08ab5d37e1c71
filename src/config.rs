//! Configuration management for the native bridge host
//!
//! Separates host startup configuration (sandbox roots, listener, key
//! material) from the app constants that the configuration module hands to
//! the JS layer.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Complete host configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HostConfig {
    // ═══ LISTENER (Environment Override Supported) ═══
    /// IP address the bridge channel binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port of the bridge channel
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum concurrently connected JS hosts
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,

    /// Longest accepted request line in bytes (blob payloads travel base64 encoded)
    #[serde(default = "default_max_request_length")]
    pub max_request_length: usize,

    // ═══ SANDBOX ═══
    /// App-private files root
    #[serde(default = "default_files_dir")]
    pub files_dir: String,

    /// Cache root
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    // ═══ ENCRYPTION ═══
    /// Initial state of the file encryption flag
    #[serde(default)]
    pub encryption_enabled: bool,

    /// Paths containing any of these markers are always stored in plain text
    #[serde(default = "default_unencrypted_path_markers")]
    pub unencrypted_path_markers: Vec<String>,

    /// Location of the 32-byte master key (created on first start)
    #[serde(default = "default_master_key_path")]
    pub master_key_path: String,

    // ═══ PREFERENCES ═══
    /// Backing file of the developer preference store
    #[serde(default = "default_preferences_path")]
    pub preferences_path: String,

    #[serde(default)]
    pub app: AppConfig,
}

/// Constants exposed by the configuration module
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Runtime base URL; normalized before it is handed out
    #[serde(default)]
    pub runtime_url: Option<String>,

    /// Should stay unset for anything but sample apps
    #[serde(default)]
    pub app_name: Option<String>,

    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// Deprecated, still exposed for older clients
    #[serde(default = "default_files_directory_name")]
    pub files_directory_name: String,

    #[serde(default)]
    pub warnings_filter: WarningsFilter,

    #[serde(default)]
    pub developer_app: bool,
}

/// How loudly developer warnings are surfaced
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WarningsFilter {
    #[default]
    All,
    Partial,
    None,
}

impl fmt::Display for WarningsFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            WarningsFilter::All => "all",
            WarningsFilter::Partial => "partial",
            WarningsFilter::None => "none",
        };
        f.write_str(level)
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8087
}

fn default_max_clients() -> usize {
    4
}

fn default_max_request_length() -> usize {
    64 * 1024 * 1024
}

fn default_files_dir() -> String {
    "./bridge_data/files".to_string()
}

fn default_cache_dir() -> String {
    "./bridge_data/cache".to_string()
}

fn default_unencrypted_path_markers() -> Vec<String> {
    vec!["GUID".to_string()]
}

fn default_master_key_path() -> String {
    "./bridge_data/master.key".to_string()
}

fn default_preferences_path() -> String {
    "./bridge_data/preferences.json".to_string()
}

fn default_database_name() -> String {
    "default".to_string()
}

fn default_files_directory_name() -> String {
    "files/default".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            runtime_url: None,
            app_name: None,
            database_name: default_database_name(),
            files_directory_name: default_files_directory_name(),
            warnings_filter: WarningsFilter::default(),
            developer_app: false,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            max_clients: default_max_clients(),
            max_request_length: default_max_request_length(),
            files_dir: default_files_dir(),
            cache_dir: default_cache_dir(),
            encryption_enabled: false,
            unencrypted_path_markers: default_unencrypted_path_markers(),
            master_key_path: default_master_key_path(),
            preferences_path: default_preferences_path(),
            app: AppConfig::default(),
        }
    }
}

impl HostConfig {
    /// Load configuration from config.toml with environment overrides
    ///
    /// A missing file is fine; every key has a default. Environment keys use
    /// the `BRIDGE_` prefix and `__` between nested keys, for example
    /// `BRIDGE_APP__RUNTIME_URL`.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_paths = [
            "hybrid-native-bridge/config", // packaged layout
            "config",                      // local development: ./config.toml
        ];

        let mut builder = Config::builder();
        for config_path in config_paths {
            builder = builder.add_source(File::with_name(config_path).required(false));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("BRIDGE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: HostConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.port == 0 {
            return Err(config::ConfigError::Message("port cannot be 0".into()));
        }

        if self.max_clients == 0 {
            return Err(config::ConfigError::Message(
                "max_clients must be greater than 0".into(),
            ));
        }

        if self.files_dir.is_empty() || self.cache_dir.is_empty() {
            return Err(config::ConfigError::Message(
                "files_dir and cache_dir cannot be empty".into(),
            ));
        }

        if self.master_key_path.is_empty() {
            return Err(config::ConfigError::Message(
                "master_key_path cannot be empty".into(),
            ));
        }

        Ok(())
    }

    /// Get bind address and port as socket address
    pub fn listen_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn files_root(&self) -> PathBuf {
        PathBuf::from(&self.files_dir)
    }

    pub fn cache_root(&self) -> PathBuf {
        PathBuf::from(&self.cache_dir)
    }
}
