//! # Server Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TALLY_PORT=9090                                                    │
//! │     TALLY_DB_PATH=/var/lib/tally/tally.db                              │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     $TALLY_CONFIG, or                                                  │
//! │     ~/.config/tally-pos/server.toml (Linux)                            │
//! │     ~/Library/Application Support/com.tally.pos/server.toml (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [database]
//! path = "/var/lib/tally/tally.db"
//! max_connections = 5
//! max_write_retries = 3
//! allow_overpayment = true
//!
//! [reports]
//! top_customers = 10
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tally_core::report::DEFAULT_TOP_CUSTOMERS;
use tally_db::DbConfig;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for HttpSettings {
    fn default() -> Self {
        HttpSettings {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl HttpSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Optimistic concurrency retries for payments, returns and edits.
    #[serde(default = "default_max_write_retries")]
    pub max_write_retries: u32,

    /// Accept payments larger than the remaining balance.
    #[serde(default = "default_true")]
    pub allow_overpayment: bool,
}

fn default_max_connections() -> u32 {
    5
}

fn default_max_write_retries() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
            max_write_retries: default_max_write_retries(),
            allow_overpayment: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    /// How many customers the sales report ranks.
    #[serde(default = "default_top_customers")]
    pub top_customers: u32,
}

fn default_top_customers() -> u32 {
    DEFAULT_TOP_CUSTOMERS
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            top_customers: default_top_customers(),
        }
    }
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Complete server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub reports: ReportSettings,
}

impl ServerConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (server.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading server config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if !(1..=100).contains(&self.reports.top_customers) {
            return Err(ConfigError::Invalid(
                "reports.top_customers must be between 1 and 100".into(),
            ));
        }
        Ok(())
    }

    /// Applies `TALLY_*` overrides, reading values through `lookup`.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("TALLY_HOST") {
            self.server.host = host;
        }

        if let Some(port) = lookup("TALLY_PORT") {
            match port.parse::<u16>() {
                Ok(p) => self.server.port = p,
                Err(_) => warn!(port = %port, "Ignoring invalid TALLY_PORT"),
            }
        }

        if let Some(path) = lookup("TALLY_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(allow) = lookup("TALLY_ALLOW_OVERPAYMENT") {
            match parse_bool(&allow) {
                Some(b) => self.database.allow_overpayment = b,
                None => warn!(value = %allow, "Ignoring invalid TALLY_ALLOW_OVERPAYMENT"),
            }
        }

        if let Some(retries) = lookup("TALLY_MAX_WRITE_RETRIES") {
            match retries.parse::<u32>() {
                Ok(r) => self.database.max_write_retries = r,
                Err(_) => warn!(value = %retries, "Ignoring invalid TALLY_MAX_WRITE_RETRIES"),
            }
        }

        if let Some(top) = lookup("TALLY_TOP_CUSTOMERS") {
            match top.parse::<u32>() {
                Ok(n) => self.reports.top_customers = n,
                Err(_) => warn!(value = %top, "Ignoring invalid TALLY_TOP_CUSTOMERS"),
            }
        }
    }

    /// Resolves the database file, creating the data directory if needed.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }

        let dirs = directories::ProjectDirs::from("com", "tally", "pos").ok_or_else(|| {
            ConfigError::Invalid("Could not determine app data directory".into())
        })?;
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        Ok(data_dir.join("tally.db"))
    }

    /// Builds the pool configuration for `path`.
    pub fn db_config(&self, path: PathBuf) -> DbConfig {
        DbConfig::new(path)
            .max_connections(self.database.max_connections)
            .max_write_retries(self.database.max_write_retries)
            .allow_overpayment(self.database.allow_overpayment)
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tally", "pos")
            .map(|dirs| dirs.config_dir().join("server.toml"))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
