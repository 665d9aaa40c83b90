//! Server configuration.

use crate::coordinator::{DEFAULT_SESSION_ID_ATTEMPTS, DEFAULT_SESSION_ID_LENGTH};
use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Environment variable that overrides the database path.
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";

/// Configuration for the game server.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    port: u16,

    /// SQLite database file.
    #[serde(default = "default_database_path")]
    database_path: String,

    /// Length of shareable session ids.
    #[serde(default = "default_session_id_length")]
    session_id_length: usize,

    /// Attempts to find an unused session id before giving up.
    #[serde(default = "default_session_id_attempts")]
    session_id_attempts: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_database_path() -> String {
    "strictly_bulls.db".to_string()
}

fn default_session_id_length() -> usize {
    DEFAULT_SESSION_ID_LENGTH
}

fn default_session_id_attempts() -> usize {
    DEFAULT_SESSION_ID_ATTEMPTS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_path: default_database_path(),
            session_id_length: default_session_id_length(),
            session_id_attempts: default_session_id_attempts(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text. Missing keys take defaults.
    #[instrument(skip(content))]
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        info!(host = %config.host, port = config.port, "Config loaded successfully");
        Ok(config)
    }

    /// Loads the file if given, otherwise defaults, then applies
    /// `DATABASE_URL` from the environment.
    #[instrument]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    /// Applies environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(DATABASE_URL_VAR)
            && !url.trim().is_empty()
        {
            debug!(database = %url, "Database path taken from environment");
            self.database_path = url;
        }
        self
    }

    /// Overrides the bind address.
    pub fn with_host(mut self, host: String) -> Self {
        self.host = host;
        self
    }

    /// Overrides the bind port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Overrides the database path.
    pub fn with_database_path(mut self, database_path: String) -> Self {
        self.database_path = database_path;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session_id_length < 4 {
            return Err(ConfigError::new(format!(
                "session_id_length must be at least 4, got {}",
                self.session_id_length
            )));
        }
        if self.session_id_attempts == 0 {
            return Err(ConfigError::new(
                "session_id_attempts must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
