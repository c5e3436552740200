//! Configuration loading and constants.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then `DB_*` environment variables. `AppConfig` is the root configuration
//! struct containing all settings.

use const_format::formatcp;
use serde::Deserialize;
use std::path::Path;

// =============================================================================
// Database Constants
// =============================================================================

/// MySQL port. Not configurable.
pub const DB_PORT: u16 = 3306;

/// The only table the lookups read from.
pub const FRUIT_TABLE: &str = "fruit";

pub const DEFAULT_DB_HOST: &str = "db";
pub const DEFAULT_DB_USER: &str = "app";
pub const DEFAULT_DB_PASS: &str = "apppass";
pub const DEFAULT_DB_NAME: &str = "demo";

/// Environment variables that override the `[database]` section
pub const ENV_DB_HOST: &str = "DB_HOST";
pub const ENV_DB_USER: &str = "DB_USER";
pub const ENV_DB_PASS: &str = "DB_PASS";
pub const ENV_DB_NAME: &str = "DB_NAME";

// =============================================================================
// HTTP Constants
// =============================================================================

pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default listen address, used in CLI help and logs
pub const DEFAULT_LISTEN_ADDR: &str = formatcp!("{}:{}", DEFAULT_HTTP_HOST, DEFAULT_HTTP_PORT);

/// Lookup responses reflect live table contents and must not be cached
pub const CACHE_CONTROL_LOOKUP: &str = "no-store";

/// Seconds to wait for in-flight requests after a shutdown signal
pub const SHUTDOWN_GRACE_SECS: u64 = 30;

// =============================================================================
// Logging Constants
// =============================================================================

/// Default log filter when neither --log-level nor RUST_LOG is set
pub const DEFAULT_LOG_FILTER: &str = "identlab=debug,sqlx=warn";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub http: HttpServerConfig,
    /// MySQL connection settings
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "HttpServerConfig::default_host")]
    pub host: String,
    #[serde(default = "HttpServerConfig::default_port")]
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

impl HttpServerConfig {
    fn default_host() -> String {
        DEFAULT_HTTP_HOST.to_string()
    }

    fn default_port() -> u16 {
        DEFAULT_HTTP_PORT
    }
}

/// MySQL connection settings
#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "DatabaseConfig::default_host")]
    pub host: String,
    #[serde(default = "DatabaseConfig::default_user")]
    pub user: String,
    #[serde(default = "DatabaseConfig::default_password")]
    pub password: String,
    /// Database (schema) name
    #[serde(default = "DatabaseConfig::default_name")]
    pub name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            user: Self::default_user(),
            password: Self::default_password(),
            name: Self::default_name(),
        }
    }
}

// Keeps the password out of `{:?}` output
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"***")
            .field("name", &self.name)
            .finish()
    }
}

impl DatabaseConfig {
    fn default_host() -> String {
        DEFAULT_DB_HOST.to_string()
    }

    fn default_user() -> String {
        DEFAULT_DB_USER.to_string()
    }

    fn default_password() -> String {
        DEFAULT_DB_PASS.to_string()
    }

    fn default_name() -> String {
        DEFAULT_DB_NAME.to_string()
    }

    /// Render a driver-style connection descriptor for logs.
    ///
    /// The password is always redacted. `interpolate` appends the
    /// `interpolateParams` flag, mirroring the client-side parameter mode.
    pub fn dsn(&self, interpolate: bool) -> String {
        let mut extra = String::from("parseTime=true");
        if interpolate {
            extra.push_str("&interpolateParams=true");
        }
        format!(
            "{}:***@tcp({}:{})/{}?{}",
            self.user, self.host, DB_PORT, self.name, extra
        )
    }

    /// Apply overrides from a variable lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(host) = get(ENV_DB_HOST) {
            self.host = host;
        }
        if let Some(user) = get(ENV_DB_USER) {
            self.user = user;
        }
        if let Some(password) = get(ENV_DB_PASS) {
            self.password = password;
        }
        if let Some(name) = get(ENV_DB_NAME) {
            self.name = name;
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }

    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file, then apply `DB_*`
    /// overrides from the process environment.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::load`] with an explicit variable lookup.
    pub fn load_with<P, F>(path: Option<P>, lookup: F) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)?;
                toml::from_str(&contents)?
            }
            None => AppConfig::default(),
        };

        config.database.apply_overrides(lookup);
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.host.trim().is_empty() {
            return Err(ConfigError::Validation(
                "database.host must not be empty".to_string(),
            ));
        }
        if self.database.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "database.name must not be empty".to_string(),
            ));
        }
        match self.logging.format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(ConfigError::Validation(format!(
                "logging.format must be \"text\" or \"json\", got \"{other}\""
            ))),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}
