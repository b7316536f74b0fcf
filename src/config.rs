//! Configuration management for spanner-sql.
//!
//! Handles database names, per-connection settings, and loading named
//! connections from a TOML file. Configuration is always an explicit value
//! handed to [`crate::connection::Connection::open`]; nothing here is global.

use crate::error::{Result, SpannerError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

/// Production REST endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://spanner.googleapis.com";

/// Fully qualified database name:
/// `projects/<project>/instances/<instance>/databases/<database>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatabaseName {
    pub project: String,
    pub instance: String,
    pub database: String,
}

impl DatabaseName {
    /// Creates a database name from its three identifiers.
    pub fn new(
        project: impl Into<String>,
        instance: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            instance: instance.into(),
            database: database.into(),
        }
    }

    /// Parses `projects/<p>/instances/<i>/databases/<d>`.
    pub fn parse(name: &str) -> Result<Self> {
        let parts: Vec<&str> = name.trim().split('/').collect();
        match parts.as_slice() {
            ["projects", project, "instances", instance, "databases", database]
                if !project.is_empty() && !instance.is_empty() && !database.is_empty() =>
            {
                Ok(Self::new(*project, *instance, *database))
            }
            _ => Err(SpannerError::config(format!(
                "Invalid database name '{name}'. Expected \
                 projects/<project>/instances/<instance>/databases/<database>"
            ))),
        }
    }

    /// Returns `projects/<p>/instances/<i>`.
    pub fn instance_path(&self) -> String {
        format!("projects/{}/instances/{}", self.project, self.instance)
    }
}

impl fmt::Display for DatabaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/instances/{}/databases/{}",
            self.project, self.instance, self.database
        )
    }
}

impl FromStr for DatabaseName {
    type Err = SpannerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Main configuration structure: named connections.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Named database connections.
    #[serde(default)]
    pub connections: HashMap<String, ConnectionConfig>,
}

/// Settings for one database connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionConfig {
    /// Database name (`projects/.../instances/.../databases/...`).
    pub database: Option<String>,

    /// REST address of a local emulator (`host:port`). Takes precedence over `endpoint`.
    pub emulator_host: Option<String>,

    /// REST endpoint override, e.g. a regional endpoint.
    pub endpoint: Option<String>,

    /// OAuth2 bearer token. Not needed for the emulator.
    pub access_token: Option<String>,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts for aborted transactions and transient connect failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between schema-update operation polls, in milliseconds.
    #[serde(default = "default_ddl_poll_interval_ms")]
    pub ddl_poll_interval_ms: u64,

    /// Give up waiting for a schema update after this many seconds.
    #[serde(default = "default_ddl_timeout_secs")]
    pub ddl_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_ddl_poll_interval_ms() -> u64 {
    500
}

fn default_ddl_timeout_secs() -> u64 {
    600
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            database: None,
            emulator_host: None,
            endpoint: None,
            access_token: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            ddl_poll_interval_ms: default_ddl_poll_interval_ms(),
            ddl_timeout_secs: default_ddl_timeout_secs(),
        }
    }
}

impl ConnectionConfig {
    /// Creates a config for the given database with default settings.
    pub fn new(database: &DatabaseName) -> Self {
        Self {
            database: Some(database.to_string()),
            ..Default::default()
        }
    }

    /// Routes requests to an emulator's REST address.
    pub fn with_emulator_host(mut self, host: impl Into<String>) -> Self {
        self.emulator_host = Some(host.into());
        self
    }

    /// Sets the bearer token sent with every request.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Returns the parsed database name.
    pub fn database_name(&self) -> Result<DatabaseName> {
        let name = self
            .database
            .as_deref()
            .ok_or_else(|| SpannerError::config("Database name is required"))?;
        DatabaseName::parse(name)
    }

    /// Returns the REST API base URL, ending in `/v1`.
    pub fn base_url(&self) -> Result<String> {
        let root = match (&self.emulator_host, &self.endpoint) {
            (Some(host), _) => format!("http://{}", host.trim_end_matches('/')),
            (None, Some(endpoint)) => endpoint.trim_end_matches('/').to_string(),
            (None, None) => DEFAULT_ENDPOINT.to_string(),
        };

        let url = Url::parse(&root)
            .map_err(|e| SpannerError::config(format!("Invalid endpoint '{root}': {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SpannerError::config(format!(
                "Invalid scheme '{}'. Expected 'http' or 'https'",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(SpannerError::config(format!("Endpoint '{root}' has no host")));
        }

        Ok(format!("{root}/v1"))
    }

    /// Returns true if requests go to an emulator.
    pub fn uses_emulator(&self) -> bool {
        self.emulator_host.is_some()
    }

    /// Merges another config into this one, with the other taking precedence.
    pub fn merge(&mut self, other: &ConnectionConfig) {
        if other.database.is_some() {
            self.database = other.database.clone();
        }
        if other.emulator_host.is_some() {
            self.emulator_host = other.emulator_host.clone();
        }
        if other.endpoint.is_some() {
            self.endpoint = other.endpoint.clone();
        }
        if other.access_token.is_some() {
            self.access_token = other.access_token.clone();
        }
        if other.timeout_secs != default_timeout_secs() {
            self.timeout_secs = other.timeout_secs;
        }
        if other.max_retries != default_max_retries() {
            self.max_retries = other.max_retries;
        }
        if other.ddl_poll_interval_ms != default_ddl_poll_interval_ms() {
            self.ddl_poll_interval_ms = other.ddl_poll_interval_ms;
        }
        if other.ddl_timeout_secs != default_ddl_timeout_secs() {
            self.ddl_timeout_secs = other.ddl_timeout_secs;
        }
    }

    /// Applies `SPANNER_DATABASE`, `SPANNER_EMULATOR_REST_HOST` and
    /// `SPANNER_ACCESS_TOKEN` to fields that are still unset.
    pub fn apply_env_defaults(&mut self) {
        self.apply_defaults_from(|key| std::env::var(key).ok());
    }

    fn apply_defaults_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.database.is_none() {
            self.database = lookup("SPANNER_DATABASE");
        }
        if self.emulator_host.is_none() {
            self.emulator_host = lookup("SPANNER_EMULATOR_REST_HOST");
        }
        if self.access_token.is_none() {
            self.access_token = lookup("SPANNER_ACCESS_TOKEN");
        }
    }

    /// Returns a display-safe string (no token) for logs and CLI output.
    pub fn display_string(&self) -> String {
        let database = self.database.as_deref().unwrap_or("unknown");
        match &self.emulator_host {
            Some(host) => format!("{database} @ emulator {host}"),
            None => {
                let endpoint = self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
                format!("{database} @ {endpoint}")
            }
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("spanner-sql")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields the default config.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| SpannerError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            SpannerError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Gets a named connection, or the default connection if name is None.
    pub fn get_connection(&self, name: Option<&str>) -> Option<&ConnectionConfig> {
        let key = name.unwrap_or("default");
        self.connections.get(key)
    }
}
