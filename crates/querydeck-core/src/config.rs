//! Configuration loading and typed config structures for querydeck.
//!
//! Two layers of configuration exist:
//!
//! - The **service config** (`querydeck-config.yaml`) holds server,
//!   logging, and connection settings plus the location of the definition
//!   directories. Every field has a default.
//! - The **definition directories** under `config_dir` hold one entity per
//!   file: `db/` for data sources, `query/` for queries, and
//!   `dataselector/` for consumers. Files ending in `.json` are parsed as
//!   JSON and `.yaml`/`.yml` as YAML; anything else is ignored.
//!
//! An unreadable directory aborts the load. A malformed file only skips
//! that one entity: the problem is logged and recorded in
//! [`Definitions::diagnostics`] and loading carries on.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::error::EntityKind;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a file or directory.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The path being read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse a JSON file.
    #[error("failed to parse {}: {source}", path.display())]
    Json {
        /// The offending file.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// Failed to parse a YAML file.
    #[error("failed to parse {}: {source}", path.display())]
    Yaml {
        /// The offending file.
        path: PathBuf,
        /// The underlying YAML error.
        source: serde_yml::Error,
    },

    /// A data source declared a `db_type` with no driver.
    #[error("data source `{name}` has unsupported db_type `{db_type}`")]
    UnsupportedDatabase {
        /// The data source name.
        name: String,
        /// The declared type.
        db_type: String,
    },

    /// A rule declared a `rule_type` that is not registered.
    #[error("unknown rule type `{0}`")]
    UnknownRuleKind(String),

    /// A rule's fields do not fit its kind.
    #[error("invalid {kind} rule: {message}")]
    InvalidRule {
        /// The rule kind being built, empty if it could not be read.
        kind: String,
        /// What was wrong.
        message: String,
    },

    /// A row filter pattern did not compile.
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The pattern text.
        pattern: String,
        /// The underlying regex error.
        source: regex::Error,
    },

    /// A consumer's rule list could not be built.
    #[error("dataselector `{name}`: {source}")]
    Consumer {
        /// The consumer name.
        name: String,
        /// The rule error.
        source: Box<ConfigError>,
    },

    /// A consumer referenced a query that does not exist.
    #[error("dataselector `{consumer}` references unknown query `{query}`")]
    UnknownQuery {
        /// The consumer name.
        consumer: String,
        /// The missing query name.
        query: String,
    },

    /// Two definitions of the same kind share a name.
    #[error("duplicate {kind} `{name}`, keeping the first definition")]
    Duplicate {
        /// The kind of entity.
        kind: EntityKind,
        /// The repeated name.
        name: String,
    },
}

// ---------------------------------------------------------------------------
// Service config
// ---------------------------------------------------------------------------

/// Top-level service configuration.
///
/// Mirrors `querydeck-config.yaml`. All fields have defaults so an empty
/// or missing file yields a working configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Directory holding the `db/`, `query/`, and `dataselector/` folders.
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Connection settings shared by all data sources.
    #[serde(default)]
    pub database: DatabaseSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            config_dir: default_config_dir(),
            logging: LoggingSettings::default(),
            database: DatabaseSettings::default(),
        }
    }
}

impl ServiceConfig {
    /// Load the service configuration from a YAML file.
    ///
    /// Environment variables override file values:
    /// - `QUERYDECK_PORT` overrides `server.port`
    /// - `QUERYDECK_CONFIG_DIR` overrides `config_dir`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse_at(&contents, path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse the service configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Self::parse_at(yaml, Path::new("<inline>"))
    }

    fn parse_at(yaml: &str, path: &Path) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yml::from_str(yaml).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `QUERYDECK_PORT` and `QUERYDECK_CONFIG_DIR` on top of the
    /// current values. Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(port) = std::env::var("QUERYDECK_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.server.port = port;
        }
        if let Ok(dir) = std::env::var("QUERYDECK_CONFIG_DIR") {
            self.config_dir = PathBuf::from(dir);
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSettings {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Connection settings shared by every data source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseSettings {
    /// Maximum connections per data source.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Seconds to wait for a connection before failing a fetch.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// Supported data source drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbKind {
    /// `PostgreSQL`.
    Postgres,
    /// `MySQL` / `MariaDB`.
    MySql,
}

/// A data source definition from `db/`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct DataSourceConfig {
    /// Unique name that queries refer to.
    pub name: String,
    /// Driver name: `postgres` or `mysql`.
    pub db_type: String,
    /// Server host.
    #[serde(default)]
    pub host: String,
    /// Server port; the driver default when omitted.
    #[serde(default)]
    pub port: Option<u16>,
    /// Database name.
    #[serde(default)]
    pub db_name: String,
    /// Login user.
    #[serde(default)]
    pub username: String,
    /// Login password.
    #[serde(default)]
    pub password: String,
    /// Full connection URL; overrides the individual fields when set.
    #[serde(default)]
    pub url: Option<String>,
}

impl DataSourceConfig {
    /// Resolve `db_type` to a supported driver.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedDatabase`] for any other value.
    pub fn kind(&self) -> Result<DbKind, ConfigError> {
        match self.db_type.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(DbKind::Postgres),
            "mysql" | "mariadb" => Ok(DbKind::MySql),
            _ => Err(ConfigError::UnsupportedDatabase {
                name: self.name.clone(),
                db_type: self.db_type.clone(),
            }),
        }
    }
}

impl fmt::Debug for DataSourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceConfig")
            .field("name", &self.name)
            .field("db_type", &self.db_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db_name", &self.db_name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A query definition from `query/`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryConfig {
    /// Unique logical name.
    pub name: String,
    /// Data source to run against.
    pub database_name: String,
    /// Query text.
    pub query_string: String,
    /// Refresh interval in seconds; omitted means fetch once.
    #[serde(default)]
    pub refresh_time: Option<u64>,
    /// Column names applied to fetched rows.
    #[serde(default)]
    pub column_list: Vec<String>,
    /// Decorative row labels.
    #[serde(default)]
    pub row_list: Vec<String>,
}

/// A consumer definition from `dataselector/`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConsumerConfig {
    /// Unique logical name.
    pub name: String,
    /// Query the consumer reads.
    pub query_name: String,
    /// Raw rule objects, each carrying a `rule_type`.
    #[serde(default)]
    pub rules: Vec<serde_json::Value>,
}

/// Everything loaded from the definition directories.
#[derive(Debug, Default)]
pub struct Definitions {
    /// Data source definitions with a supported driver.
    pub data_sources: Vec<DataSourceConfig>,
    /// Query definitions.
    pub queries: Vec<QueryConfig>,
    /// Consumer definitions.
    pub consumers: Vec<ConsumerConfig>,
    /// Problems that caused individual files to be skipped.
    pub diagnostics: Vec<ConfigError>,
}

/// Load all definitions under `config_dir`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if any of the three definition directories
/// cannot be listed. Per-file problems are collected in
/// [`Definitions::diagnostics`] instead.
pub fn load_definitions(config_dir: &Path) -> Result<Definitions, ConfigError> {
    let mut diagnostics = Vec::new();

    let data_sources = load_dir::<DataSourceConfig>(&config_dir.join("db"), &mut diagnostics)?
        .into_iter()
        .filter_map(|ds| match ds.kind() {
            Ok(_) => Some(ds),
            Err(e) => {
                warn!(error = %e, "skipping data source");
                diagnostics.push(e);
                None
            }
        })
        .collect::<Vec<_>>();
    let queries = load_dir::<QueryConfig>(&config_dir.join("query"), &mut diagnostics)?;
    let consumers = load_dir::<ConsumerConfig>(&config_dir.join("dataselector"), &mut diagnostics)?;

    info!(
        dir = %config_dir.display(),
        data_sources = data_sources.len(),
        queries = queries.len(),
        dataselectors = consumers.len(),
        skipped = diagnostics.len(),
        "Definitions loaded"
    );

    Ok(Definitions {
        data_sources,
        queries,
        consumers,
        diagnostics,
    })
}

/// Parse every definition file in `dir`, in file-name order.
fn load_dir<T: DeserializeOwned>(
    dir: &Path,
    diagnostics: &mut Vec<ConfigError>,
) -> Result<Vec<T>, ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = std::fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    paths.sort();

    let mut loaded = Vec::new();
    for path in paths.iter().filter(|p| p.is_file()) {
        match parse_file::<T>(path) {
            Ok(Some(value)) => loaded.push(value),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "skipping definition file");
                diagnostics.push(e);
            }
        }
    }
    Ok(loaded)
}

/// Parse one definition file, or `None` if its extension is not recognized.
fn parse_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ConfigError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let Some(ext) = ext.filter(|e| matches!(e.as_str(), "json" | "yaml" | "yml")) else {
        return Ok(None);
    };

    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let value = if ext == "json" {
        serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        serde_yml::from_str(&contents).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?
    };
    Ok(Some(value))
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("./cfg")
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    9999
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_max_connections() -> u32 {
    5
}

const fn default_connect_timeout_secs() -> u64 {
    5
}
