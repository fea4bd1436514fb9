//! Reader configuration.
//!
//! Loaded from a TOML file; every setting has a default so an empty file (or
//! no file) is valid. The CLI layers its own flags and environment variables
//! on top via [`ReaderConfig::apply_overrides`].
//!
//! ```toml
//! query_batch_size = 20000
//!
//! [warehouse]
//! connection = "postgres://megalista@warehouse/analytics"
//! dialect = "postgres"
//!
//! [logging]
//! filter = "error,megalista_reader=info"
//! format = "json"
//! ```

use std::num::NonZeroU32;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ReaderError;
use crate::reader::DEFAULT_QUERY_BATCH_SIZE;
use crate::sql::Dialect;

/// Default log filter: errors from everything, info from this crate.
pub const DEFAULT_LOG_FILTER: &str = "error,megalista_reader=info";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderConfig {
    /// Rows fetched from the warehouse per round trip.
    ///
    /// Purely a memory/latency trade-off; the set and order of emitted rows
    /// is the same for every value. Must be positive.
    pub query_batch_size: NonZeroU32,

    pub warehouse: WarehouseConfig,

    pub logging: LoggingConfig,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            query_batch_size: DEFAULT_QUERY_BATCH_SIZE,
            warehouse: WarehouseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WarehouseConfig {
    /// PostgreSQL connection string or URL. Credentials come from the
    /// environment the reader runs in, never from execution descriptors.
    pub connection: Option<String>,

    /// Quoting used for table paths (`bigquery` or `postgres`). Unset means
    /// the client's own dialect.
    pub dialect: Option<Dialect>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: DEFAULT_LOG_FILTER.to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub query_batch_size: Option<u32>,
    pub connection: Option<String>,
    pub log_filter: Option<String>,
    pub log_format: Option<LogFormat>,
}

impl ReaderConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ReaderError> {
        let config: ReaderConfig =
            toml::from_str(s).map_err(|e| ReaderError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ReaderError> {
        let text = std::fs::read_to_string(path).map_err(|source| ReaderError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Overrides win over file values.
    pub fn apply_overrides(mut self, overrides: ConfigOverrides) -> Result<Self, ReaderError> {
        if let Some(size) = overrides.query_batch_size {
            self.query_batch_size = NonZeroU32::new(size).ok_or_else(|| {
                ReaderError::InvalidConfig("query_batch_size must be positive".into())
            })?;
        }
        if let Some(connection) = overrides.connection {
            self.warehouse.connection = Some(connection);
        }
        if let Some(filter) = overrides.log_filter {
            self.logging.filter = filter;
        }
        if let Some(format) = overrides.log_format {
            self.logging.format = format;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ReaderError> {
        if let Some(connection) = &self.warehouse.connection {
            if connection.trim().is_empty() {
                return Err(ReaderError::InvalidConfig(
                    "warehouse.connection must not be empty".into(),
                ));
            }
        }
        if self.logging.filter.trim().is_empty() {
            return Err(ReaderError::InvalidConfig(
                "logging.filter must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// The warehouse connection string, required to build the default client.
    pub fn connection(&self) -> Result<&str, ReaderError> {
        self.warehouse.connection.as_deref().ok_or_else(|| {
            ReaderError::InvalidConfig(
                "no warehouse connection configured (set warehouse.connection or MEGALISTA_WAREHOUSE_URL)"
                    .into(),
            )
        })
    }
}
