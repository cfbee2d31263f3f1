//! Engine configuration loaded from the environment

use std::env;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::migrations::definitions::MigrationConfig;
use crate::store::{is_valid_table_name, redact_url, Backend};

pub const DEFAULT_MIGRATIONS_DIR: &str = "./migrations";
pub const DEFAULT_MIGRATIONS_TABLE: &str = "schema_migrations";

/// Connection and layout settings for one engine invocation
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    pub database_url: Option<String>,
    pub migrations_dir: PathBuf,
    pub migrations_table: String,
    pub extension: String,
}

impl MigrateConfig {
    pub fn new() -> Self {
        Self {
            database_url: None,
            migrations_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
            migrations_table: DEFAULT_MIGRATIONS_TABLE.to_string(),
            extension: "sql".to_string(),
        }
    }

    /// Load configuration from `DATABASE_URL`, `MIGRATIONS_DIR` and
    /// `MIGRATIONS_TABLE`. Empty values count as unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();

        config.database_url = non_empty_var("DATABASE_URL");

        if let Some(dir) = non_empty_var("MIGRATIONS_DIR") {
            config.migrations_dir = PathBuf::from(dir);
        }

        if let Some(table) = non_empty_var("MIGRATIONS_TABLE") {
            config.migrations_table = table;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration before any engine operation runs
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self
            .database_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "database_url".to_string(),
                hint: "Set DATABASE_URL or pass --database-url".to_string(),
            })?;

        if Backend::from_url(url).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "database_url".to_string(),
                value: redact_url(url),
                expected: "a postgres://, postgresql:// or sqlite: URL".to_string(),
            });
        }

        if !is_valid_table_name(&self.migrations_table) {
            return Err(ConfigError::InvalidValue {
                field: "migrations_table".to_string(),
                value: self.migrations_table.clone(),
                expected: "a plain SQL identifier ([A-Za-z_][A-Za-z0-9_]*)".to_string(),
            });
        }

        if self.extension.is_empty() || self.extension.contains('.') {
            return Err(ConfigError::InvalidValue {
                field: "extension".to_string(),
                value: self.extension.clone(),
                expected: "a file extension without dots, e.g. sql".to_string(),
            });
        }

        Ok(())
    }

    /// The database URL, once validated
    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "database_url".to_string(),
                hint: "Set DATABASE_URL or pass --database-url".to_string(),
            })
    }

    /// Settings handed to the migration manager
    pub fn migration_config(&self) -> MigrationConfig {
        MigrationConfig {
            migrations_dir: self.migrations_dir.clone(),
            extension: self.extension.clone(),
        }
    }
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
