//! Migration Manager - File system operations for migrations
//!
//! Handles creating, loading, and parsing migration files. Every call
//! re-reads the source; nothing is cached between operations.

use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use super::definitions::{MigrationConfig, MigrationDefinition, DOWN_MARKER, UP_MARKER};
use super::parser::{next_version, parse_definition, sanitize_name};
use super::source::{DirectorySource, MigrationSource};
use crate::error::{MigrationError, MigrationResult};

/// Migration manager for creating and loading migrations
pub struct MigrationManager {
    config: MigrationConfig,
    source: Box<dyn MigrationSource>,
}

impl MigrationManager {
    /// Create a new migration manager with default configuration
    pub fn new() -> Self {
        Self::with_config(MigrationConfig::default())
    }

    /// Create a migration manager reading from `config.migrations_dir`
    pub fn with_config(config: MigrationConfig) -> Self {
        let source = DirectorySource::new(config.migrations_dir.clone());
        Self::with_source(config, source)
    }

    /// Create a migration manager over any source
    pub fn with_source(config: MigrationConfig, source: impl MigrationSource + 'static) -> Self {
        Self {
            config,
            source: Box::new(source),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Load, parse and order every migration in the source.
    ///
    /// Any malformed file aborts the whole load, as does a version that
    /// appears in two files.
    pub fn load_migrations(&self) -> MigrationResult<Vec<MigrationDefinition>> {
        let raws = self.source.load(&self.config.extension)?;

        let mut migrations = raws
            .iter()
            .map(|raw| parse_definition(raw, &self.config.extension))
            .collect::<MigrationResult<Vec<_>>>()?;

        migrations.sort_by(|a, b| a.version.cmp(&b.version));

        if let Some(pair) = migrations.windows(2).find(|w| w[0].version == w[1].version) {
            return Err(MigrationError::DuplicateVersion {
                version: pair[0].version.clone(),
                first: pair[0].source.clone(),
                second: pair[1].source.clone(),
            });
        }

        tracing::debug!(
            source = %self.source.describe(),
            count = migrations.len(),
            "Loaded migration definitions"
        );

        Ok(migrations)
    }

    /// The version a newly created migration would get
    pub fn next_version(&self) -> MigrationResult<String> {
        if !self.source.exists()? {
            return next_version(None);
        }

        let migrations = self.load_migrations()?;
        next_version(migrations.last().map(|m| m.version.as_str()))
    }

    /// Create a new migration file and return its path.
    ///
    /// The version is allocated before anything touches the disk, and an
    /// existing file is never overwritten.
    pub fn create_migration(&self, name: &str) -> MigrationResult<PathBuf> {
        let version = self.next_version()?;

        let slug = sanitize_name(name);
        if slug.is_empty() {
            return Err(MigrationError::InvalidName {
                name: name.to_string(),
            });
        }

        let dir = &self.config.migrations_dir;
        fs::create_dir_all(dir).map_err(|e| MigrationError::io(dir, e))?;

        let filename = format!("{}_{}.{}", version, slug, self.config.extension);
        let filepath = dir.join(&filename);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&filepath)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => MigrationError::AlreadyExists {
                    path: filepath.clone(),
                },
                _ => MigrationError::io(&filepath, e),
            })?;

        file.write_all(self.create_migration_template(name).as_bytes())
            .map_err(|e| MigrationError::io(&filepath, e))?;

        tracing::info!(version = %version, file = %filepath.display(), "Created migration");
        Ok(filepath)
    }

    /// Create migration template content
    fn create_migration_template(&self, name: &str) -> String {
        format!(
            "-- Migration: {}\n\
             -- Created: {}\n\n\
             -- {}\n\n\n\
             -- {}\n\n",
            name,
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            UP_MARKER,
            DOWN_MARKER
        )
    }
}

impl Default for MigrationManager {
    fn default() -> Self {
        Self::new()
    }
}
