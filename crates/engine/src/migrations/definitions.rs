//! Migration Definitions - Core types and structures for migrations
//!
//! Defines the fundamental types used throughout the migration system including
//! MigrationDefinition, LedgerEntry, MigrationConfig and the reports returned by
//! the runner.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Marker line that starts the forward (UP) section of a migration file
pub const UP_MARKER: &str = "==== UP ====";

/// Marker line that starts the backward (DOWN) section of a migration file
pub const DOWN_MARKER: &str = "==== DOWN ====";

/// Width new versions are zero-padded to
pub const VERSION_WIDTH: usize = 3;

/// A parsed migration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationDefinition {
    /// Zero-padded numeric version, the ordering key
    pub version: String,
    /// Slug taken from the filename
    pub name: String,
    /// SQL applied by `up`; empty means nothing to execute
    pub forward_body: String,
    /// SQL applied by `down`; empty means rollback is unsupported
    pub backward_body: String,
    /// Where the definition came from (a path for directory sources)
    pub source: String,
}

impl MigrationDefinition {
    /// Whether this definition can be rolled back
    pub fn is_reversible(&self) -> bool {
        !self.backward_body.is_empty()
    }

    /// `<version>_<name>`, the label used in reports
    pub fn label(&self) -> String {
        format!("{}_{}", self.version, self.name)
    }
}

/// An applied migration as recorded in the ledger table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub version: String,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// Configuration for the migration system
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Directory where migration files are stored
    pub migrations_dir: PathBuf,
    /// File extension (without the dot) that marks a migration file
    pub extension: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            extension: "sql".to_string(),
        }
    }
}

/// Result of running migrations
#[derive(Debug, Clone, Default)]
pub struct MigrationRunResult {
    /// Number of definitions found in the source
    pub discovered_count: usize,
    /// Definitions applied by this run, in order
    pub applied: Vec<MigrationDefinition>,
    /// Number of definitions skipped because they were already applied
    pub skipped_count: usize,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl MigrationRunResult {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    /// True when the source held no definitions at all
    pub fn no_migrations_found(&self) -> bool {
        self.discovered_count == 0
    }
}

/// Result of rolling back the latest migration
#[derive(Debug, Clone)]
pub enum RollbackResult {
    /// The ledger was empty
    NothingToRollback,
    /// The definition was reversed and its ledger entry removed
    RolledBack {
        definition: MigrationDefinition,
        execution_time_ms: u128,
    },
}

/// Migration status in the system
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    /// Migration is pending (not yet applied)
    Pending,
    /// Migration has been applied
    Applied {
        /// When it was applied
        applied_at: DateTime<Utc>,
    },
}

/// One row of a status report
#[derive(Debug, Clone)]
pub struct MigrationStatusEntry {
    pub definition: MigrationDefinition,
    pub status: MigrationStatus,
}

impl MigrationStatusEntry {
    pub fn is_applied(&self) -> bool {
        matches!(self.status, MigrationStatus::Applied { .. })
    }
}

/// Read-only snapshot of definitions against the ledger
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    /// Every discovered definition, ascending by version
    pub entries: Vec<MigrationStatusEntry>,
    /// Ledger entries with no matching definition on disk
    pub orphaned: Vec<LedgerEntry>,
}

impl StatusReport {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_applied()).count()
    }

    pub fn applied_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_applied()).count()
    }
}
