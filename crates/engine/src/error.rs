//! Error types for the migration engine
//!
//! Every failure carries the version or file it concerns so the caller can
//! report it without re-deriving context.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for engine operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised while discovering, creating, applying or reverting migrations
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid migration filename format: {filename} (expected <version>_<name>.{extension})")]
    InvalidFilename { filename: String, extension: String },

    #[error("Duplicate migration version {version}: '{first}' and '{second}'")]
    DuplicateVersion {
        version: String,
        first: String,
        second: String,
    },

    #[error("Invalid version format: {version}")]
    InvalidVersion { version: String },

    #[error("Invalid migration name '{name}': nothing left after sanitization")]
    InvalidName { name: String },

    #[error("Migration file already exists: {path}")]
    AlreadyExists { path: PathBuf },

    #[error("Failed to execute migration {version}: {source}")]
    Execution {
        version: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to update ledger for migration {version}: {source}")]
    Ledger {
        version: String,
        #[source]
        source: StoreError,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Migration file not found for version {version}")]
    MissingDefinition { version: String },

    #[error("No DOWN migration found for version {version}: rollback unsupported")]
    RollbackUnsupported { version: String },
}

impl MigrationError {
    /// Wrap an IO failure with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach a version to a store failure, keeping execution and ledger
    /// failures distinguishable.
    pub fn for_version(version: impl Into<String>, source: StoreError) -> Self {
        let version = version.into();
        match source {
            StoreError::Ledger { .. } => Self::Ledger { version, source },
            source => Self::Execution { version, source },
        }
    }

    /// The version this error concerns, if any
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::DuplicateVersion { version, .. }
            | Self::InvalidVersion { version }
            | Self::Execution { version, .. }
            | Self::Ledger { version, .. }
            | Self::MissingDefinition { version }
            | Self::RollbackUnsupported { version } => Some(version),
            _ => None,
        }
    }
}

/// Errors raised by a [`MigrationStore`](crate::store::MigrationStore)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("SQL execution failed: {message}")]
    Execution { message: String },

    #[error("Ledger operation failed: {message}")]
    Ledger { message: String },

    #[error("Unsupported database URL '{url}'")]
    Unsupported { url: String },
}

impl StoreError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    pub fn ledger(message: impl Into<String>) -> Self {
        Self::Ledger {
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(_)
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => StoreError::connection(err.to_string()),
            other => StoreError::execution(other.to_string()),
        }
    }
}

/// Configuration errors, raised before any engine operation runs
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}. {hint}")]
    MissingRequired { field: String, hint: String },

    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },
}
