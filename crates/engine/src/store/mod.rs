//! Migration Stores - Ledger persistence and SQL execution
//!
//! The runner only talks to the [`MigrationStore`] trait. SQL backends are
//! built on sqlx pools; [`MemoryStore`] keeps everything in process.

mod memory;
mod postgres;
mod sqlite;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::error::{StoreError, StoreResult};
use crate::migrations::definitions::{LedgerEntry, MigrationDefinition};

static TABLE_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Persistence and execution capability consumed by the runner
#[async_trait]
pub trait MigrationStore: Send + Sync {
    /// Create the ledger table if it does not exist
    async fn init_ledger(&self) -> StoreResult<()>;

    /// All ledger entries, ascending by version
    async fn applied_migrations(&self) -> StoreResult<Vec<LedgerEntry>>;

    /// Greatest applied version, if any
    async fn current_version(&self) -> StoreResult<Option<String>>;

    /// Insert a ledger entry
    async fn record_migration(
        &self,
        version: &str,
        name: &str,
        applied_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Delete the ledger entry for `version`
    async fn remove_migration(&self, version: &str) -> StoreResult<()>;

    /// Execute a SQL body in its own transaction; rolled back on any error
    async fn execute_sql(&self, sql: &str) -> StoreResult<()>;

    /// Run a forward body and record it.
    ///
    /// The default runs two separate atomic steps, so a crash between them
    /// leaves the schema changed without a ledger entry. SQL stores override
    /// this to do both in one transaction.
    async fn apply_migration(
        &self,
        definition: &MigrationDefinition,
        applied_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        if !definition.forward_body.is_empty() {
            self.execute_sql(&definition.forward_body).await?;
        }
        self.record_migration(&definition.version, &definition.name, applied_at)
            .await
    }

    /// Run a backward body and remove its ledger entry. Same atomicity
    /// caveat as [`apply_migration`](Self::apply_migration).
    async fn revert_migration(&self, definition: &MigrationDefinition) -> StoreResult<()> {
        self.execute_sql(&definition.backward_body).await?;
        self.remove_migration(&definition.version).await
    }

    /// Release connections
    async fn close(&self) {}
}

/// Database backends selectable from a connection URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Sqlite,
}

impl Backend {
    /// Pick the backend for a database URL
    pub fn from_url(database_url: &str) -> StoreResult<Self> {
        let unsupported = || StoreError::Unsupported {
            url: redact_url(database_url),
        };

        let url = Url::parse(database_url).map_err(|_| unsupported())?;
        match url.scheme() {
            "postgres" | "postgresql" => Ok(Backend::Postgres),
            "sqlite" => Ok(Backend::Sqlite),
            _ => Err(unsupported()),
        }
    }
}

/// Whether `table` can be spliced into SQL as a ledger table name
pub fn is_valid_table_name(table: &str) -> bool {
    TABLE_IDENTIFIER.is_match(table)
}

/// Connect to the database behind `database_url` and make sure the ledger
/// table exists.
pub async fn connect(database_url: &str, table: &str) -> StoreResult<Box<dyn MigrationStore>> {
    if !is_valid_table_name(table) {
        return Err(StoreError::connection(format!(
            "invalid ledger table name '{}'",
            table
        )));
    }

    let store: Box<dyn MigrationStore> = match Backend::from_url(database_url)? {
        Backend::Postgres => Box::new(PostgresStore::connect(database_url, table).await?),
        Backend::Sqlite => Box::new(SqliteStore::connect(database_url, table).await?),
    };

    store.init_ledger().await?;
    tracing::debug!(url = %redact_url(database_url), table, "Ledger ready");
    Ok(store)
}

/// Strip credentials from a URL before it goes into logs or errors
pub fn redact_url(database_url: &str) -> String {
    match Url::parse(database_url) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("****"));
            }
            let has_token = url.query_pairs().any(|(k, _)| k.eq_ignore_ascii_case("authToken"));
            if has_token {
                url.set_query(None);
            }
            url.to_string()
        }
        Err(_) => "<unparseable url>".to_string(),
    }
}
