//! PostgreSQL ledger store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool, Row};

use super::{redact_url, MigrationStore};
use crate::error::{StoreError, StoreResult};
use crate::migrations::definitions::{LedgerEntry, MigrationDefinition};

/// Store backed by a PostgreSQL connection pool
pub struct PostgresStore {
    pool: PgPool,
    table: String,
}

impl PostgresStore {
    /// Wrap an existing pool
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    /// Open a pool for `database_url`
    pub async fn connect(database_url: &str, table: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url)
            .await
            .map_err(|e| {
                StoreError::connection(format!(
                    "Failed to connect to {}: {}",
                    redact_url(database_url),
                    e
                ))
            })?;

        Ok(Self::new(pool, table))
    }

    /// Get the database pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn create_ledger_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                version TEXT PRIMARY KEY,\n    \
                name TEXT NOT NULL,\n    \
                applied_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP\n\
            )",
            self.table
        )
    }

    fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (version, name, applied_at) VALUES ($1, $2, $3)",
            self.table
        )
    }

    fn delete_sql(&self) -> String {
        format!("DELETE FROM {} WHERE version = $1", self.table)
    }
}

#[async_trait]
impl MigrationStore for PostgresStore {
    async fn init_ledger(&self) -> StoreResult<()> {
        sqlx::query(&self.create_ledger_sql())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::ledger(format!("Failed to create ledger table: {}", e)))?;
        Ok(())
    }

    async fn applied_migrations(&self) -> StoreResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT version, name, applied_at FROM {} ORDER BY version ASC",
            self.table
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::ledger(format!("Failed to query applied migrations: {}", e)))?;

        rows.iter()
            .map(|row| {
                Ok(LedgerEntry {
                    version: row.try_get("version")?,
                    name: row.try_get("name")?,
                    applied_at: row.try_get("applied_at")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| StoreError::ledger(format!("Failed to decode ledger row: {}", e)))
    }

    async fn current_version(&self) -> StoreResult<Option<String>> {
        let sql = format!(
            "SELECT version FROM {} ORDER BY version DESC LIMIT 1",
            self.table
        );
        let row = sqlx::query(&sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::ledger(format!("Failed to query current version: {}", e)))?;

        row.map(|row| row.try_get::<String, _>("version"))
            .transpose()
            .map_err(|e| StoreError::ledger(format!("Failed to decode version: {}", e)))
    }

    async fn record_migration(
        &self,
        version: &str,
        name: &str,
        applied_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(&self.insert_sql())
            .bind(version)
            .bind(name)
            .bind(applied_at)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::ledger(format!("Failed to record migration: {}", e)))?;
        Ok(())
    }

    async fn remove_migration(&self, version: &str) -> StoreResult<()> {
        sqlx::query(&self.delete_sql())
            .bind(version)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::ledger(format!("Failed to remove migration record: {}", e)))?;
        Ok(())
    }

    async fn execute_sql(&self, sql: &str) -> StoreResult<()> {
        let mut transaction = self.pool.begin().await?;
        // Unprepared execution so a body may hold several statements
        (&mut *transaction).execute(sql).await?;
        transaction.commit().await?;
        Ok(())
    }

    async fn apply_migration(
        &self,
        definition: &MigrationDefinition,
        applied_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut transaction = self.pool.begin().await?;

        if !definition.forward_body.is_empty() {
            (&mut *transaction)
                .execute(definition.forward_body.as_str())
                .await?;
        }

        sqlx::query(&self.insert_sql())
            .bind(&definition.version)
            .bind(&definition.name)
            .bind(applied_at)
            .execute(&mut *transaction)
            .await
            .map_err(|e| StoreError::ledger(format!("Failed to record migration: {}", e)))?;

        transaction.commit().await?;
        Ok(())
    }

    async fn revert_migration(&self, definition: &MigrationDefinition) -> StoreResult<()> {
        let mut transaction = self.pool.begin().await?;

        (&mut *transaction)
            .execute(definition.backward_body.as_str())
            .await?;

        sqlx::query(&self.delete_sql())
            .bind(&definition.version)
            .execute(&mut *transaction)
            .await
            .map_err(|e| StoreError::ledger(format!("Failed to remove migration record: {}", e)))?;

        transaction.commit().await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
