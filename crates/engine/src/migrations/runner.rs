//! Migration Runner - Executes migrations against the database
//!
//! Applies pending definitions strictly in version order and reports status.
//! Definitions and the ledger are re-read on every call.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::time::Instant;

use super::definitions::{
    MigrationDefinition, MigrationRunResult, MigrationStatus, MigrationStatusEntry, StatusReport,
};
use super::manager::MigrationManager;
use crate::error::{MigrationError, MigrationResult};
use crate::store::MigrationStore;

/// Migration runner that executes migrations against a store
pub struct MigrationRunner {
    manager: MigrationManager,
    store: Box<dyn MigrationStore>,
}

impl MigrationRunner {
    /// Create a new migration runner
    pub fn new(manager: MigrationManager, store: impl MigrationStore + 'static) -> Self {
        Self::from_boxed(manager, Box::new(store))
    }

    /// Create a runner over a store chosen at runtime
    pub fn from_boxed(manager: MigrationManager, store: Box<dyn MigrationStore>) -> Self {
        Self { manager, store }
    }

    /// Get the migration manager
    pub fn manager(&self) -> &MigrationManager {
        &self.manager
    }

    /// Get the store
    pub fn store(&self) -> &dyn MigrationStore {
        self.store.as_ref()
    }

    /// Run all pending migrations
    pub async fn run_migrations(&self) -> MigrationResult<MigrationRunResult> {
        self.run_migrations_with(|_| {}).await
    }

    /// Run all pending migrations, calling `on_apply` just before each one
    /// is executed.
    ///
    /// Stops at the first failure. Migrations applied earlier in the same
    /// run stay applied.
    pub async fn run_migrations_with<F>(&self, mut on_apply: F) -> MigrationResult<MigrationRunResult>
    where
        F: FnMut(&MigrationDefinition),
    {
        let start_time = Instant::now();

        let all_migrations = self.manager.load_migrations()?;
        if all_migrations.is_empty() {
            tracing::info!("No migrations found");
            return Ok(MigrationRunResult {
                execution_time_ms: start_time.elapsed().as_millis(),
                ..MigrationRunResult::default()
            });
        }

        let applied_versions: HashSet<String> = self
            .store
            .applied_migrations()
            .await?
            .into_iter()
            .map(|entry| entry.version)
            .collect();

        let mut result = MigrationRunResult {
            discovered_count: all_migrations.len(),
            ..MigrationRunResult::default()
        };

        for definition in all_migrations {
            if applied_versions.contains(&definition.version) {
                result.skipped_count += 1;
                continue;
            }

            on_apply(&definition);
            tracing::info!(
                version = %definition.version,
                name = %definition.name,
                "Applying migration"
            );

            self.store
                .apply_migration(&definition, Utc::now())
                .await
                .map_err(|e| MigrationError::for_version(definition.version.as_str(), e))?;

            result.applied.push(definition);
        }

        result.execution_time_ms = start_time.elapsed().as_millis();
        if result.applied.is_empty() {
            tracing::info!("No pending migrations");
        } else {
            tracing::info!(
                count = result.applied.len(),
                elapsed_ms = result.execution_time_ms as u64,
                "Applied migrations"
            );
        }

        Ok(result)
    }

    /// Get migration status for all migrations (applied and pending)
    pub async fn status(&self) -> MigrationResult<StatusReport> {
        let all_migrations = self.manager.load_migrations()?;
        let applied = self.store.applied_migrations().await?;

        let known: HashSet<&str> = all_migrations.iter().map(|m| m.version.as_str()).collect();
        let orphaned: Vec<_> = applied
            .iter()
            .filter(|entry| !known.contains(entry.version.as_str()))
            .cloned()
            .collect();
        for entry in &orphaned {
            tracing::warn!(
                version = %entry.version,
                name = %entry.name,
                "Applied migration has no matching file"
            );
        }

        let applied_at: HashMap<String, _> = applied
            .into_iter()
            .map(|entry| (entry.version, entry.applied_at))
            .collect();

        let entries = all_migrations
            .into_iter()
            .map(|definition| {
                let status = match applied_at.get(&definition.version) {
                    Some(applied_at) => MigrationStatus::Applied {
                        applied_at: *applied_at,
                    },
                    None => MigrationStatus::Pending,
                };
                MigrationStatusEntry { definition, status }
            })
            .collect();

        Ok(StatusReport { entries, orphaned })
    }

    /// The latest applied version, or `None` when nothing has been applied
    pub async fn current_version(&self) -> MigrationResult<Option<String>> {
        Ok(self.store.current_version().await?)
    }

    /// Release the store's connections
    pub async fn close(&self) {
        self.store.close().await;
    }
}
