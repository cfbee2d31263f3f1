//! Migration Rollback - Handles rolling back the latest applied migration
//!
//! "Latest" means the greatest applied version, not the most recent
//! timestamp. One step per call; call again to go further back.

use std::time::Instant;

use super::definitions::RollbackResult;
use super::runner::MigrationRunner;
use crate::error::{MigrationError, MigrationResult};

impl MigrationRunner {
    /// Reverse the applied migration with the greatest version.
    ///
    /// Fails without touching the database when its file is gone or it has
    /// no DOWN section.
    pub async fn rollback_last(&self) -> MigrationResult<RollbackResult> {
        let start_time = Instant::now();

        let applied = self.store().applied_migrations().await?;
        let Some(last) = applied.iter().max_by(|a, b| a.version.cmp(&b.version)) else {
            tracing::info!("No migrations to rollback");
            return Ok(RollbackResult::NothingToRollback);
        };

        let definition = self
            .manager()
            .load_migrations()?
            .into_iter()
            .find(|m| m.version == last.version)
            .ok_or_else(|| MigrationError::MissingDefinition {
                version: last.version.clone(),
            })?;

        if !definition.is_reversible() {
            return Err(MigrationError::RollbackUnsupported {
                version: definition.version,
            });
        }

        tracing::info!(
            version = %definition.version,
            name = %definition.name,
            "Rolling back migration"
        );

        self.store()
            .revert_migration(&definition)
            .await
            .map_err(|e| MigrationError::for_version(definition.version.as_str(), e))?;

        Ok(RollbackResult::RolledBack {
            definition,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }
}
