//! In-process store for dry runs and tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::MigrationStore;
use crate::error::{StoreError, StoreResult};
use crate::migrations::definitions::LedgerEntry;

#[derive(Debug, Default)]
struct MemoryState {
    ledger: BTreeMap<String, LedgerEntry>,
    executed: Vec<String>,
    fail_fragments: Vec<String>,
    fail_ledger_writes: bool,
}

/// Store that keeps the ledger in memory and logs executed SQL instead of
/// running it. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every SQL body containing `fragment` fail
    pub fn fail_on(&self, fragment: impl Into<String>) {
        self.state.lock().fail_fragments.push(fragment.into());
    }

    /// Make ledger inserts and deletes fail (or succeed again)
    pub fn fail_ledger_writes(&self, fail: bool) {
        self.state.lock().fail_ledger_writes = fail;
    }

    /// Every SQL body executed so far, in order
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().executed.clone()
    }

    /// Versions currently in the ledger, ascending
    pub fn applied_versions(&self) -> Vec<String> {
        self.state.lock().ledger.keys().cloned().collect()
    }
}

#[async_trait]
impl MigrationStore for MemoryStore {
    async fn init_ledger(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn applied_migrations(&self) -> StoreResult<Vec<LedgerEntry>> {
        Ok(self.state.lock().ledger.values().cloned().collect())
    }

    async fn current_version(&self) -> StoreResult<Option<String>> {
        Ok(self.state.lock().ledger.keys().next_back().cloned())
    }

    async fn record_migration(
        &self,
        version: &str,
        name: &str,
        applied_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.fail_ledger_writes {
            return Err(StoreError::ledger("ledger writes disabled"));
        }
        if state.ledger.contains_key(version) {
            return Err(StoreError::ledger(format!(
                "version {} is already recorded",
                version
            )));
        }
        state.ledger.insert(
            version.to_string(),
            LedgerEntry {
                version: version.to_string(),
                name: name.to_string(),
                applied_at,
            },
        );
        Ok(())
    }

    async fn remove_migration(&self, version: &str) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.fail_ledger_writes {
            return Err(StoreError::ledger("ledger writes disabled"));
        }
        state.ledger.remove(version);
        Ok(())
    }

    async fn execute_sql(&self, sql: &str) -> StoreResult<()> {
        let mut state = self.state.lock();
        if let Some(fragment) = state.fail_fragments.iter().find(|f| sql.contains(f.as_str())) {
            return Err(StoreError::execution(format!(
                "statement rejected (matched '{}')",
                fragment
            )));
        }
        state.executed.push(sql.to_string());
        Ok(())
    }
}
