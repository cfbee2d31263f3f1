//! # stepwise-engine: versioned SQL migrations
//!
//! Discovers `<version>_<name>.sql` files, applies pending ones in version
//! order, reverses the latest one on request, and tracks everything in a
//! ledger table.
//!
//! ```no_run
//! use stepwise_engine::{MigrationConfig, MigrationManager, MigrationRunner, SqliteStore};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteStore::connect("sqlite://app.db", "schema_migrations").await?;
//! let runner = MigrationRunner::new(MigrationManager::with_config(MigrationConfig::default()), store);
//! runner.store().init_ledger().await?;
//!
//! let result = runner.run_migrations().await?;
//! println!("Applied {} migration(s)", result.applied_count());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod migrations;
pub mod store;

pub use config::MigrateConfig;
pub use error::*;
pub use migrations::*;
pub use store::{connect, Backend, MemoryStore, MigrationStore, PostgresStore, SqliteStore};
