use std::fs;
use std::path::Path;

use stepwise_engine::{
    MemoryStore, MigrationConfig, MigrationError, MigrationManager, MigrationRunner,
    MigrationStatus, MigrationStore, RollbackResult, SqliteStore,
};
use tempfile::TempDir;

fn write_migration(dir: &Path, file: &str, up: &str, down: &str) {
    let content = format!(
        "-- Migration: {}\n\n-- ==== UP ====\n{}\n\n-- ==== DOWN ====\n{}\n",
        file, up, down
    );
    fs::write(dir.join(file), content).unwrap();
}

fn runner_for(dir: &Path, store: impl MigrationStore + 'static) -> MigrationRunner {
    let manager = MigrationManager::with_config(MigrationConfig {
        migrations_dir: dir.to_path_buf(),
        ..MigrationConfig::default()
    });
    MigrationRunner::new(manager, store)
}

fn seed_three(dir: &Path) {
    write_migration(
        dir,
        "001_create_users.sql",
        "CREATE TABLE users (id INTEGER PRIMARY KEY);",
        "DROP TABLE users;",
    );
    write_migration(
        dir,
        "002_create_posts.sql",
        "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER);",
        "DROP TABLE posts;",
    );
    write_migration(
        dir,
        "003_add_email.sql",
        "ALTER TABLE users ADD COLUMN email TEXT;",
        "",
    );
}

#[tokio::test]
async fn test_up_applies_pending_in_order_and_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    seed_three(temp_dir.path());
    let store = MemoryStore::new();
    let runner = runner_for(temp_dir.path(), store.clone());

    let mut announced = Vec::new();
    let first = runner
        .run_migrations_with(|m| announced.push(m.version.clone()))
        .await
        .unwrap();
    assert_eq!(first.applied_count(), 3);
    assert_eq!(announced, vec!["001", "002", "003"]);
    assert_eq!(store.applied_versions(), vec!["001", "002", "003"]);
    assert_eq!(store.executed().len(), 3);

    let second = runner.run_migrations().await.unwrap();
    assert_eq!(second.applied_count(), 0);
    assert_eq!(second.skipped_count, 3);
    assert_eq!(store.executed().len(), 3);
}

#[tokio::test]
async fn test_up_picks_up_new_files_only() {
    let temp_dir = TempDir::new().unwrap();
    seed_three(temp_dir.path());
    let store = MemoryStore::new();
    let runner = runner_for(temp_dir.path(), store.clone());
    runner.run_migrations().await.unwrap();

    write_migration(
        temp_dir.path(),
        "004_create_tags.sql",
        "CREATE TABLE tags (id INTEGER);",
        "DROP TABLE tags;",
    );

    let result = runner.run_migrations().await.unwrap();
    let applied: Vec<_> = result.applied.iter().map(|m| m.version.as_str()).collect();
    assert_eq!(applied, vec!["004"]);
}

#[tokio::test]
async fn test_up_stops_at_first_failure_and_keeps_earlier_work() {
    let temp_dir = TempDir::new().unwrap();
    seed_three(temp_dir.path());
    let store = MemoryStore::new();
    store.fail_on("CREATE TABLE posts");
    let runner = runner_for(temp_dir.path(), store.clone());

    let err = runner.run_migrations().await.unwrap_err();
    assert!(matches!(err, MigrationError::Execution { ref version, .. } if version == "002"));
    assert_eq!(err.version(), Some("002"));

    // 001 stays committed, 003 was never attempted
    assert_eq!(store.applied_versions(), vec!["001"]);
    assert!(store.executed().iter().all(|sql| !sql.contains("ALTER TABLE")));
}

#[tokio::test]
async fn test_up_reports_ledger_failures_with_version() {
    let temp_dir = TempDir::new().unwrap();
    seed_three(temp_dir.path());
    let store = MemoryStore::new();
    store.fail_ledger_writes(true);
    let runner = runner_for(temp_dir.path(), store.clone());

    let err = runner.run_migrations().await.unwrap_err();
    assert!(matches!(err, MigrationError::Ledger { ref version, .. } if version == "001"));
    assert!(store.applied_versions().is_empty());
}

#[tokio::test]
async fn test_empty_forward_body_is_recorded_without_execution() {
    let temp_dir = TempDir::new().unwrap();
    write_migration(temp_dir.path(), "001_placeholder.sql", "", "");
    let store = MemoryStore::new();
    let runner = runner_for(temp_dir.path(), store.clone());

    let result = runner.run_migrations().await.unwrap();
    assert_eq!(result.applied_count(), 1);
    assert!(store.executed().is_empty());
    assert_eq!(store.applied_versions(), vec!["001"]);
}

#[tokio::test]
async fn test_down_then_up_restores_the_ledger() {
    let temp_dir = TempDir::new().unwrap();
    write_migration(
        temp_dir.path(),
        "001_create_users.sql",
        "CREATE TABLE users (id INTEGER);",
        "DROP TABLE users;",
    );
    write_migration(
        temp_dir.path(),
        "002_create_posts.sql",
        "CREATE TABLE posts (id INTEGER);",
        "DROP TABLE posts;",
    );
    let store = MemoryStore::new();
    let runner = runner_for(temp_dir.path(), store.clone());
    runner.run_migrations().await.unwrap();

    match runner.rollback_last().await.unwrap() {
        RollbackResult::RolledBack { definition, .. } => assert_eq!(definition.version, "002"),
        other => panic!("expected a rollback, got {:?}", other),
    }
    assert_eq!(store.applied_versions(), vec!["001"]);
    assert_eq!(store.executed().last().map(String::as_str), Some("DROP TABLE posts;"));

    let result = runner.run_migrations().await.unwrap();
    let applied: Vec<_> = result.applied.iter().map(|m| m.version.as_str()).collect();
    assert_eq!(applied, vec!["002"]);
    assert_eq!(store.applied_versions(), vec!["001", "002"]);
}

#[tokio::test]
async fn test_down_refuses_missing_backward_body() {
    let temp_dir = TempDir::new().unwrap();
    seed_three(temp_dir.path());
    let store = MemoryStore::new();
    let runner = runner_for(temp_dir.path(), store.clone());
    runner.run_migrations().await.unwrap();
    let executed_before = store.executed().len();

    let err = runner.rollback_last().await.unwrap_err();
    assert!(matches!(err, MigrationError::RollbackUnsupported { ref version } if version == "003"));
    assert_eq!(store.applied_versions(), vec!["001", "002", "003"]);
    assert_eq!(store.executed().len(), executed_before);
}

#[tokio::test]
async fn test_down_fails_when_file_is_missing() {
    let temp_dir = TempDir::new().unwrap();
    seed_three(temp_dir.path());
    let store = MemoryStore::new();
    let runner = runner_for(temp_dir.path(), store.clone());
    runner.run_migrations().await.unwrap();

    fs::remove_file(temp_dir.path().join("003_add_email.sql")).unwrap();

    let err = runner.rollback_last().await.unwrap_err();
    assert!(matches!(err, MigrationError::MissingDefinition { ref version } if version == "003"));
    assert_eq!(store.applied_versions(), vec!["001", "002", "003"]);
}

#[tokio::test]
async fn test_down_uses_version_order_not_apply_time() {
    let temp_dir = TempDir::new().unwrap();
    seed_three(temp_dir.path());
    let store = MemoryStore::new();

    // 002 recorded after 001 in wall-clock terms but 001 is not the latest
    let earlier = chrono::Utc::now() - chrono::Duration::hours(1);
    store.record_migration("002", "create_posts", earlier).await.unwrap();
    store.record_migration("001", "create_users", chrono::Utc::now()).await.unwrap();

    let runner = runner_for(temp_dir.path(), store.clone());
    match runner.rollback_last().await.unwrap() {
        RollbackResult::RolledBack { definition, .. } => assert_eq!(definition.version, "002"),
        other => panic!("expected a rollback, got {:?}", other),
    }
    assert_eq!(store.applied_versions(), vec!["001"]);
}

#[tokio::test]
async fn test_empty_directory_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let runner = runner_for(temp_dir.path(), store.clone());

    let result = runner.run_migrations().await.unwrap();
    assert!(result.no_migrations_found());
    assert_eq!(result.applied_count(), 0);

    assert!(runner.status().await.unwrap().is_empty());
    assert_eq!(runner.current_version().await.unwrap(), None);
    assert!(matches!(
        runner.rollback_last().await.unwrap(),
        RollbackResult::NothingToRollback
    ));
}

#[tokio::test]
async fn test_status_reports_applied_pending_and_orphans() {
    let temp_dir = TempDir::new().unwrap();
    seed_three(temp_dir.path());
    let store = MemoryStore::new();
    let applied_at = chrono::Utc::now();
    store.record_migration("001", "create_users", applied_at).await.unwrap();
    store.record_migration("000", "bootstrap", applied_at).await.unwrap();

    let runner = runner_for(temp_dir.path(), store.clone());
    let report = runner.status().await.unwrap();

    assert_eq!(report.entries.len(), 3);
    assert_eq!(report.entries[0].status, MigrationStatus::Applied { applied_at });
    assert_eq!(report.entries[1].status, MigrationStatus::Pending);
    assert_eq!(report.pending_count(), 2);
    assert_eq!(report.applied_count(), 1);
    assert_eq!(report.orphaned.len(), 1);
    assert_eq!(report.orphaned[0].version, "000");

    // status is read-only
    assert!(store.executed().is_empty());
    assert_eq!(store.applied_versions(), vec!["000", "001"]);
}

#[tokio::test]
async fn test_discovery_errors_abort_before_touching_the_store() {
    let temp_dir = TempDir::new().unwrap();
    seed_three(temp_dir.path());
    fs::write(temp_dir.path().join("notes.sql"), "SELECT 1;").unwrap();
    let store = MemoryStore::new();
    let runner = runner_for(temp_dir.path(), store.clone());

    let err = runner.run_migrations().await.unwrap_err();
    assert!(matches!(err, MigrationError::InvalidFilename { .. }));
    assert!(store.executed().is_empty());
    assert!(store.applied_versions().is_empty());
}

#[tokio::test]
async fn test_unreadable_file_aborts_up_with_io_error() {
    let temp_dir = TempDir::new().unwrap();
    seed_three(temp_dir.path());
    fs::write(temp_dir.path().join("004_binary.sql"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
    let store = MemoryStore::new();
    let runner = runner_for(temp_dir.path(), store.clone());

    let err = runner.run_migrations().await.unwrap_err();
    assert!(
        matches!(err, MigrationError::Io { ref path, .. } if path.ends_with("004_binary.sql"))
    );
    assert!(store.executed().is_empty());
    assert!(store.applied_versions().is_empty());
}

#[tokio::test]
async fn test_migrations_root_that_is_a_file_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("migrations");
    fs::write(&root, "-- not a directory").unwrap();
    let store = MemoryStore::new();
    let runner = runner_for(&root, store.clone());

    assert!(matches!(
        runner.run_migrations().await.unwrap_err(),
        MigrationError::Io { .. }
    ));
    assert!(matches!(runner.status().await.unwrap_err(), MigrationError::Io { .. }));
    assert!(runner.manager().create_migration("add users").is_err());
    assert!(store.executed().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_migrations_are_applied() {
    let temp_dir = TempDir::new().unwrap();
    let shared = TempDir::new().unwrap();
    write_migration(
        temp_dir.path(),
        "001_create_users.sql",
        "CREATE TABLE users (id INTEGER PRIMARY KEY);",
        "DROP TABLE users;",
    );
    write_migration(
        shared.path(),
        "audit.sql",
        "CREATE TABLE audit (id INTEGER PRIMARY KEY);",
        "DROP TABLE audit;",
    );
    std::os::unix::fs::symlink(
        shared.path().join("audit.sql"),
        temp_dir.path().join("002_create_audit.sql"),
    )
    .unwrap();

    let store = MemoryStore::new();
    let runner = runner_for(temp_dir.path(), store.clone());

    let result = runner.run_migrations().await.unwrap();
    assert_eq!(result.applied_count(), 2);
    assert_eq!(store.applied_versions(), vec!["001", "002"]);
    assert_eq!(
        store.executed(),
        vec![
            "CREATE TABLE users (id INTEGER PRIMARY KEY);",
            "CREATE TABLE audit (id INTEGER PRIMARY KEY);",
        ]
    );

    let report = runner.status().await.unwrap();
    assert_eq!(report.applied_count(), 2);
}

#[tokio::test]
async fn test_round_trip_against_sqlite() {
    let temp_dir = TempDir::new().unwrap();
    write_migration(
        temp_dir.path(),
        "001_create_users.sql",
        "CREATE TABLE users (id INTEGER PRIMARY KEY);\nCREATE INDEX users_id ON users (id);",
        "DROP INDEX users_id;\nDROP TABLE users;",
    );
    write_migration(
        temp_dir.path(),
        "002_broken.sql",
        "CREATE TABLE half (id INTEGER);\nINSERT INTO missing_table VALUES (1);",
        "DROP TABLE half;",
    );

    let store = SqliteStore::connect("sqlite::memory:", "schema_migrations")
        .await
        .unwrap();
    store.init_ledger().await.unwrap();
    let pool = store.pool().clone();
    let runner = runner_for(temp_dir.path(), store);

    let err = runner.run_migrations().await.unwrap_err();
    assert!(matches!(err, MigrationError::Execution { ref version, .. } if version == "002"));
    assert_eq!(runner.current_version().await.unwrap().as_deref(), Some("001"));

    // The failed body was rolled back as a unit
    let half: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'half'")
            .fetch_optional(&pool)
            .await
            .unwrap();
    assert!(half.is_none());

    match runner.rollback_last().await.unwrap() {
        RollbackResult::RolledBack { definition, .. } => assert_eq!(definition.version, "001"),
        other => panic!("expected a rollback, got {:?}", other),
    }
    let users: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'users'")
            .fetch_optional(&pool)
            .await
            .unwrap();
    assert!(users.is_none());
    assert_eq!(runner.current_version().await.unwrap(), None);
}
