use anyhow::{Context, Result};
use stepwise_engine::{
    connect, MigrateConfig, MigrationManager, MigrationRunner, MigrationStatus, RollbackResult,
    StatusReport,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

async fn runner(config: &MigrateConfig) -> Result<MigrationRunner> {
    tracing::debug!(
        migrations_dir = %config.migrations_dir.display(),
        table = %config.migrations_table,
        "opening migration store"
    );
    let store = connect(config.database_url()?, &config.migrations_table)
        .await
        .context("failed to initialize storage")?;
    let manager = MigrationManager::with_config(config.migration_config());
    Ok(MigrationRunner::from_boxed(manager, store))
}

pub fn create(config: &MigrateConfig, name: &str) -> Result<()> {
    let manager = MigrationManager::with_config(config.migration_config());
    let path = manager
        .create_migration(name)
        .context("failed to create migration")?;

    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    println!("Created migration: {}", filename);
    Ok(())
}

pub async fn up(config: &MigrateConfig) -> Result<()> {
    let runner = runner(config).await?;
    let outcome = runner
        .run_migrations_with(|m| println!("Applying migration {}: {}", m.version, m.name))
        .await;
    runner.close().await;

    let result = outcome?;
    if result.no_migrations_found() {
        println!("No migrations found");
    } else if result.applied_count() == 0 {
        println!("No pending migrations");
    } else {
        println!("Applied {} migration(s)", result.applied_count());
    }
    Ok(())
}

pub async fn down(config: &MigrateConfig) -> Result<()> {
    let runner = runner(config).await?;
    let outcome = runner.rollback_last().await;
    runner.close().await;

    match outcome? {
        RollbackResult::NothingToRollback => println!("No migrations to rollback"),
        RollbackResult::RolledBack { definition, .. } => println!(
            "Rolled back migration {}: {}",
            definition.version, definition.name
        ),
    }
    Ok(())
}

pub async fn status(config: &MigrateConfig) -> Result<()> {
    let runner = runner(config).await?;
    let outcome = runner.status().await;
    runner.close().await;

    print!("{}", render_status(&outcome?));
    Ok(())
}

pub async fn version(config: &MigrateConfig) -> Result<()> {
    let runner = runner(config).await?;
    let outcome = runner.current_version().await;
    runner.close().await;

    match outcome? {
        Some(version) => println!("Current version: {}", version),
        None => println!("No migrations applied yet"),
    }
    Ok(())
}

fn render_status(report: &StatusReport) -> String {
    let mut out = String::new();

    if report.is_empty() && report.orphaned.is_empty() {
        out.push_str("No migrations found\n");
        return out;
    }

    out.push_str("Migration Status:\n");
    out.push_str("================\n");

    for entry in &report.entries {
        let line = match &entry.status {
            MigrationStatus::Applied { applied_at } => format!(
                "✓ {} (applied: {})",
                entry.definition.label(),
                applied_at.format(TIMESTAMP_FORMAT)
            ),
            MigrationStatus::Pending => format!("✗ {} (pending)", entry.definition.label()),
        };
        out.push_str(&line);
        out.push('\n');
    }

    for orphan in &report.orphaned {
        out.push_str(&format!(
            "! {}_{} (applied, file missing)\n",
            orphan.version, orphan.name
        ));
    }

    out
}
