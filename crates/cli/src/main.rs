mod commands;
mod logging;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stepwise_engine::config::{DEFAULT_MIGRATIONS_DIR, DEFAULT_MIGRATIONS_TABLE};
use stepwise_engine::MigrateConfig;

use commands::migrate;
use logging::{LogFormat, LoggingConfig};

#[derive(Parser)]
#[command(name = "stepwise")]
#[command(version, about = "Apply, roll back and inspect versioned SQL migrations")]
struct Cli {
    /// Database URL (postgres://, postgresql:// or sqlite:)
    #[arg(long, short = 'd', env = "DATABASE_URL", hide_env_values = true, global = true)]
    database_url: Option<String>,

    /// Directory containing migration files
    #[arg(long, short = 'm', env = "MIGRATIONS_DIR", default_value = DEFAULT_MIGRATIONS_DIR, global = true)]
    migrations_dir: PathBuf,

    /// Ledger table recording applied migrations
    #[arg(long, env = "MIGRATIONS_TABLE", default_value = DEFAULT_MIGRATIONS_TABLE, global = true)]
    table: String,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new migration file with the next version number
    #[command(visible_alias = "c")]
    Create {
        /// Migration name, e.g. "add users table"
        name: String,
    },

    /// Apply all pending migrations, each in its own transaction
    #[command(visible_alias = "u")]
    Up,

    /// Roll back the most recently applied migration
    #[command(visible_alias = "d")]
    Down,

    /// Show which migrations are applied and which are pending
    #[command(visible_alias = "s")]
    Status,

    /// Show the current schema version
    #[command(visible_alias = "v")]
    Version,
}

impl Cli {
    fn migrate_config(&self) -> MigrateConfig {
        MigrateConfig {
            database_url: self.database_url.clone().filter(|url| !url.trim().is_empty()),
            migrations_dir: self.migrations_dir.clone(),
            migrations_table: self.table.clone(),
            ..MigrateConfig::default()
        }
    }

    fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            format: self.log_format,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init_logging(&cli.logging_config())
        .map_err(|e| anyhow!("failed to initialize logging: {}", e))?;

    let config = cli.migrate_config();
    config.validate()?;

    match cli.command {
        Commands::Create { name } => migrate::create(&config, &name)?,
        Commands::Up => migrate::up(&config).await?,
        Commands::Down => migrate::down(&config).await?,
        Commands::Status => migrate::status(&config).await?,
        Commands::Version => migrate::version(&config).await?,
    }

    Ok(())
}
