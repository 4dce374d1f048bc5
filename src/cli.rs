//! # Command Line Interface
//!
//! `serve` (the default) runs the HTTP API; `migrate` and `migrations` manage the
//! embedded schema without needing a signing secret.

use crate::api::{start_api_server, ApiState};
use crate::config::{AppConfig, DatabaseConfig, ObservabilityConfig};
use crate::observability::{init_observability, log_config_info};
use crate::storage::{create_pool, list_applied_migrations, run_migrations, validate_migrations};
use crate::{APP_NAME, VERSION};
use clap::{Parser, Subcommand};
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(name = "sessionward")]
#[command(about = "Credential and session-lifecycle service")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Database URL override
    #[arg(long)]
    pub database_url: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Start the HTTP API server
    Serve,

    /// Apply pending migrations
    Migrate,

    /// List applied migrations and check the schema is current
    Migrations,
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let observability = ObservabilityConfig::from_env();
    init_observability(&observability).await?;

    tracing::info!(app_name = APP_NAME, version = VERSION, "Starting sessionward");

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let mut config = AppConfig::from_env()?;
            config.observability = observability;
            if let Some(url) = cli.database_url {
                config.database.url = url;
                config.validate()?;
            }
            serve(config).await?;
        }
        Commands::Migrate => migrate(&migration_database(cli.database_url)).await?,
        Commands::Migrations => migration_status(&migration_database(cli.database_url)).await?,
    }

    Ok(())
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    log_config_info(&config);

    let pool = create_pool(&config.database).await?;
    let state = ApiState::new(pool, &config)?;

    if let (Some(email), Some(password)) =
        (&config.auth.bootstrap_admin_email, &config.auth.bootstrap_admin_password)
    {
        state.login_service.ensure_bootstrap_admin(email, Zeroizing::new(password.clone())).await?;
    }

    start_api_server(&config, state).await?;
    Ok(())
}

/// Schema commands never auto-migrate and do not need the rest of the configuration.
fn migration_database(database_url: Option<String>) -> DatabaseConfig {
    let mut database = DatabaseConfig::from_env();
    if let Some(url) = database_url {
        database.url = url;
    }
    database.auto_migrate = false;
    database
}

async fn migrate(config: &DatabaseConfig) -> anyhow::Result<()> {
    let pool = create_pool(config).await?;

    println!("Running database migrations...");
    run_migrations(&pool).await?;
    println!("Migrations completed successfully!");
    Ok(())
}

async fn migration_status(config: &DatabaseConfig) -> anyhow::Result<()> {
    let pool = create_pool(config).await?;

    let migrations = list_applied_migrations(&pool).await?;
    if migrations.is_empty() {
        println!("No migrations have been applied");
    } else {
        println!("{:<16} {:<40} {:<20}", "Version", "Description", "Applied On");
        for migration in &migrations {
            println!(
                "{:<16} {:<40} {:<20}",
                migration.version,
                migration.description,
                migration.installed_on.format("%Y-%m-%d %H:%M:%S"),
            );
        }
    }

    if !validate_migrations(&pool).await? {
        anyhow::bail!("database schema has pending or unknown migrations");
    }
    println!("Database schema is up to date");
    Ok(())
}
