use std::{process::ExitCode, sync::Arc, time::Duration};

use clap::Parser;
use tessera::{CleanupConfig, SqliteRepositoryProvider, Tessera, TesseraError};
use tracing_subscriber::EnvFilter;

/// Command line interface for Tessera
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database connection string
    #[arg(long, env = "TESSERA_DATABASE_URL")]
    db_url: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(clap::Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Delete sessions idle for longer than the retention window
    Cleanup {
        /// Retention window in seconds
        #[arg(long, env = "TESSERA_SESSION_RETENTION", default_value_t = 2 * 24 * 60 * 60)]
        retention_secs: u64,
    },
    /// Print version information
    Version,
}

async fn connect(db_url: Option<&str>) -> Result<Tessera<SqliteRepositoryProvider>, TesseraError> {
    let db_url = db_url.ok_or_else(|| {
        TesseraError::ConfigError("--db-url or TESSERA_DATABASE_URL is required".to_string())
    })?;
    let repositories = SqliteRepositoryProvider::connect(db_url).await?;
    Ok(Tessera::new(Arc::new(repositories)))
}

async fn run(cli: Cli) -> Result<(), TesseraError> {
    match cli.command {
        Commands::Migrate => {
            let tessera = connect(cli.db_url.as_deref()).await?;
            tracing::info!("Running migrations");
            tessera.migrate().await?;
            println!("Migrations applied");
        }
        Commands::Cleanup { retention_secs } => {
            let tessera = connect(cli.db_url.as_deref()).await?.with_cleanup_config(
                CleanupConfig::default().with_retention(Duration::from_secs(retention_secs)),
            );
            let count = tessera.cleanup_sessions().await?;
            println!("Deleted {count} idle sessions");
        }
        Commands::Version => {
            println!("Tessera v{}", env!("CARGO_PKG_VERSION"));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}
