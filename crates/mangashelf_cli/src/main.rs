//! Command-line front end over `mangashelf_core`.
//!
//! # Responsibility
//! - Open a library database and print per-user series/volume listings as JSON.
//! - Start core file logging when a log directory is configured.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use mangashelf_core::db::open_db;
use mangashelf_core::{
    core_version, default_log_level, init_logging, AsyncSeriesRepository, LoggingConfig,
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "mangashelf",
    version,
    about = "Query a MangaShelf library database"
)]
struct Cli {
    /// Path to the SQLite library database
    #[arg(long, global = true, env = "MANGASHELF_DB", default_value = "mangashelf.db")]
    db: PathBuf,

    /// Core log level (trace|debug|info|warn|error)
    #[arg(long, global = true, env = "MANGASHELF_LOG_LEVEL")]
    log_level: Option<String>,

    /// Absolute directory for rotating log files; logging stays off when unset
    #[arg(long, global = true, env = "MANGASHELF_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the series of a library with the user's progress and rating
    Series {
        #[arg(long)]
        library: Uuid,
        #[arg(long)]
        user: Uuid,
    },
    /// List the volumes of a series with the user's progress
    Volumes {
        #[arg(long)]
        series: Uuid,
        #[arg(long)]
        user: Uuid,
    },
    /// Print the core version
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        let config = LoggingConfig::new(level, log_dir)?;
        init_logging(config).context("failed to start logging")?;
    }

    match cli.command {
        Commands::Version => {
            println!("mangashelf_core version={}", core_version());
            Ok(())
        }
        Commands::Series { library, user } => {
            let repo = open_repository(&cli.db)?;
            let series = repo.get_series_dto_for_library_id(library, user).await?;
            info!("event=cli_series module=cli status=ok count={}", series.len());
            print_json(&series)
        }
        Commands::Volumes { series, user } => {
            let repo = open_repository(&cli.db)?;
            let volumes = repo.get_volumes_dto(series, user).await?;
            info!("event=cli_volumes module=cli status=ok count={}", volumes.len());
            print_json(&volumes)
        }
    }
}

fn open_repository(path: &Path) -> Result<AsyncSeriesRepository> {
    let conn = open_db(path)
        .with_context(|| format!("failed to open library database {}", path.display()))?;
    Ok(AsyncSeriesRepository::try_new(conn)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
