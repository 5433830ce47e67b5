//! rostersync maintenance CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rostersync::config::{Config, COLLECTIONS};
use rostersync::context::{reset_cache, SyncContext};

/// Inspect and reset the local roster cache
#[derive(Parser, Debug)]
#[command(name = "rostersync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory holding the cache database
    #[arg(long, global = true, env = "ROSTERSYNC_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Database name
    #[arg(long, global = true, env = "ROSTERSYNC_DB_NAME")]
    name: Option<String>,

    /// Output format
    #[arg(long, short, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Open the cache and print its name, version, path and row counts.
    Info,
    /// Delete the cache database. The next run reloads everything.
    Reset,
}

#[derive(Debug, Serialize)]
struct CacheInfo {
    name: String,
    version: u32,
    path: Option<PathBuf>,
    collections: Vec<CollectionInfo>,
}

#[derive(Debug, Serialize)]
struct CollectionInfo {
    name: &'static str,
    count: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rostersync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::from_env();
    if let Some(cache_dir) = cli.cache_dir {
        config.cache_dir = cache_dir;
    }
    if let Some(name) = cli.name {
        config.db_name = name;
    }

    match cli.command {
        Commands::Info => {
            let info = cache_info(&config).await?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&info)?),
                OutputFormat::Pretty => print_info(&info),
            }
        }
        Commands::Reset => {
            reset_cache(&config).await?;
            println!("Deleted cache {}", config.db_name);
        }
    }

    Ok(())
}

async fn cache_info(config: &Config) -> Result<CacheInfo> {
    let context = SyncContext::open(config).await?;
    let database = context.database();

    let mut collections = Vec::with_capacity(COLLECTIONS.len());
    for name in COLLECTIONS {
        let count = database.count(name).await?;
        collections.push(CollectionInfo { name, count });
    }

    Ok(CacheInfo {
        name: database.name().to_string(),
        version: database.version(),
        path: database.path(),
        collections,
    })
}

fn print_info(info: &CacheInfo) {
    println!("Name:    {}", info.name);
    println!("Version: {}", info.version);
    if let Some(path) = &info.path {
        println!("Path:    {}", path.display());
    }
    println!("Collections:");
    for collection in &info.collections {
        println!("  {:<16} {}", collection.name, collection.count);
    }
}
