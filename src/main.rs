mod app;
mod cache;
mod city;
mod config;
mod event;
mod source;
mod ui;

use cache::{CityCache, CityStore, MemoryStore, SqliteStore};
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use config::Config;
use source::HttpCitySource;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cityscope")]
#[command(about = "A terminal city finder with an offline search cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/cityscope/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Maximum number of cities shown for a search
  #[arg(short, long)]
  max_results: Option<usize>,

  /// Keep cities in memory only, nothing is written to disk
  #[arg(long)]
  memory: bool,

  /// Delete the city database before starting, forcing a fresh download
  #[arg(long, conflicts_with = "memory")]
  reset: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;

  // Override result cap if specified on command line
  if let Some(max_results) = args.max_results {
    config.max_results = max_results;
    config.validate()?;
  }

  let _log_guard = init_logging(&config)?;
  info!(version = env!("CARGO_PKG_VERSION"), "starting cityscope");

  let source = HttpCitySource::new(&config.source)?;

  if args.memory {
    info!("persistence disabled, using in-memory store");
    return run(MemoryStore::new(), source, &config).await;
  }

  let path = match &config.database {
    Some(p) => p.clone(),
    None => SqliteStore::default_path()?,
  };

  if args.reset && path.exists() {
    std::fs::remove_file(&path)
      .map_err(|e| eyre!("Failed to delete city database {}: {}", path.display(), e))?;
    info!(path = %path.display(), "deleted city database");
  }

  let store = SqliteStore::open(Some(&path))?;
  if let Some(at) = store.bootstrapped_at()? {
    info!(%at, "using cities downloaded earlier");
  }

  run(store, source, &config).await
}

async fn run<S: CityStore + 'static>(store: S, source: HttpCitySource, config: &Config) -> Result<()> {
  let cache = CityCache::new(store, source).with_max_results(config.max_results);

  let mut app = app::App::new(Arc::new(cache));
  app.run().await
}

/// Log to a daily rolling file; the terminal belongs to the UI.
fn init_logging(config: &Config) -> Result<WorkerGuard> {
  let dir = config.log_directory()?;
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(&dir, "cityscope.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cityscope=info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}
