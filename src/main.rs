mod app;
mod cache;
mod config;
mod dispatch;
mod error;
mod format;
mod model;
mod queue;
mod remote;
mod status;
mod store;
mod sync;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "finq")]
#[command(about = "An offline-first CLI client for a personal finance tracker")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/finq/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
  /// Add a financial record
  Add {
    /// Amount, e.g. "1234.56" or "R$ 1.234,56"
    amount: String,
    /// Description
    description: String,
    /// Date (YYYY-MM-DD or DD/MM/YYYY); defaults to today
    #[arg(short, long)]
    date: Option<String>,
    #[arg(short = 'g', long)]
    category: Option<String>,
    #[arg(short = 'k', long)]
    card: Option<String>,
  },
  /// Edit a record by local id
  Edit {
    id: i64,
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    amount: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    card: Option<String>,
  },
  /// Remove a record by local id
  Remove { id: i64 },
  /// List records
  List,
  /// Run one synchronization pass
  Sync,
  /// Show connectivity, pending queue and cache state
  Status,
  /// List category/card names, optionally adding new ones
  Names {
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    card: Option<String>,
  },
  /// Drop all cached query results
  ClearCache,
  /// Monitor connectivity and sync automatically when it returns
  Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_logging()?;

  let config = config::Config::load(args.config.as_deref())?;
  let app = app::App::new(config).await?;

  match args.command {
    Cmd::Add {
      amount,
      description,
      date,
      category,
      card,
    } => app.add(date, amount, description, category, card).await,
    Cmd::Edit {
      id,
      date,
      amount,
      description,
      category,
      card,
    } => app.edit(id, date, amount, description, category, card).await,
    Cmd::Remove { id } => app.remove(id).await,
    Cmd::List => app.list().await,
    Cmd::Sync => app.sync_once().await,
    Cmd::Status => app.status().await,
    Cmd::Names { category, card } => app.names(category, card).await,
    Cmd::ClearCache => app.clear_cache(),
    Cmd::Watch => app.watch().await,
  }
}

/// Log to a file under the data directory; the terminal stays clean for
/// command output. `RUST_LOG` controls the filter.
fn init_logging() -> Result<tracing_appender::non_blocking::WorkerGuard> {
  let dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .map(|p| p.join("finq").join("logs"))
    .unwrap_or_else(|| PathBuf::from("."));

  let appender = tracing_appender::rolling::daily(dir, "finq.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}
