//! hse-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `HSE_*` environment variables, opens the SQLite store and serves the JSON
//! API over HTTP.
//!
//! # Subcommands
//!
//! ```text
//! hse-server                         # same as `serve`
//! hse-server hash-password           # print an argon2 hash for config.toml
//! hse-server seed-periods --year 2026
//! hse-server export --out plan.xlsx
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use chrono::Utc;
use clap::{Parser, Subcommand};
use hse_server::{ServerConfig, auth::hash_password};
use hse_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "HSE KPI tracker server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API (default).
  Serve,
  /// Print the argon2 hash for a password entered on stdin and exit.
  HashPassword,
  /// Create the monthly periods of a year that do not exist yet.
  SeedPeriods {
    #[arg(long)]
    year: i32,
  },
  /// Write the monitoring-plan workbook to a file.
  Export {
    /// Output path; defaults to the dated file name in the working directory.
    #[arg(long)]
    out: Option<PathBuf>,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  match cli.command.unwrap_or(Command::Serve) {
    Command::HashPassword => {
      let password = rpassword_or_stdin()?;
      let hash = hash_password(&password).map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
      println!("{hash}");
      Ok(())
    }
    Command::Serve => {
      let server_cfg = load_config(&cli.config)?;
      let store = open_store(&server_cfg).await?;
      serve(store, &server_cfg).await
    }
    Command::SeedPeriods { year } => {
      let server_cfg = load_config(&cli.config)?;
      let store = open_store(&server_cfg).await?;
      let created = hse_api::catalog::seed_year(&store, year)
        .await
        .with_context(|| format!("failed to seed periods for {year}"))?;
      tracing::info!(year, created = created.len(), "seeded monthly periods");
      Ok(())
    }
    Command::Export { out } => {
      let server_cfg = load_config(&cli.config)?;
      let store = open_store(&server_cfg).await?;
      let out = out.unwrap_or_else(|| PathBuf::from(hse_export::file_name(Utc::now().date_naive())));
      let bytes = hse_export::export_xlsx(&store, &server_cfg.export)
        .await
        .context("failed to build the monitoring plan")?;
      tokio::fs::write(&out, &bytes)
        .await
        .with_context(|| format!("failed to write {out:?}"))?;
      tracing::info!(path = ?out, bytes = bytes.len(), "monitoring plan exported");
      Ok(())
    }
  }
}

/// Open the SQLite store named in the config, creating its directory.
async fn open_store(server_cfg: &ServerConfig) -> anyhow::Result<SqliteStore> {
  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))
}

async fn serve(store: SqliteStore, server_cfg: &ServerConfig) -> anyhow::Result<()> {
  if server_cfg.users.is_empty() {
    tracing::warn!("no users configured; every API request will be rejected");
  }

  let app = hse_server::app(Arc::new(store), server_cfg);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
  let settings = config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(
      config::Environment::with_prefix("HSE")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")
}

/// Read a password from stdin.
fn rpassword_or_stdin() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
