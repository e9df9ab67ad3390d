//! `veracity` server binary.
//!
//! Reads `veracity.toml` (or the path given with `--config`), layers
//! `VERACITY_*` environment variables over it, opens the SQLite store, and
//! serves the JSON API over HTTP.
//!
//! ```text
//! veracity serve
//! veracity recalculate --claim 6f1c... --reason "source retracted"
//! VERACITY_SCORING__CHALLENGE_PENALTY=0.2 veracity
//! ```

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use veracity_core::target::TargetRef;
use veracity_dispatch::VeracityService;
use veracity_server::{ServerConfig, app, spawn_sweeper};
use veracity_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "Veracity scoring server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "veracity.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API (the default).
  Serve,
  /// Force one recalculation, print the committed result, and exit.
  Recalculate(RecalculateArgs),
}

#[derive(Args)]
struct RecalculateArgs {
  #[arg(long, conflicts_with = "relationship", required_unless_present = "relationship")]
  claim:        Option<Uuid>,
  #[arg(long)]
  relationship: Option<Uuid>,
  /// Recorded as the history row's reason.
  #[arg(long)]
  reason:       Option<String>,
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

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("VERACITY")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  server_cfg.scoring.validate().context("invalid [scoring] configuration")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let service = VeracityService::new(
    store,
    server_cfg.scoring.clone(),
    server_cfg.dispatch.clone(),
  );

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(service, &server_cfg).await,
    Command::Recalculate(args) => recalculate(service, args).await,
  }
}

async fn serve(
  service: VeracityService<SqliteStore>,
  cfg: &ServerConfig,
) -> anyhow::Result<()> {
  if cfg.decay_sweep_interval_secs > 0 {
    spawn_sweeper(
      service.clone(),
      Duration::from_secs(cfg.decay_sweep_interval_secs),
    );
  }

  let address = cfg.address();
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app(service.clone()))
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  tracing::info!("draining background recalculations");
  service.wait_idle().await;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
}

async fn recalculate(
  service: VeracityService<SqliteStore>,
  args: RecalculateArgs,
) -> anyhow::Result<()> {
  let target = TargetRef::from_parts(args.claim, args.relationship)?;
  let result = service
    .recalculate(target, args.reason)
    .await
    .with_context(|| format!("recalculation of {target} failed"))?;
  println!("{}", serde_json::to_string_pretty(&result)?);
  Ok(())
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
