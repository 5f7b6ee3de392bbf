//! deadtext server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) plus `DEADTEXT_*`
//! environment variables, opens the SQLite check-in store, starts the
//! escalation scheduler and serves the JSON API over HTTP.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `auth_password_hash`:
//!
//! ```sh
//! cargo run -p deadtext-server -- --hash-password
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use deadtext_api::{ApiState, AuthConfig};
use deadtext_engine::Engine;
use deadtext_server::{AppNotifier, ServerConfig, driver};
use deadtext_store_sqlite::SqliteStore;
use rand_core::OsRng;
use tokio::{net::TcpListener, sync::watch};
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "deadtext check-in and escalation server")]
struct Cli {
  /// TOML configuration file; missing is fine when env vars suffice.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Read a password from stdin, print its argon2 PHC hash and exit.
  #[arg(long)]
  hash_password: bool,
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

  if cli.hash_password {
    println!("{}", hash_password(&read_password()?)?);
    return Ok(());
  }

  let server_cfg = ServerConfig::load(
    config::Config::builder()
      .add_source(config::File::from(cli.config).required(false)),
  )?;
  let engine_cfg = server_cfg.engine_config()?;

  let store_path = server_cfg.resolved_store_path();
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("cannot open check-in store {}", store_path.display()))?,
  );

  let notifier = AppNotifier::from_webhook_url(server_cfg.webhook_url.as_deref());
  tracing::info!(notifier = notifier.kind(), "notifier configured");

  // Scheduler.
  let engine = Arc::new(Engine::new(store.clone(), Arc::new(notifier), engine_cfg));
  let (stop_tx, stop_rx) = watch::channel(false);
  let scheduler = tokio::spawn(driver::run(
    engine,
    server_cfg.cycle_interval(),
    stop_rx,
  ));

  // HTTP API.
  let state = ApiState::new(store, AuthConfig {
    username:      server_cfg.auth_username.clone(),
    password_hash: server_cfg.auth_password_hash.clone(),
  });
  let app = deadtext_api::api_router(state).layer(TraceLayer::new_for_http());
  let address = server_cfg.address();

  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("cannot listen on {address}"))?;
  tracing::info!(%address, "api listening");

  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      tokio::signal::ctrl_c().await.ok();
      tracing::info!("shutdown requested");
    })
    .await
    .context("server error")?;

  stop_tx.send(true).ok();
  scheduler.await.context("scheduler task panicked")?;

  Ok(())
}

fn hash_password(password: &str) -> anyhow::Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| anyhow::anyhow!("cannot hash password: {e}"))
}

/// Prompt on stderr and read one line from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::Write as _;
  eprint!("Password: ");
  std::io::stderr().flush().ok();
  let mut line = String::new();
  std::io::stdin().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
