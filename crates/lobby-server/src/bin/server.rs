//! lobby server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) plus `LOBBY__*`
//! environment overrides, picks a store backend and serves the JSON API.
//!
//! ```text
//! LOBBY__PORT=8080 LOBBY__STORE__PATH=~/.local/share/lobby.db cargo run -p lobby-server --bin server
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use lobby_api::ApiState;
use lobby_core::{
  Lobby,
  clock::{Clock, SystemClock},
};
use lobby_server::{ServerConfig, backend};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Portfolio lobby server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
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

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("LOBBY")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read configuration")?;

  let mut server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  server_cfg.validate().context("invalid configuration")?;
  server_cfg.store.path = server_cfg.store.path.as_deref().map(expand_tilde);

  // Pick a backend; this never fails, it degrades to memory instead.
  let clock: Arc<dyn Clock> = Arc::new(SystemClock);
  let store = backend::connect(&server_cfg.store, clock.clone()).await;
  let backend = store.kind();

  let lobby = Lobby::new(Arc::new(store), clock, &server_cfg.lobby);
  lobby
    .install()
    .await
    .context("failed to install indexes and expiry rules")?;

  let app = lobby_server::app(ApiState { lobby: Arc::new(lobby), backend });
  let address = server_cfg.address();

  tracing::info!(backend, "Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Resolve a leading `~` against `$HOME`.
fn expand_tilde(path: &Path) -> PathBuf {
  if let Ok(rest) = path.strip_prefix("~")
    && let Some(home) = std::env::var_os("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
