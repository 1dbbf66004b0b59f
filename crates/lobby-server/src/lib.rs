//! Startup plumbing for the lobby server: configuration, backend selection
//! and the top-level router.
//!
//! The binary in `src/bin/server.rs` is a thin wrapper over this crate.

pub mod backend;
pub mod config;

use axum::{Router, http::Method};
use lobby_api::{ApiState, api_router};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

pub use backend::Backend;
pub use config::{ConfigError, ServerConfig, StoreConfig};

/// Build the full application: the API under `/api`, with CORS and request
/// tracing layered on top.
pub fn app(state: ApiState<Backend>) -> Router {
  let cors = CorsLayer::new()
    .allow_origin(Any)
    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
    .allow_headers(Any);

  Router::new()
    .nest("/api", api_router(state))
    .layer(cors)
    .layer(TraceLayer::new_for_http())
}
