//! JSON REST API for the lobby.
//!
//! Exposes an axum [`Router`] backed by any [`lobby_core::store::DocumentStore`].
//! CORS, tracing layers and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", lobby_api::api_router(state))
//! ```

pub mod chat;
pub mod error;
pub mod feedback;
pub mod health;
pub mod presence;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use lobby_core::{Lobby, store::DocumentStore};

pub use error::ApiError;

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub lobby:   Arc<Lobby<S>>,
  /// Which backend is serving; reported by the health check.
  pub backend: &'static str,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self { lobby: self.lobby.clone(), backend: self.backend }
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: DocumentStore + 'static,
{
  Router::new()
    // Users
    .route("/user", post(users::register::<S>))
    .route("/user/{udid}", get(users::lookup::<S>))
    .route(
      "/user/{udid}/achievements",
      get(users::list_achievements::<S>).post(users::unlock_achievement::<S>),
    )
    // Presence
    .route("/users/active", get(presence::list::<S>).post(presence::mark::<S>))
    // Chat
    .route("/chat/messages", get(chat::recent::<S>).post(chat::append::<S>))
    // Feedback
    .route("/feedback", post(feedback::submit::<S>))
    // Health
    .route("/health", get(health::handler::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
