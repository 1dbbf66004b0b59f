//! Handlers for `/chat/messages`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/chat/messages` | Retained messages, oldest first |
//! | `POST` | `/chat/messages` | Body: `{"user":"...","message":"...","udid":"..."?}`; 201 |

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use lobby_core::{chat::ChatMessage, store::DocumentStore};
use serde::Deserialize;

use crate::{ApiState, error::ApiError};

/// `GET /chat/messages`
pub async fn recent<S: DocumentStore>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
  Ok(Json(state.lobby.chat.recent().await?))
}

#[derive(Debug, Deserialize)]
pub struct AppendBody {
  pub user:    Option<String>,
  pub message: Option<String>,
  pub udid:    Option<String>,
}

/// `POST /chat/messages`
pub async fn append<S: DocumentStore>(
  State(state): State<ApiState<S>>,
  payload: Result<Json<AppendBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
  let Json(body) = payload?;
  let message = state
    .lobby
    .chat
    .append(
      body.user.as_deref().unwrap_or_default(),
      body.message.as_deref().unwrap_or_default(),
      body.udid.as_deref(),
    )
    .await?;
  Ok((StatusCode::CREATED, Json(message)))
}
