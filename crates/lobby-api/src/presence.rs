//! Handlers for `/users/active`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/users/active` | `[{udid, name}]` inside the presence window |
//! | `POST` | `/users/active` | Body: `{"udid":"...","name":"..."}` heartbeat |

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use lobby_core::{presence::ActiveUser, store::DocumentStore};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{ApiState, error::ApiError};

/// `GET /users/active`
pub async fn list<S: DocumentStore>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Vec<ActiveUser>>, ApiError> {
  Ok(Json(state.lobby.presence.list_active().await?))
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatBody {
  pub udid: Option<String>,
  pub name: Option<String>,
}

/// `POST /users/active`
pub async fn mark<S: DocumentStore>(
  State(state): State<ApiState<S>>,
  payload: Result<Json<HeartbeatBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
  let Json(body) = payload?;
  state
    .lobby
    .presence
    .mark_active(
      body.udid.as_deref().unwrap_or_default(),
      body.name.as_deref().unwrap_or_default(),
    )
    .await?;
  Ok(Json(json!({ "status": "success" })))
}
