//! Handlers for `/user` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/user` | Body: `{"name":"..."}`; 201, 400 empty name, 409 taken |
//! | `GET`  | `/user/{udid}` | 404 if not found |
//! | `GET`  | `/user/{udid}/achievements` | Unlocked achievements, earliest first |
//! | `POST` | `/user/{udid}/achievements` | Body: `{"achievement_id":"..."}`; 201 new, 200 repeat |

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use lobby_core::{achievement::Achievement, registry::User, store::DocumentStore};
use serde::Deserialize;

use crate::{ApiState, error::ApiError};

// ─── Register ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub name: Option<String>,
}

/// `POST /user`
pub async fn register<S: DocumentStore>(
  State(state): State<ApiState<S>>,
  payload: Result<Json<RegisterBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
  let Json(body) = payload?;
  let user = state
    .lobby
    .users
    .register(body.name.as_deref().unwrap_or_default())
    .await?;
  Ok((StatusCode::CREATED, Json(user)))
}

// ─── Lookup ───────────────────────────────────────────────────────────────────

/// `GET /user/{udid}`
pub async fn lookup<S: DocumentStore>(
  State(state): State<ApiState<S>>,
  Path(udid): Path<String>,
) -> Result<Json<User>, ApiError> {
  Ok(Json(state.lobby.users.lookup(&udid).await?))
}

// ─── Achievements ─────────────────────────────────────────────────────────────

/// `GET /user/{udid}/achievements`
pub async fn list_achievements<S: DocumentStore>(
  State(state): State<ApiState<S>>,
  Path(udid): Path<String>,
) -> Result<Json<Vec<Achievement>>, ApiError> {
  Ok(Json(state.lobby.achievements.list(&udid).await?))
}

#[derive(Debug, Deserialize)]
pub struct UnlockBody {
  pub achievement_id: Option<String>,
}

/// `POST /user/{udid}/achievements`
pub async fn unlock_achievement<S: DocumentStore>(
  State(state): State<ApiState<S>>,
  Path(udid): Path<String>,
  payload: Result<Json<UnlockBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
  let Json(body) = payload?;
  let (achievement, created) = state
    .lobby
    .achievements
    .unlock(&udid, body.achievement_id.as_deref().unwrap_or_default())
    .await?;
  let status = if created { StatusCode::CREATED } else { StatusCode::OK };
  Ok((status, Json(achievement)))
}
