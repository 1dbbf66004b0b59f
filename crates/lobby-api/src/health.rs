//! Handler for `GET /health`.
//!
//! Reports the live backend, the server clock and a document count per
//! collection. A store that cannot answer the counts turns this into a 500.

use axum::{Json, extract::State};
use lobby_core::{store::DocumentStore, timestamp};
use serde_json::{Value, json};

use crate::{ApiState, error::ApiError};

pub async fn handler<S: DocumentStore>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Value>, ApiError> {
  let collections = state.lobby.collection_counts().await?;
  Ok(Json(json!({
    "status":      "ok",
    "backend":     state.backend,
    "timestamp":   timestamp::encode(state.lobby.now()),
    "collections": collections,
  })))
}
