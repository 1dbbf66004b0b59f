//! Handler for `POST /feedback`.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use lobby_core::{feedback::FeedbackForm, store::DocumentStore};
use serde_json::json;

use crate::{ApiState, error::ApiError};

/// `POST /feedback`, body: `{"name","email","message","rating"?,"udid"?}`
pub async fn submit<S: DocumentStore>(
  State(state): State<ApiState<S>>,
  payload: Result<Json<FeedbackForm>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
  let Json(form) = payload?;
  state.lobby.feedback.submit(form).await?;
  Ok((StatusCode::CREATED, Json(json!({ "status": "success" }))))
}
