//! Feedback Box: write-only visitor feedback.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  clock::Clock,
  document::to_document,
  store::{DocumentStore, collections::FEEDBACK},
};

/// A submitted form as it arrives; every field is optional until validated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackForm {
  pub name:    Option<String>,
  pub email:   Option<String>,
  pub message: Option<String>,
  pub rating:  Option<f64>,
  pub udid:    Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
  pub name:       String,
  pub email:      String,
  pub message:    String,
  pub rating:     f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub udid:       Option<String>,
  #[serde(with = "crate::timestamp")]
  pub created_at: DateTime<Utc>,
}

pub struct FeedbackBox<S> {
  store: Arc<S>,
  clock: Arc<dyn Clock>,
}

impl<S: DocumentStore> FeedbackBox<S> {
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self { Self { store, clock } }

  pub async fn submit(&self, form: FeedbackForm) -> Result<Feedback> {
    let (Some(name), Some(email), Some(message)) = (
      required(form.name),
      required(form.email),
      required(form.message),
    ) else {
      return Err(Error::Validation("Name, email, and message are required".into()));
    };

    let feedback = Feedback {
      name,
      email,
      message,
      rating: form.rating.unwrap_or(0.0),
      udid: form.udid.filter(|u| !u.is_empty()),
      created_at: self.clock.now(),
    };
    self
      .store
      .insert_one(FEEDBACK, to_document(&feedback)?)
      .await
      .map_err(Error::store)?;

    tracing::info!(
      rating = feedback.rating,
      has_udid = feedback.udid.is_some(),
      "feedback received"
    );
    Ok(feedback)
  }
}

fn required(field: Option<String>) -> Option<String> {
  field.filter(|s| !s.trim().is_empty())
}
