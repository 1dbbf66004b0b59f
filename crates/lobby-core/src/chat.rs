//! Chat Log: append-only with oldest-first eviction past a fixed bound.
//!
//! After each append the log is trimmed back to `max_messages` by deleting
//! the oldest records. Insert and trim are separate store calls, so
//! concurrent appends can briefly overshoot the bound.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  Error, Result,
  clock::Clock,
  document::{Filter, FindOptions, ID_FIELD, Sort, from_document, to_document},
  store::{DocumentStore, collections::CHAT_MESSAGES},
};

const TIMESTAMP: &str = "timestamp";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
  /// Display name of the author (not their UDID).
  pub user:      String,
  pub message:   String,
  #[serde(default)]
  pub udid:      String,
  #[serde(with = "crate::timestamp")]
  pub timestamp: DateTime<Utc>,
}

pub struct ChatLog<S> {
  store:        Arc<S>,
  clock:        Arc<dyn Clock>,
  max_messages: usize,
}

impl<S: DocumentStore> ChatLog<S> {
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, max_messages: usize) -> Self {
    Self { store, clock, max_messages }
  }

  pub async fn install(&self) -> Result<()> {
    self
      .store
      .ensure_index(CHAT_MESSAGES, TIMESTAMP)
      .await
      .map_err(Error::store)
  }

  pub async fn append(&self, user: &str, message: &str, udid: Option<&str>) -> Result<ChatMessage> {
    if user.trim().is_empty() || message.trim().is_empty() {
      return Err(Error::Validation("User and message are required".into()));
    }

    let msg = ChatMessage {
      user:      user.to_owned(),
      message:   message.to_owned(),
      udid:      udid.unwrap_or_default().to_owned(),
      timestamp: self.clock.now(),
    };
    self
      .store
      .insert_one(CHAT_MESSAGES, to_document(&msg)?)
      .await
      .map_err(Error::store)?;

    self.trim().await?;
    Ok(msg)
  }

  /// The retained messages, oldest first.
  pub async fn recent(&self) -> Result<Vec<ChatMessage>> {
    let docs = self
      .store
      .find_many(
        CHAT_MESSAGES,
        &Filter::new(),
        &FindOptions::new()
          .sort(Sort::descending(TIMESTAMP))
          .limit(self.max_messages),
      )
      .await
      .map_err(Error::store)?;

    let mut messages = docs
      .into_iter()
      .map(from_document)
      .collect::<Result<Vec<ChatMessage>, _>>()?;
    messages.reverse();
    Ok(messages)
  }

  async fn trim(&self) -> Result<()> {
    let count = self
      .store
      .count(CHAT_MESSAGES, &Filter::new())
      .await
      .map_err(Error::store)?;
    let excess = usize::try_from(count)
      .unwrap_or(usize::MAX)
      .saturating_sub(self.max_messages);
    if excess == 0 {
      return Ok(());
    }

    let oldest = self
      .store
      .find_many(
        CHAT_MESSAGES,
        &Filter::new(),
        &FindOptions::new()
          .project([ID_FIELD])
          .sort(Sort::ascending(TIMESTAMP))
          .limit(excess),
      )
      .await
      .map_err(Error::store)?;

    for doc in oldest {
      let Some(Value::String(id)) = doc.get(ID_FIELD) else { continue };
      self
        .store
        .delete_one(CHAT_MESSAGES, &Filter::by_id(id.as_str()))
        .await
        .map_err(Error::store)?;
    }

    tracing::debug!(evicted = excess, "trimmed chat log");
    Ok(())
  }
}
