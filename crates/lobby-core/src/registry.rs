//! User Registry: display name to generated UDID.
//!
//! Name uniqueness is a read-then-write check, not a store constraint. Two
//! concurrent registrations of the same name can both succeed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  clock::Clock,
  document::{Filter, from_document, to_document},
  store::{DocumentStore, collections::USERS},
};

pub const NAME_TAKEN: &str = "Username already taken. Please choose a different name.";

/// A registered visitor. Never mutated or deleted once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub name:       String,
  pub udid:       String,
  #[serde(with = "crate::timestamp")]
  pub created_at: DateTime<Utc>,
}

pub struct UserRegistry<S> {
  store: Arc<S>,
  clock: Arc<dyn Clock>,
}

impl<S: DocumentStore> UserRegistry<S> {
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self { Self { store, clock } }

  /// Register `name` (trimmed) and hand out a fresh UDID.
  pub async fn register(&self, name: &str) -> Result<User> {
    let name = name.trim();
    if name.is_empty() {
      return Err(Error::Validation("Name is required".into()));
    }

    let existing = self
      .store
      .find_one(USERS, &Filter::new().eq("name", name))
      .await
      .map_err(Error::store)?;
    if existing.is_some() {
      return Err(Error::Conflict(NAME_TAKEN.into()));
    }

    let user = User {
      name:       name.to_owned(),
      udid:       Uuid::new_v4().to_string(),
      created_at: self.clock.now(),
    };
    self
      .store
      .insert_one(USERS, to_document(&user)?)
      .await
      .map_err(Error::store)?;

    tracing::info!(udid = %user.udid, name = %user.name, "registered user");
    Ok(user)
  }

  pub async fn lookup(&self, udid: &str) -> Result<User> {
    let doc = self
      .store
      .find_one(USERS, &Filter::new().eq("udid", udid))
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound("User not found".into()))?;
    Ok(from_document(doc)?)
  }
}
