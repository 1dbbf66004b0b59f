//! Presence Tracker: who has sent a heartbeat recently.
//!
//! Expiry is delegated to the store: the tracker installs a time-to-live rule
//! on `last_active` and every backend honours it on read.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  Error, Result,
  clock::Clock,
  document::{Document, Filter, FindOptions, from_document},
  store::{DocumentStore, collections::ACTIVE_USERS},
  timestamp,
};

const LAST_ACTIVE: &str = "last_active";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveUser {
  pub udid: String,
  pub name: String,
}

pub struct PresenceTracker<S> {
  store:  Arc<S>,
  clock:  Arc<dyn Clock>,
  window: Duration,
}

impl<S: DocumentStore> PresenceTracker<S> {
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, window: Duration) -> Self {
    Self { store, clock, window }
  }

  pub async fn install(&self) -> Result<()> {
    self
      .store
      .ensure_expiry(ACTIVE_USERS, LAST_ACTIVE, self.window)
      .await
      .map_err(Error::store)
  }

  /// Record a heartbeat for `udid`, overwriting any earlier one.
  pub async fn mark_active(&self, udid: &str, name: &str) -> Result<()> {
    if udid.trim().is_empty() || name.trim().is_empty() {
      return Err(Error::Validation("UDID and name are required".into()));
    }

    let mut set = Document::new();
    set.insert("name".into(), Value::from(name));
    set.insert(LAST_ACTIVE.into(), Value::from(timestamp::encode(self.clock.now())));

    self
      .store
      .update_one(ACTIVE_USERS, &Filter::new().eq("udid", udid), set, true)
      .await
      .map_err(Error::store)?;
    Ok(())
  }

  /// Everyone whose last heartbeat is inside the presence window. Unordered.
  pub async fn list_active(&self) -> Result<Vec<ActiveUser>> {
    let docs = self
      .store
      .find_many(
        ACTIVE_USERS,
        &Filter::new(),
        &FindOptions::new().project(["udid", "name"]),
      )
      .await
      .map_err(Error::store)?;

    docs
      .into_iter()
      .map(|d| from_document(d).map_err(Error::from))
      .collect()
  }
}
