//! Achievement Book: per-user unlocked achievements.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  clock::Clock,
  document::{Filter, FindOptions, Sort, from_document, to_document},
  store::{
    DocumentStore,
    collections::{USER_ACHIEVEMENTS, USERS},
  },
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
  pub user_udid:      String,
  pub achievement_id: String,
  #[serde(with = "crate::timestamp")]
  pub unlocked_at:    DateTime<Utc>,
}

pub struct AchievementBook<S> {
  store: Arc<S>,
  clock: Arc<dyn Clock>,
}

impl<S: DocumentStore> AchievementBook<S> {
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self { Self { store, clock } }

  pub async fn install(&self) -> Result<()> {
    self
      .store
      .ensure_index(USER_ACHIEVEMENTS, "user_udid")
      .await
      .map_err(Error::store)
  }

  /// Unlock `achievement_id` for `udid`. Unlocking twice is harmless: the
  /// second call returns the original record and `false`.
  pub async fn unlock(&self, udid: &str, achievement_id: &str) -> Result<(Achievement, bool)> {
    if achievement_id.trim().is_empty() {
      return Err(Error::Validation("Achievement ID is required".into()));
    }
    self.require_user(udid).await?;

    let filter = Filter::new()
      .eq("user_udid", udid)
      .eq("achievement_id", achievement_id);
    if let Some(doc) = self
      .store
      .find_one(USER_ACHIEVEMENTS, &filter)
      .await
      .map_err(Error::store)?
    {
      return Ok((from_document(doc)?, false));
    }

    let achievement = Achievement {
      user_udid:      udid.to_owned(),
      achievement_id: achievement_id.to_owned(),
      unlocked_at:    self.clock.now(),
    };
    self
      .store
      .insert_one(USER_ACHIEVEMENTS, to_document(&achievement)?)
      .await
      .map_err(Error::store)?;

    tracing::info!(udid, achievement_id, "achievement unlocked");
    Ok((achievement, true))
  }

  /// Everything `udid` has unlocked, earliest first.
  pub async fn list(&self, udid: &str) -> Result<Vec<Achievement>> {
    self.require_user(udid).await?;

    let docs = self
      .store
      .find_many(
        USER_ACHIEVEMENTS,
        &Filter::new().eq("user_udid", udid),
        &FindOptions::new().sort(Sort::ascending("unlocked_at")),
      )
      .await
      .map_err(Error::store)?;

    docs
      .into_iter()
      .map(|d| from_document(d).map_err(Error::from))
      .collect()
  }

  async fn require_user(&self, udid: &str) -> Result<()> {
    let n = self
      .store
      .count(USERS, &Filter::new().eq("udid", udid))
      .await
      .map_err(Error::store)?;
    if n == 0 {
      return Err(Error::NotFound("User not found".into()));
    }
    Ok(())
  }
}
