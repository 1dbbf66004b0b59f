//! [`Lobby`]: every component over one shared store handle.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};

use crate::{
  Error, Result,
  achievement::AchievementBook,
  chat::ChatLog,
  clock::Clock,
  feedback::FeedbackBox,
  presence::PresenceTracker,
  registry::UserRegistry,
  document::Filter,
  settings::LobbySettings,
  store::{DocumentStore, collections},
};

/// The collections reported by [`Lobby::collection_counts`].
const COUNTED: [&str; 5] = [
  collections::USERS,
  collections::ACTIVE_USERS,
  collections::CHAT_MESSAGES,
  collections::FEEDBACK,
  collections::USER_ACHIEVEMENTS,
];

pub struct Lobby<S> {
  pub users:        UserRegistry<S>,
  pub presence:     PresenceTracker<S>,
  pub chat:         ChatLog<S>,
  pub feedback:     FeedbackBox<S>,
  pub achievements: AchievementBook<S>,
  store:            Arc<S>,
  clock:            Arc<dyn Clock>,
}

impl<S: DocumentStore> Lobby<S> {
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, settings: &LobbySettings) -> Self {
    Self {
      users:        UserRegistry::new(store.clone(), clock.clone()),
      presence:     PresenceTracker::new(store.clone(), clock.clone(), settings.presence_window()),
      chat:         ChatLog::new(store.clone(), clock.clone(), settings.max_chat_messages),
      feedback:     FeedbackBox::new(store.clone(), clock.clone()),
      achievements: AchievementBook::new(store.clone(), clock.clone()),
      store,
      clock,
    }
  }

  /// Install the presence expiry rule and the secondary indexes.
  pub async fn install(&self) -> Result<()> {
    self.presence.install().await?;
    self.chat.install().await?;
    self.achievements.install().await?;
    Ok(())
  }

  pub fn now(&self) -> DateTime<Utc> { self.clock.now() }

  /// Live document count of every lobby collection. Expired presence records
  /// are not counted.
  pub async fn collection_counts(&self) -> Result<BTreeMap<&'static str, u64>> {
    let mut counts = BTreeMap::new();
    for collection in COUNTED {
      let n = self
        .store
        .count(collection, &Filter::new())
        .await
        .map_err(Error::store)?;
      counts.insert(collection, n);
    }
    Ok(counts)
  }
}
