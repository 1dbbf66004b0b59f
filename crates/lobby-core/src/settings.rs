//! Tunables for the components, deserialised from the server configuration.

use std::time::Duration;

use serde::Deserialize;

/// How long a presence heartbeat counts a visitor as active.
pub const DEFAULT_PRESENCE_WINDOW_SECS: u64 = 5 * 60;

/// How many chat messages are retained.
pub const DEFAULT_MAX_CHAT_MESSAGES: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LobbySettings {
  pub presence_window_secs: u64,
  pub max_chat_messages:    usize,
}

impl LobbySettings {
  pub fn presence_window(&self) -> Duration { Duration::from_secs(self.presence_window_secs) }
}

impl Default for LobbySettings {
  fn default() -> Self {
    Self {
      presence_window_secs: DEFAULT_PRESENCE_WINDOW_SECS,
      max_chat_messages:    DEFAULT_MAX_CHAT_MESSAGES,
    }
  }
}
