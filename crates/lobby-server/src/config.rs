//! Runtime server configuration, deserialised from `config.toml` and
//! `LOBBY__*` environment variables.

use std::{path::PathBuf, time::Duration};

use lobby_core::settings::LobbySettings;
use serde::Deserialize;
use thiserror::Error;

/// A setting that parses but cannot run the lobby.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("lobby.max_chat_messages must be at least 1")]
  ZeroChatBound,

  #[error("lobby.presence_window_secs must be at least 1")]
  ZeroPresenceWindow,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:  String,
  pub port:  u16,
  pub store: StoreConfig,
  pub lobby: LobbySettings,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:  "0.0.0.0".to_owned(),
      port:  5000,
      store: StoreConfig::default(),
      lobby: LobbySettings::default(),
    }
  }
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  /// Reject settings under which every chat message or heartbeat would be
  /// discarded as soon as it is written.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.lobby.max_chat_messages == 0 {
      return Err(ConfigError::ZeroChatBound);
    }
    if self.lobby.presence_window_secs == 0 {
      return Err(ConfigError::ZeroPresenceWindow);
    }
    Ok(())
  }
}

/// Where the persistent store lives. Without a `path` the server runs on the
/// in-memory store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  pub path:                 Option<PathBuf>,
  pub connect_timeout_secs: u64,
}

impl Default for StoreConfig {
  fn default() -> Self { Self { path: None, connect_timeout_secs: 5 } }
}

impl StoreConfig {
  pub fn connect_timeout(&self) -> Duration { Duration::from_secs(self.connect_timeout_secs) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_config_uses_defaults() {
    let cfg: ServerConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(cfg.address(), "0.0.0.0:5000");
    assert!(cfg.store.path.is_none());
    assert_eq!(cfg.store.connect_timeout(), Duration::from_secs(5));
    assert_eq!(cfg.lobby, LobbySettings::default());
  }

  #[test]
  fn defaults_are_valid() {
    assert_eq!(ServerConfig::default().validate(), Ok(()));
  }

  #[test]
  fn zero_chat_bound_is_rejected() {
    let cfg: ServerConfig =
      serde_json::from_str(r#"{ "lobby": { "max_chat_messages": 0 } }"#).unwrap();
    assert_eq!(cfg.validate(), Err(ConfigError::ZeroChatBound));
  }

  #[test]
  fn zero_presence_window_is_rejected() {
    let cfg: ServerConfig =
      serde_json::from_str(r#"{ "lobby": { "presence_window_secs": 0 } }"#).unwrap();
    assert_eq!(cfg.validate(), Err(ConfigError::ZeroPresenceWindow));
  }

  #[test]
  fn nested_sections_override_individually() {
    let cfg: ServerConfig = serde_json::from_str(
      r#"{ "port": 8080, "store": { "path": "/tmp/lobby.db" }, "lobby": { "max_chat_messages": 50 } }"#,
    )
    .unwrap();
    assert_eq!(cfg.host, "0.0.0.0");
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.store.path.as_deref(), Some(std::path::Path::new("/tmp/lobby.db")));
    assert_eq!(cfg.store.connect_timeout_secs, 5);
    assert_eq!(cfg.lobby.max_chat_messages, 50);
    assert_eq!(cfg.lobby.presence_window_secs, 300);
  }
}
