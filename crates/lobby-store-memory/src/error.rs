//! Error type for `lobby-store-memory`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid collection or field name: {0:?}")]
  InvalidName(String),

  #[error("duplicate _id {0:?}")]
  DuplicateKey(String),

  #[error("field {0:?} cannot be updated")]
  ImmutableField(String),

  #[error("_id must be a string")]
  InvalidId,

  /// A thread panicked while holding the store lock.
  #[error("store lock poisoned")]
  Poisoned,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
