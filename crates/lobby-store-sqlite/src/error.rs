//! Error type for `lobby-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("invalid collection or field name: {0:?}")]
  InvalidName(String),

  #[error("duplicate _id {0:?}")]
  DuplicateKey(String),

  #[error("field {0:?} cannot be updated")]
  ImmutableField(String),

  #[error("_id must be a string")]
  InvalidId,

  /// A stored body was not a JSON object.
  #[error("corrupt document in {0:?}")]
  Corrupt(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
