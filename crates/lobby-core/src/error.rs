//! Error types for `lobby-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Missing or empty required input.
  #[error("{0}")]
  Validation(String),

  /// The request clashes with existing state (e.g. a taken display name).
  #[error("{0}")]
  Conflict(String),

  #[error("{0}")]
  NotFound(String),

  /// The backing store failed or was unreachable.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// A stored record could not be converted to or from its document form.
  #[error("malformed record: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Error::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
