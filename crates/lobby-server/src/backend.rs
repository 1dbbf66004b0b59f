//! Backend selection and dispatch.
//!
//! [`connect`] is the only place that decides which store is live. Everything
//! downstream sees a [`Backend`], which forwards each [`DocumentStore`] call to
//! whichever store was chosen.

use std::{future::Future, sync::Arc, time::Duration};

use lobby_core::{
  clock::Clock,
  document::{Document, Filter, FindOptions, UpdateResult},
  store::DocumentStore,
};
use lobby_store_memory::MemoryStore;
use lobby_store_sqlite::SqliteStore;
use thiserror::Error;

use crate::config::StoreConfig;

// ─── Error ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Sqlite(#[from] lobby_store_sqlite::Error),

  #[error(transparent)]
  Memory(#[from] lobby_store_memory::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Backend ──────────────────────────────────────────────────────────────────

pub enum Backend {
  Sqlite(SqliteStore),
  Memory(MemoryStore),
}

impl Backend {
  /// Short name reported by the health endpoint.
  pub fn kind(&self) -> &'static str {
    match self {
      Backend::Sqlite(_) => "sqlite",
      Backend::Memory(_) => "memory",
    }
  }
}

/// Open the persistent store described by `config`. Falls back to an empty
/// in-memory store when no path is set or the store cannot be opened and
/// pinged within the connect timeout.
pub async fn connect(config: &StoreConfig, clock: Arc<dyn Clock>) -> Backend {
  let Some(path) = &config.path else {
    tracing::info!("no store path configured; using in-memory store");
    return Backend::Memory(MemoryStore::with_clock(clock));
  };

  let timeout = config.connect_timeout();
  match open_sqlite(path, clock.clone(), timeout).await {
    Ok(store) => {
      tracing::info!(path = %path.display(), "connected to sqlite store");
      Backend::Sqlite(store)
    }
    Err(reason) => {
      tracing::warn!(
        path = %path.display(),
        %reason,
        "persistent store unavailable; falling back to in-memory store"
      );
      Backend::Memory(MemoryStore::with_clock(clock))
    }
  }
}

async fn open_sqlite(
  path: &std::path::Path,
  clock: Arc<dyn Clock>,
  timeout: Duration,
) -> Result<SqliteStore, String> {
  let attempt = async {
    let store = SqliteStore::open_with_clock(path, clock).await?;
    store.ping().await?;
    Ok::<_, lobby_store_sqlite::Error>(store)
  };
  match tokio::time::timeout(timeout, attempt).await {
    Ok(Ok(store)) => Ok(store),
    Ok(Err(e)) => Err(e.to_string()),
    Err(_) => Err(format!("timed out after {}s", timeout.as_secs())),
  }
}

// ─── DocumentStore impl ──────────────────────────────────────────────────────

macro_rules! dispatch {
  ($self:ident, $store:ident => $call:expr) => {
    match $self {
      Backend::Sqlite($store) => $call.await.map_err(Error::from),
      Backend::Memory($store) => $call.await.map_err(Error::from),
    }
  };
}

impl DocumentStore for Backend {
  type Error = Error;

  fn find_one<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
  ) -> impl Future<Output = Result<Option<Document>>> + Send + 'a {
    async move { dispatch!(self, s => s.find_one(collection, filter)) }
  }

  fn find_many<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
    options: &'a FindOptions,
  ) -> impl Future<Output = Result<Vec<Document>>> + Send + 'a {
    async move { dispatch!(self, s => s.find_many(collection, filter, options)) }
  }

  fn insert_one<'a>(
    &'a self,
    collection: &'a str,
    document: Document,
  ) -> impl Future<Output = Result<String>> + Send + 'a {
    async move { dispatch!(self, s => s.insert_one(collection, document)) }
  }

  fn update_one<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
    set: Document,
    upsert: bool,
  ) -> impl Future<Output = Result<UpdateResult>> + Send + 'a {
    async move { dispatch!(self, s => s.update_one(collection, filter, set, upsert)) }
  }

  fn count<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
  ) -> impl Future<Output = Result<u64>> + Send + 'a {
    async move { dispatch!(self, s => s.count(collection, filter)) }
  }

  fn delete_one<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
  ) -> impl Future<Output = Result<bool>> + Send + 'a {
    async move { dispatch!(self, s => s.delete_one(collection, filter)) }
  }

  fn ensure_index<'a>(
    &'a self,
    collection: &'a str,
    field: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a {
    async move { dispatch!(self, s => s.ensure_index(collection, field)) }
  }

  fn ensure_expiry<'a>(
    &'a self,
    collection: &'a str,
    field: &'a str,
    ttl: Duration,
  ) -> impl Future<Output = Result<()>> + Send + 'a {
    async move { dispatch!(self, s => s.ensure_expiry(collection, field, ttl)) }
  }
}
