//! The `DocumentStore` trait and the collection names the components use.
//!
//! The trait is implemented by storage backends (`lobby-store-sqlite`,
//! `lobby-store-memory`). Components depend on this abstraction only; the one
//! place that knows which backend is live is the server's startup code.

use std::{future::Future, time::Duration};

use crate::document::{Document, Filter, FindOptions, UpdateResult};

/// Collection names.
pub mod collections {
  pub const USERS: &str = "users";
  pub const ACTIVE_USERS: &str = "active_users";
  pub const CHAT_MESSAGES: &str = "chat_messages";
  pub const FEEDBACK: &str = "feedback";
  pub const USER_ACHIEVEMENTS: &str = "user_achievements";
}

/// Abstraction over a document store backend.
///
/// Every backend must give observably identical results for the same sequence
/// of calls. Each single call is atomic with respect to the record it touches;
/// nothing spanning several calls is.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait DocumentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// First document (in insertion order) matching `filter`.
  fn find_one<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
  ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send + 'a;

  /// All documents matching `filter`, shaped by `options`.
  ///
  /// Without a sort, documents come back in insertion order. Sort ties are
  /// broken by insertion order in the direction of the sort.
  fn find_many<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
    options: &'a FindOptions,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + 'a;

  /// Store `document`, assigning an `_id` if it has none. Returns the `_id`.
  ///
  /// Fails if another document in the collection already has that `_id`.
  fn insert_one<'a>(
    &'a self,
    collection: &'a str,
    document: Document,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;

  /// Overwrite the fields in `set` on the first document matching `filter`.
  ///
  /// With `upsert` and no match, a new document is created from the filter's
  /// equalities overlaid with `set`. `_id` cannot be set.
  fn update_one<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
    set: Document,
    upsert: bool,
  ) -> impl Future<Output = Result<UpdateResult, Self::Error>> + Send + 'a;

  fn count<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Remove the first document matching `filter`. Returns whether anything
  /// was removed.
  fn delete_one<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Declare that `field` is sorted or filtered on frequently.
  fn ensure_index<'a>(
    &'a self,
    collection: &'a str,
    field: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Install a time-to-live rule: a document stops being visible once its
  /// `field` holds a timestamp at least `ttl` in the past. Documents without
  /// the field never expire. Replaces any earlier rule for the collection.
  fn ensure_expiry<'a>(
    &'a self,
    collection: &'a str,
    field: &'a str,
    ttl: Duration,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
