//! SQLite backend for the lobby document store.
//!
//! Every collection lives in one `documents` table as JSON text and is queried
//! with SQLite's JSON functions. Wraps [`tokio_rusqlite`] so all database
//! access runs on a dedicated thread without blocking the async runtime.

mod query;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
