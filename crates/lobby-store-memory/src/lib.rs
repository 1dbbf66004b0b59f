//! In-process fallback backend for the lobby document store.
//!
//! Used when the persistent store cannot be reached at startup. It keeps every
//! collection as an insertion-ordered list behind a single mutex and mirrors
//! the persistent backend's query semantics, including time-to-live expiry,
//! which it applies when reading rather than with a background timer.

mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::MemoryStore;
