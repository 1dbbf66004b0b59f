//! Core types and trait definitions for the lobby backend.
//!
//! This crate has no HTTP or database dependencies.
//! Storage backends implement [`store::DocumentStore`]; the components in
//! here (registry, presence, chat, feedback, achievements) only ever talk to
//! that trait.

pub mod achievement;
pub mod chat;
pub mod clock;
pub mod document;
pub mod error;
pub mod feedback;
pub mod lobby;
pub mod presence;
pub mod registry;
pub mod settings;
pub mod store;
pub mod timestamp;

pub use error::{Error, Result};
pub use lobby::Lobby;
