//! # Immich Provider
//!
//! Implements `PhotoSource` for the Immich REST API (API-key authentication)
//! and a change feed driven by PostgreSQL `LISTEN albums` notifications from
//! the Immich database.

pub mod connector;
pub mod error;
pub mod listener;
pub mod types;

pub use connector::ImmichConnector;
pub use error::{ImmichError, Result};
pub use listener::{payload_matches, AlbumNotificationFeed, NOTIFY_CHANNEL};
