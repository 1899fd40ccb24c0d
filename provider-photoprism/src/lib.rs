//! # PhotoPrism Provider
//!
//! Implements `PhotoSource` for a PhotoPrism server whose album membership is
//! exported to a YAML descriptor on disk.
//!
//! ## Overview
//!
//! This module provides:
//! - Album membership from the descriptor (`Photos[].UID`, hidden photos excluded)
//! - Session login with lazily fetched download token, reused across requests
//! - Transparent re-login when the server rejects a session
//! - A polling watcher that turns descriptor changes into reconcile triggers

pub mod connector;
pub mod descriptor;
pub mod error;
pub mod types;
pub mod watcher;

pub use connector::{PhotoPrismConnector, PhotoPrismSession};
pub use descriptor::parse_descriptor;
pub use error::{PhotoPrismError, Result};
pub use watcher::DescriptorWatcher;
