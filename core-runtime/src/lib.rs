//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the album sync core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its configuration types,
//! logging conventions and the broadcast channel used to report progress.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{BackendConfig, BackendKind, CoreConfig, CoreConfigBuilder, DatabaseConfig};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus};
