//! Umbrella crate for the photostream workspace.
//!
//! Re-exports the service façade so hosts can depend on a single crate and
//! pick the bridge implementations through features.

#[cfg(feature = "desktop-shims")]
pub use core_service::{CoreError, PhotostreamService, Result};
