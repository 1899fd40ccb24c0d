//! # Authentication Module
//!
//! Session state shared by the photo backends.
//!
//! ## Overview
//!
//! Both backends authenticate lazily: nothing talks to the server until the
//! first request needs a session, and the session is reused until the server
//! rejects it. [`SessionCache`] implements that lifecycle once:
//!
//! - concurrent callers share a single acquisition
//! - a rejected session is invalidated and the next caller re-acquires
//! - acquisition and invalidation are published as [`AuthEvent`](core_runtime::events::AuthEvent)s
//!
//! Credential types redact themselves in `Debug` output.

pub mod credentials;
pub mod error;
pub mod session;

pub use credentials::{ApiKey, Credentials};
pub use error::{AuthError, Result};
pub use session::SessionCache;
