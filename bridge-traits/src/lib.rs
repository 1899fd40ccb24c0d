//! # Host Bridge Traits
//!
//! Capability traits the sync core depends on, implemented per host or backend.
//!
//! ## Overview
//!
//! This crate defines the contract between the reconciliation core and the
//! concrete adapters around it. Each trait represents a capability the core
//! requires without caring how it is provided.
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry
//! - [`FileSystemAccess`](storage::FileSystemAccess) - File I/O for the local cache
//!
//! ### Photo Backends
//! - [`PhotoSource`](source::PhotoSource) - Album membership, asset download, capture dates
//! - [`ChangeFeed`](trigger::ChangeFeed) - Backend-specific "something changed" signals
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is missing:
//!
//! ```ignore
//! let http_client = config.http_client
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "HttpClient".to_string(),
//!         message: "No HTTP client implementation provided.".to_string(),
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Adapters
//! convert their own errors to `BridgeError` and include context such as the
//! file path or asset id involved.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` (or `Send` for single-consumer
//! feeds) so they can be shared across async tasks.

pub mod error;
pub mod http;
pub mod source;
pub mod storage;
pub mod time;
pub mod trigger;

pub use error::{BridgeError, Result};

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use source::{AssetId, FetchedAsset, FilenameHint, PhotoSource, TakenAt};
pub use storage::{FileMetadata, FileSystemAccess};
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
pub use trigger::{ChangeFeed, ChangeSignal};
