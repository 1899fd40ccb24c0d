//! # Local Asset Cache
//!
//! The cache is a flat directory of `{asset_id}{ext}` files. Its membership is
//! derived from the file names; nothing else is persisted.
//!
//! Files are written into a staging subdirectory first and only become part
//! of the cache through an atomic rename, so a partially written or
//! half-normalized asset is never visible under its final name.

pub mod error;
pub mod store;

pub use error::{CacheError, Result};
pub use store::{CacheStore, RemoveOutcome, StagedAsset};
