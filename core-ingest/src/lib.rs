//! # Ingestion Pipeline
//!
//! Normalizes a freshly downloaded asset before it is published into the
//! cache:
//!
//! 1. rewrite the metadata block from scratch to drop corrupt structures
//! 2. backfill the capture date from the backend when the file has none,
//!    converting to JPEG first if the container cannot carry EXIF dates
//! 3. downscale anything larger than the configured bound, keeping metadata
//!
//! Image decoding and encoding go through [`ImageCodec`]; tag reads and
//! writes go through [`MetadataEditor`]. The default implementations use the
//! `image` crate and the `exiftool` executable.

pub mod codec;
pub mod error;
pub mod metadata;
pub mod pipeline;

pub use codec::{ImageCodec, ImageCrateCodec};
pub use error::{IngestError, Result};
pub use metadata::{ExifToolEditor, MetadataEditor};
pub use pipeline::{target_dimensions, IngestOutcome, IngestPipeline, IngestSettings};
