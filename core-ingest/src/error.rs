use bridge_traits::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Image processing failed for {path}: {message}")]
    Codec { path: PathBuf, message: String },

    #[error("Metadata {operation} failed for {path}: {message}")]
    Metadata {
        operation: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("Metadata tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("Cannot determine image format of {0}")]
    UnknownFormat(PathBuf),

    #[error("Source lookup failed: {0}")]
    Source(#[from] BridgeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl IngestError {
    pub(crate) fn codec(path: &std::path::Path, message: impl std::fmt::Display) -> Self {
        IngestError::Codec {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
