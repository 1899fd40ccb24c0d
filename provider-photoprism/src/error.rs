//! Error types for the PhotoPrism provider

use bridge_traits::BridgeError;
use core_auth::AuthError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhotoPrismError {
    /// Login was refused or returned no usable session
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The server rejected a freshly acquired session
    #[error("Session rejected after re-login")]
    SessionRejected,

    #[error("PhotoPrism API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Photo not found: {uid}")]
    PhotoNotFound { uid: String },

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Invalid album descriptor {path}: {message}")]
    Descriptor { path: PathBuf, message: String },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, PhotoPrismError>;

impl From<PhotoPrismError> for BridgeError {
    fn from(error: PhotoPrismError) -> Self {
        match error {
            PhotoPrismError::PhotoNotFound { uid } => {
                BridgeError::NotFound(format!("PhotoPrism photo {}", uid))
            }
            PhotoPrismError::Descriptor { .. } | PhotoPrismError::ParseError(_) => {
                BridgeError::InvalidInput(error.to_string())
            }
            PhotoPrismError::BridgeError(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}
