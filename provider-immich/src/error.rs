//! Error types for the Immich provider

use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImmichError {
    /// The API key was refused
    #[error("Immich rejected the API key (status {0})")]
    Unauthorized(u16),

    #[error("Immich API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Asset not found: {asset_id}")]
    AssetNotFound { asset_id: String },

    #[error("Album not found: {album_id}")]
    AlbumNotFound { album_id: String },

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Notification listener error: {0}")]
    Listener(#[from] sqlx::Error),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, ImmichError>;

impl From<ImmichError> for BridgeError {
    fn from(error: ImmichError) -> Self {
        match error {
            ImmichError::AssetNotFound { asset_id } => {
                BridgeError::NotFound(format!("Immich asset {}", asset_id))
            }
            ImmichError::BridgeError(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}
