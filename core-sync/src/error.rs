use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Album membership unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Failed to fetch asset {asset_id}: {message}")]
    AssetFetchFailed { asset_id: String, message: String },

    #[error("Failed to ingest asset {asset_id}: {message}")]
    AssetIngestFailed { asset_id: String, message: String },

    #[error("Cache unreadable: {0}")]
    Cache(String),
}

impl SyncError {
    pub(crate) fn ingest(asset_id: impl ToString, message: impl ToString) -> Self {
        SyncError::AssetIngestFailed {
            asset_id: asset_id.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
