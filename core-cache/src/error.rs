use bridge_traits::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache directory unreadable at {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: BridgeError,
    },

    #[error("Invalid file extension '{0}'")]
    InvalidExtension(String),

    #[error("Staged file {0} is not inside the staging directory")]
    NotStaged(PathBuf),

    #[error("Storage error: {0}")]
    Storage(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, CacheError>;
