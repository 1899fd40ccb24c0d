//! Cache store over the `FileSystemAccess` bridge.

use crate::error::{CacheError, Result};
use bridge_traits::{AssetId, BridgeError, FileSystemAccess};
use bytes::Bytes;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Result of removing an asset from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Number of files deleted for the asset (normally one)
    Removed { files: usize },
    /// No file matched; removal is a no-op
    NotPresent,
}

/// An asset written to the staging directory and not yet published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAsset {
    pub asset_id: AssetId,
    pub path: PathBuf,
}

/// Flat directory of `{asset_id}{ext}` files plus a staging subdirectory.
pub struct CacheStore {
    fs: Arc<dyn FileSystemAccess>,
    root: PathBuf,
    staging: PathBuf,
    index_marker: String,
}

impl CacheStore {
    pub fn new(
        fs: Arc<dyn FileSystemAccess>,
        root: impl Into<PathBuf>,
        staging_dir_name: &str,
        index_marker: impl Into<String>,
    ) -> Self {
        let root = root.into();
        let staging = root.join(staging_dir_name);
        Self {
            fs,
            root,
            staging,
            index_marker: index_marker.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    /// Create the cache directories and clear leftovers of an interrupted run.
    pub async fn prepare(&self) -> Result<()> {
        self.fs.create_dir_all(&self.root).await?;
        let swept = self.sweep_staging().await?;
        if swept > 0 {
            info!(files = swept, "Removed leftover staged files");
        }
        Ok(())
    }

    /// Asset ids currently present in the cache.
    ///
    /// Directories, dot-files and names containing the index marker are not
    /// assets. A missing cache directory is created and reported as empty.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn list_membership(&self) -> Result<HashSet<AssetId>> {
        self.fs
            .create_dir_all(&self.root)
            .await
            .map_err(|source| CacheError::Unreadable {
                path: self.root.clone(),
                source,
            })?;

        let mut members = HashSet::new();
        for path in self.asset_files().await? {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match AssetId::parse(stem) {
                Ok(id) => {
                    members.insert(id);
                }
                Err(e) => debug!(path = ?path, error = %e, "Ignoring non-asset file"),
            }
        }

        debug!(count = members.len(), "Listed cache membership");
        Ok(members)
    }

    /// Write downloaded bytes into the staging directory.
    pub async fn stage(&self, asset_id: &AssetId, bytes: Bytes, extension: &str) -> Result<StagedAsset> {
        validate_extension(extension)?;
        let path = self.staging.join(format!("{}{}", asset_id, extension));
        self.fs.write_file(&path, bytes).await?;
        debug!(asset_id = %asset_id, path = ?path, "Staged asset");
        Ok(StagedAsset {
            asset_id: asset_id.clone(),
            path,
        })
    }

    /// Publish a staged file into the cache with an atomic rename.
    ///
    /// The staged file may have been renamed during normalization (e.g. a new
    /// extension); its current file name is kept.
    pub async fn commit(&self, staged_path: &Path) -> Result<PathBuf> {
        if staged_path.parent() != Some(self.staging.as_path()) {
            return Err(CacheError::NotStaged(staged_path.to_path_buf()));
        }
        let file_name = staged_path
            .file_name()
            .ok_or_else(|| CacheError::NotStaged(staged_path.to_path_buf()))?;
        let target = self.root.join(file_name);

        self.fs.rename(staged_path, &target).await?;
        debug!(path = ?target, "Committed asset");
        Ok(target)
    }

    /// Delete a staged file. Missing files are fine.
    pub async fn discard(&self, staged_path: &Path) -> Result<()> {
        match self.fs.delete_file(staged_path).await {
            Ok(()) | Err(BridgeError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Stage and commit in one step.
    pub async fn materialize(&self, asset_id: &AssetId, bytes: Bytes, extension: &str) -> Result<PathBuf> {
        let staged = self.stage(asset_id, bytes, extension).await?;
        match self.commit(&staged.path).await {
            Ok(path) => Ok(path),
            Err(e) => {
                self.discard(&staged.path).await.ok();
                Err(e)
            }
        }
    }

    /// Delete every cached file whose extension-less name equals `asset_id`.
    #[instrument(skip(self), fields(asset_id = %asset_id))]
    pub async fn remove(&self, asset_id: &AssetId) -> Result<RemoveOutcome> {
        let mut files = 0;
        for path in self.asset_files().await? {
            if path.file_stem().and_then(|s| s.to_str()) != Some(asset_id.as_str()) {
                continue;
            }
            match self.fs.delete_file(&path).await {
                Ok(()) => files += 1,
                // Already gone; someone else cleaned up
                Err(BridgeError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        if files == 0 {
            debug!("Asset not present in cache");
            Ok(RemoveOutcome::NotPresent)
        } else {
            debug!(files, "Removed asset");
            Ok(RemoveOutcome::Removed { files })
        }
    }

    /// Delete everything in the staging directory. Returns the number of entries removed.
    pub async fn sweep_staging(&self) -> Result<usize> {
        if !self.fs.exists(&self.staging).await? {
            return Ok(0);
        }

        let mut removed = 0;
        for path in self.fs.list_directory(&self.staging).await? {
            let result = match self.fs.metadata(&path).await {
                Ok(meta) if meta.is_directory => self.fs.delete_dir_all(&path).await,
                Ok(_) => self.fs.delete_file(&path).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => removed += 1,
                Err(BridgeError::NotFound(_)) => {}
                Err(e) => warn!(path = ?path, error = %e, "Failed to sweep staged file"),
            }
        }
        Ok(removed)
    }

    /// Top-level regular files that may be assets.
    async fn asset_files(&self) -> Result<Vec<PathBuf>> {
        let entries = self
            .fs
            .list_directory(&self.root)
            .await
            .map_err(|source| CacheError::Unreadable {
                path: self.root.clone(),
                source,
            })?;

        let mut files = Vec::with_capacity(entries.len());
        for path in entries {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('.') || name.contains(self.index_marker.as_str()) {
                continue;
            }
            match self.fs.metadata(&path).await {
                Ok(meta) if meta.is_directory => continue,
                Ok(_) => files.push(path),
                // Vanished between listing and stat
                Err(BridgeError::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(files)
    }
}

fn validate_extension(extension: &str) -> Result<()> {
    let valid = extension
        .strip_prefix('.')
        .map(|ext| !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(false);

    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidExtension(extension.to_string()))
    }
}
