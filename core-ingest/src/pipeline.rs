//! # Normalization Pipeline
//!
//! Runs on a staged file and either hands back the (possibly renamed) path
//! ready to commit, or reports that the asset must not be cached.
//!
//! Stages run in a fixed order: repair, capture date, resize. A stage failure
//! aborts the whole ingestion; the caller discards the staged file.

use crate::codec::ImageCodec;
use crate::error::{IngestError, Result};
use crate::metadata::MetadataEditor;
use bridge_traits::{AssetId, BridgeError, FileSystemAccess, PhotoSource};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Extensions whose containers carry EXIF dates
const TAG_CAPABLE_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// Suffix of the pre-resize copy used to restore metadata
const BACKUP_SUFFIX: &str = ".orig";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSettings {
    /// Longest allowed edge in pixels
    pub max_dimension: u32,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self { max_dimension: 1920 }
    }
}

/// What to do with a staged asset after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Commit the file at this path
    Ready(PathBuf),
    /// No capture date could be established; the staged file is gone
    Discarded,
}

/// Dimensions to resample to, or `None` when both edges fit.
///
/// The longer edge becomes `max`, the shorter one scales proportionally and
/// is truncated. Square images become `max` x `max`.
pub fn target_dimensions(width: u32, height: u32, max: u32) -> Option<(u32, u32)> {
    if width <= max && height <= max {
        return None;
    }
    let scaled = |num: u32, den: u32| -> u32 {
        let value = (u64::from(max) * u64::from(num)) / u64::from(den.max(1));
        (value as u32).max(1)
    };
    if width > height {
        Some((max, scaled(height, width)))
    } else {
        Some((scaled(width, height), max))
    }
}

fn is_tag_capable(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            TAG_CAPABLE_EXTENSIONS
                .iter()
                .any(|capable| e.eq_ignore_ascii_case(capable))
        })
        .unwrap_or(false)
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(BACKUP_SUFFIX);
    path.with_file_name(name)
}

pub struct IngestPipeline {
    codec: Arc<dyn ImageCodec>,
    editor: Arc<dyn MetadataEditor>,
    fs: Arc<dyn FileSystemAccess>,
    settings: IngestSettings,
}

impl IngestPipeline {
    pub fn new(
        codec: Arc<dyn ImageCodec>,
        editor: Arc<dyn MetadataEditor>,
        fs: Arc<dyn FileSystemAccess>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            codec,
            editor,
            fs,
            settings,
        }
    }

    pub fn settings(&self) -> IngestSettings {
        self.settings
    }

    pub fn codec(&self) -> &Arc<dyn ImageCodec> {
        &self.codec
    }

    /// Normalize a staged file in place.
    #[instrument(skip(self, source), fields(asset_id = %asset_id, source = source.name()))]
    pub async fn normalize(
        &self,
        asset_id: &AssetId,
        staged_path: &Path,
        source: &dyn PhotoSource,
    ) -> Result<IngestOutcome> {
        self.editor.repair(staged_path).await?;

        let path = match self.editor.capture_date(staged_path).await? {
            Some(date) => {
                debug!(date = %date, "Capture date present");
                staged_path.to_path_buf()
            }
            None => match self.backfill_capture_date(asset_id, staged_path, source).await? {
                Some(path) => path,
                None => return Ok(IngestOutcome::Discarded),
            },
        };

        self.downscale(&path).await?;
        Ok(IngestOutcome::Ready(path))
    }

    /// Write the backend's capture date into the file. Returns `None` after
    /// deleting the file when the backend has no date either.
    async fn backfill_capture_date(
        &self,
        asset_id: &AssetId,
        staged_path: &Path,
        source: &dyn PhotoSource,
    ) -> Result<Option<PathBuf>> {
        let path = if is_tag_capable(staged_path) {
            staged_path.to_path_buf()
        } else {
            let target = staged_path.with_extension("jpg");
            let (from, to) = (staged_path.to_path_buf(), target.clone());
            self.blocking(move |codec| codec.convert_to_jpeg(&from, &to))
                .await?;
            debug!(from = ?staged_path, to = ?target, "Converted to JPEG for date tagging");
            target
        };

        match source.get_taken_at(asset_id).await? {
            Some(taken_at) => {
                let exif = taken_at.to_exif_datetime()?;
                self.editor.write_capture_date(&path, &exif).await?;
                info!(date = %exif, "Backfilled capture date from backend");
                Ok(Some(path))
            }
            None => {
                warn!("No capture date in file or backend, discarding asset");
                self.delete_quietly(&path).await?;
                Ok(None)
            }
        }
    }

    async fn downscale(&self, path: &Path) -> Result<()> {
        let owned = path.to_path_buf();
        let (width, height) = self.blocking(move |codec| codec.dimensions(&owned)).await?;

        let Some((new_width, new_height)) =
            target_dimensions(width, height, self.settings.max_dimension)
        else {
            return Ok(());
        };

        let backup = backup_path(path);
        self.fs.copy_file(path, &backup).await?;

        let result = self.resize_with_metadata(path, &backup, new_width, new_height).await;
        self.delete_quietly(&backup).await.ok();
        result?;

        debug!(width, height, new_width, new_height, "Downscaled image");
        Ok(())
    }

    async fn resize_with_metadata(
        &self,
        path: &Path,
        backup: &Path,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let owned = path.to_path_buf();
        self.blocking(move |codec| codec.resize(&owned, width, height))
            .await?;
        self.editor.copy_metadata(backup, path).await
    }

    async fn delete_quietly(&self, path: &Path) -> Result<()> {
        match self.fs.delete_file(path).await {
            Ok(()) | Err(BridgeError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn blocking<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&dyn ImageCodec) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let codec = Arc::clone(&self.codec);
        tokio::task::spawn_blocking(move || work(codec.as_ref()))
            .await
            .map_err(|e| IngestError::Task(e.to_string()))?
    }
}
