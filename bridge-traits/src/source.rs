//! Photo Source Abstraction
//!
//! The uniform interface every photo backend implements so the reconciler can
//! list an album, download its assets and look up capture dates without
//! knowing which backend it is talking to.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use crate::error::{BridgeError, Result};

/// Format used by EXIF date tags.
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Opaque remote asset identifier.
///
/// Doubles as the stem of the cached file name, so values that could escape
/// the cache directory or be mistaken for hidden files are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetId(String);

impl AssetId {
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(BridgeError::InvalidInput("asset id is empty".to_string()));
        }
        if raw.starts_with('.') || raw.contains(['/', '\\', '\0']) {
            return Err(BridgeError::InvalidInput(format!(
                "asset id '{}' is not usable as a file name",
                raw.escape_debug()
            )));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AssetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AssetId {
    type Error = BridgeError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<AssetId> for String {
    fn from(id: AssetId) -> Self {
        id.0
    }
}

/// Capture timestamp as reported by the backend.
///
/// Kept in its original string form and converted to EXIF form only when a
/// file needs its date tags backfilled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakenAt(String);

impl TakenAt {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to `YYYY:MM:DD HH:MM:SS`.
    ///
    /// Offsets are dropped without converting: the wall-clock time as written
    /// by the backend is what ends up in the file.
    pub fn to_exif_datetime(&self) -> Result<String> {
        let raw = self.0.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Ok(parsed
                .naive_local()
                .format(EXIF_DATETIME_FORMAT)
                .to_string());
        }

        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.format(EXIF_DATETIME_FORMAT).to_string())
            .ok_or_else(|| {
                BridgeError::InvalidInput(format!("unrecognized timestamp '{}'", self.0))
            })
    }
}

impl fmt::Display for TakenAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the backend told us about a downloaded file's name and type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilenameHint {
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

impl FilenameHint {
    pub fn new(filename: Option<String>, content_type: Option<String>) -> Self {
        Self {
            filename,
            content_type,
        }
    }

    /// Build a hint from `Content-Disposition` and `Content-Type` headers.
    pub fn from_headers(headers: &HashMap<String, String>) -> Self {
        let lookup = |name: &str| {
            headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        };

        Self {
            filename: lookup("content-disposition").and_then(parse_content_disposition),
            content_type: lookup("content-type").map(|value| {
                value
                    .split(';')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_ascii_lowercase()
            }),
        }
    }

    /// File extension including the leading dot, lowercased.
    ///
    /// The filename wins over the content type.
    pub fn extension(&self) -> Option<String> {
        self.filename
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
            .or_else(|| {
                self.content_type
                    .as_deref()
                    .and_then(extension_for_content_type)
                    .map(str::to_string)
            })
    }
}

fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(".jpg"),
        "image/png" => Some(".png"),
        "image/heic" => Some(".heic"),
        "image/heif" => Some(".heif"),
        "image/webp" => Some(".webp"),
        "image/gif" => Some(".gif"),
        "image/tiff" => Some(".tiff"),
        "image/avif" => Some(".avif"),
        _ => None,
    }
}

/// Extract the file name from a `Content-Disposition` header value.
///
/// `filename*` (RFC 5987) takes precedence over `filename`. Any directory
/// components are stripped.
fn parse_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for part in value.split(';').map(str::trim) {
        let Some((key, raw)) = part.split_once('=') else {
            continue;
        };
        let raw = raw.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let encoded = raw.rsplit_once('\'').map(|(_, v)| v).unwrap_or(raw);
                extended = urlencoding::decode(encoded).ok().map(|v| v.into_owned());
            }
            "filename" => plain = Some(raw.trim_matches('"').to_string()),
            _ => {}
        }
    }

    extended
        .or(plain)
        .and_then(|name| {
            Path::new(&name)
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
        })
        .filter(|name| !name.is_empty())
}

/// A downloaded asset, still in memory.
#[derive(Debug, Clone)]
pub struct FetchedAsset {
    pub bytes: Bytes,
    pub hint: FilenameHint,
}

/// Source capability trait
///
/// Implemented once per photo backend. Authentication is the implementation's
/// concern: sessions are acquired lazily on first use and reused.
///
/// # Example
///
/// ```ignore
/// let remote = source.list_album_asset_ids().await?;
/// for id in remote {
///     let asset = source.fetch_asset(&id).await?;
///     println!("{} -> {:?}", id, asset.hint.extension());
/// }
/// ```
#[async_trait]
pub trait PhotoSource: Send + Sync {
    /// Short backend name used in logs and events
    fn name(&self) -> &str;

    /// Current membership of the configured album.
    ///
    /// An empty set means the album really is empty. Any failure must be an
    /// error so callers never mistake an outage for "delete everything".
    async fn list_album_asset_ids(&self) -> Result<HashSet<AssetId>>;

    /// Download the original bytes of an asset
    async fn fetch_asset(&self, id: &AssetId) -> Result<FetchedAsset>;

    /// Capture timestamp known to the backend, if any.
    ///
    /// `Ok(None)` means the backend has no date for this asset. Transport
    /// failures are errors.
    async fn get_taken_at(&self, id: &AssetId) -> Result<Option<TakenAt>>;
}
