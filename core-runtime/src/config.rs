//! # Core Configuration Module
//!
//! Builder-based configuration for the album sync core.
//!
//! ## Overview
//!
//! [`CoreConfigBuilder`] collects the backend selection, cache settings and
//! bridge implementations, then validates everything in
//! [`build()`](CoreConfigBuilder::build). Validation is fail-fast: a missing
//! URL, credential or bridge is reported before any network or disk access.
//!
//! ## Backends
//!
//! - [`BackendConfig::PhotoPrism`] - membership from a YAML album descriptor,
//!   downloads with username/password session auth
//! - [`BackendConfig::Immich`] - membership from the album API with an API
//!   key, change notifications from PostgreSQL
//!
//! ## Bridges
//!
//! `HttpClient` and `FileSystemAccess` are optional on the builder. With the
//! `desktop-shims` feature the desktop implementations are injected when
//! missing; without it a missing bridge is `Error::CapabilityMissing`.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, DatabaseConfig};
//!
//! let config = CoreConfig::builder()
//!     .base_url("https://immich.example.com")
//!     .cache_dir("/var/cache/photostream")
//!     .immich(
//!         "0d4b6d8e-album",
//!         "api-key",
//!         DatabaseConfig::new("db", "immich", "postgres", "secret"),
//!     )
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{FileSystemAccess, HttpClient};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MAX_DIMENSION: u32 = 1920;
pub const DEFAULT_JPEG_QUALITY: u8 = 90;
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 4;
pub const DEFAULT_INDEX_MARKER: &str = "index";
pub const DEFAULT_STAGING_DIR_NAME: &str = ".staging";
pub const DEFAULT_EXIFTOOL_PATH: &str = "exiftool";
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_POSTGRES_PORT: u16 = 5432;

/// Which photo backend is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    PhotoPrism,
    Immich,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::PhotoPrism => "photoprism",
            BackendKind::Immich => "immich",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "photoprism" => Ok(BackendKind::PhotoPrism),
            "immich" => Ok(BackendKind::Immich),
            other => Err(Error::Config(format!(
                "Unknown sync type '{}'. Expected 'photoprism' or 'immich'",
                other
            ))),
        }
    }
}

/// PostgreSQL connection settings for Immich change notifications.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl DatabaseConfig {
    pub fn new(
        host: impl Into<String>,
        name: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_POSTGRES_PORT,
            name: name.into(),
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    fn validate(&self) -> Result<()> {
        require_non_empty("Immich database host", &self.host)?;
        require_non_empty("Immich database name", &self.name)?;
        require_non_empty("Immich database user", &self.user)?;
        require_non_empty("Immich database password", &self.password)?;
        if self.port == 0 {
            return Err(Error::Config(
                "Immich database port must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Backend selection plus the settings only that backend needs.
#[derive(Clone, PartialEq, Eq)]
pub enum BackendConfig {
    PhotoPrism {
        /// YAML album descriptor on a mounted volume
        album_path: PathBuf,
        username: String,
        password: String,
    },
    Immich {
        album_id: String,
        api_key: String,
        database: DatabaseConfig,
    },
}

impl BackendConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::PhotoPrism { .. } => BackendKind::PhotoPrism,
            BackendConfig::Immich { .. } => BackendKind::Immich,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            BackendConfig::PhotoPrism {
                album_path,
                username,
                password,
            } => {
                if album_path.as_os_str().is_empty() {
                    return Err(Error::Config(
                        "PhotoPrism album path is required".to_string(),
                    ));
                }
                require_non_empty("PhotoPrism username", username)?;
                require_non_empty("PhotoPrism password", password)
            }
            BackendConfig::Immich {
                album_id,
                api_key,
                database,
            } => {
                require_non_empty("Immich album id", album_id)?;
                require_non_empty("Immich API key", api_key)?;
                database.validate()
            }
        }
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendConfig::PhotoPrism {
                album_path,
                username,
                ..
            } => f
                .debug_struct("PhotoPrism")
                .field("album_path", album_path)
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            BackendConfig::Immich {
                album_id, database, ..
            } => f
                .debug_struct("Immich")
                .field("album_id", album_id)
                .field("api_key", &"[REDACTED]")
                .field("database", database)
                .finish(),
        }
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::Config(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

/// Validated configuration for the sync core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Backend root URL without a trailing slash
    pub base_url: String,

    /// Directory holding the cached assets
    pub cache_dir: PathBuf,

    pub backend: BackendConfig,

    /// Longest side, in pixels, of a cached image
    pub max_dimension: u32,

    /// Quality used when re-encoding JPEG output (1-100)
    pub jpeg_quality: u8,

    /// Worker pool size for fetching and ingesting new assets
    pub max_concurrent_downloads: usize,

    /// Files whose name contains this marker are never treated as assets
    pub index_marker: String,

    /// Name of the staging directory inside the cache directory
    pub staging_dir_name: String,

    /// Path to the exiftool executable
    pub exiftool_path: PathBuf,

    /// Polling interval of the PhotoPrism descriptor watcher
    pub watch_interval: Duration,

    /// Run a pass immediately when the service starts
    pub reconcile_on_start: bool,

    pub http_client: Arc<dyn HttpClient>,

    pub file_system: Arc<dyn FileSystemAccess>,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("base_url", &self.base_url)
            .field("cache_dir", &self.cache_dir)
            .field("backend", &self.backend)
            .field("max_dimension", &self.max_dimension)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("max_concurrent_downloads", &self.max_concurrent_downloads)
            .field("index_marker", &self.index_marker)
            .field("staging_dir_name", &self.staging_dir_name)
            .field("exiftool_path", &self.exiftool_path)
            .field("watch_interval", &self.watch_interval)
            .field("reconcile_on_start", &self.reconcile_on_start)
            .field("http_client", &"HttpClient { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Check value ranges and backend settings.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("Base URL", &self.base_url)?;
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "Base URL '{}' must start with http:// or https://",
                self.base_url
            )));
        }

        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("Cache directory cannot be empty".to_string()));
        }

        if self.max_dimension == 0 {
            return Err(Error::Config(
                "Max dimension must be greater than 0".to_string(),
            ));
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::Config(format!(
                "JPEG quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }

        if self.max_concurrent_downloads == 0 {
            return Err(Error::Config(
                "Max concurrent downloads must be at least 1".to_string(),
            ));
        }

        require_non_empty("Index marker", &self.index_marker)?;

        if self.staging_dir_name.is_empty()
            || self.staging_dir_name.contains(['/', '\\'])
            || self.staging_dir_name == "."
            || self.staging_dir_name == ".."
        {
            return Err(Error::Config(format!(
                "Staging directory name '{}' must be a single path component",
                self.staging_dir_name
            )));
        }

        if self.watch_interval.is_zero() {
            return Err(Error::Config(
                "Watch interval must be greater than 0".to_string(),
            ));
        }

        self.backend.validate()
    }

    /// Directory where assets are normalized before publication.
    pub fn staging_dir(&self) -> PathBuf {
        self.cache_dir.join(&self.staging_dir_name)
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "No {} implementation provided. Enable the 'desktop-shims' feature \
             to use the default desktop adapter or inject one on the builder.",
            capability
        ),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    let client = bridge_desktop::ReqwestHttpClient::new()
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing("HttpClient"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Ok(Arc::new(bridge_desktop::TokioFileSystem::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(capability_missing("FileSystemAccess"))
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    base_url: Option<String>,
    cache_dir: Option<PathBuf>,
    backend: Option<BackendConfig>,
    max_dimension: Option<u32>,
    jpeg_quality: Option<u8>,
    max_concurrent_downloads: Option<usize>,
    index_marker: Option<String>,
    staging_dir_name: Option<String>,
    exiftool_path: Option<PathBuf>,
    watch_interval: Option<Duration>,
    reconcile_on_start: Option<bool>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
}

impl CoreConfigBuilder {
    /// Backend root URL, e.g. `https://photos.example.com`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    pub fn backend(mut self, backend: BackendConfig) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Select PhotoPrism with its album descriptor and login.
    pub fn photoprism(
        self,
        album_path: impl Into<PathBuf>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.backend(BackendConfig::PhotoPrism {
            album_path: album_path.into(),
            username: username.into(),
            password: password.into(),
        })
    }

    /// Select Immich with its album, API key and notification database.
    pub fn immich(
        self,
        album_id: impl Into<String>,
        api_key: impl Into<String>,
        database: DatabaseConfig,
    ) -> Self {
        self.backend(BackendConfig::Immich {
            album_id: album_id.into(),
            api_key: api_key.into(),
            database,
        })
    }

    /// Default: 1920
    pub fn max_dimension(mut self, pixels: u32) -> Self {
        self.max_dimension = Some(pixels);
        self
    }

    /// Default: 90
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = Some(quality);
        self
    }

    /// Default: 4
    pub fn max_concurrent_downloads(mut self, workers: usize) -> Self {
        self.max_concurrent_downloads = Some(workers);
        self
    }

    /// Default: `index`
    pub fn index_marker(mut self, marker: impl Into<String>) -> Self {
        self.index_marker = Some(marker.into());
        self
    }

    /// Default: `.staging`
    pub fn staging_dir_name(mut self, name: impl Into<String>) -> Self {
        self.staging_dir_name = Some(name.into());
        self
    }

    /// Default: `exiftool` from `PATH`
    pub fn exiftool_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.exiftool_path = Some(path.into());
        self
    }

    /// Default: 2 seconds
    pub fn watch_interval(mut self, interval: Duration) -> Self {
        self.watch_interval = Some(interval);
        self
    }

    /// Default: true
    pub fn reconcile_on_start(mut self, enabled: bool) -> Self {
        self.reconcile_on_start = Some(enabled);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// - `Error::Config` for missing or out-of-range settings
    /// - `Error::CapabilityMissing` when a bridge is missing and no default exists
    pub fn build(self) -> Result<CoreConfig> {
        let base_url = self.base_url.ok_or_else(|| {
            Error::Config("Base URL is required. Use .base_url() to set it.".to_string())
        })?;

        let cache_dir = self.cache_dir.ok_or_else(|| {
            Error::Config("Cache directory is required. Use .cache_dir() to set it.".to_string())
        })?;

        let backend = self.backend.ok_or_else(|| {
            Error::Config(
                "Backend is required. Use .photoprism() or .immich() to select one.".to_string(),
            )
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let config = CoreConfig {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            cache_dir,
            backend,
            max_dimension: self.max_dimension.unwrap_or(DEFAULT_MAX_DIMENSION),
            jpeg_quality: self.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            max_concurrent_downloads: self
                .max_concurrent_downloads
                .unwrap_or(DEFAULT_MAX_CONCURRENT_DOWNLOADS),
            index_marker: self
                .index_marker
                .unwrap_or_else(|| DEFAULT_INDEX_MARKER.to_string()),
            staging_dir_name: self
                .staging_dir_name
                .unwrap_or_else(|| DEFAULT_STAGING_DIR_NAME.to_string()),
            exiftool_path: self
                .exiftool_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_EXIFTOOL_PATH)),
            watch_interval: self.watch_interval.unwrap_or(DEFAULT_WATCH_INTERVAL),
            reconcile_on_start: self.reconcile_on_start.unwrap_or(true),
            http_client,
            file_system,
        };

        config.validate()?;

        Ok(config)
    }
}
