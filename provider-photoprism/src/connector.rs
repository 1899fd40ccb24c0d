//! PhotoPrism API connector
//!
//! Implements `PhotoSource` on top of the `HttpClient` and `FileSystemAccess`
//! bridges.

use async_trait::async_trait;
use bridge_traits::{
    AssetId, FetchedAsset, FileSystemAccess, FilenameHint, HttpClient, HttpMethod, HttpRequest,
    HttpResponse, PhotoSource, TakenAt,
};
use core_auth::{Credentials, SessionCache};
use core_runtime::events::EventBus;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::descriptor::parse_descriptor;
use crate::error::{PhotoPrismError, Result};
use crate::types::{ClientConfig, Photo, SessionResponse};

const PROVIDER_NAME: &str = "photoprism";

const SESSION_HEADER: &str = "X-Session-ID";

/// An authenticated PhotoPrism session.
#[derive(Clone, PartialEq, Eq)]
pub struct PhotoPrismSession {
    pub session_id: String,
    /// Token required by the download endpoint
    pub download_token: String,
}

impl std::fmt::Debug for PhotoPrismSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PhotoPrismSession([REDACTED])")
    }
}

/// PhotoPrism connector
///
/// Membership comes from the album descriptor on disk; downloads and capture
/// dates come from the API. The session is acquired on first use and shared
/// by all concurrent requests.
///
/// # Example
///
/// ```ignore
/// let connector = PhotoPrismConnector::new(
///     http_client,
///     file_system,
///     "https://photos.example.com",
///     "/photoprism/storage/albums/album/aqmxlr71p6zo22dk.yml",
///     Credentials::new("admin", "secret"),
/// );
/// let ids = connector.list_album_asset_ids().await?;
/// ```
pub struct PhotoPrismConnector {
    http_client: Arc<dyn HttpClient>,
    file_system: Arc<dyn FileSystemAccess>,
    base_url: String,
    album_path: PathBuf,
    credentials: Credentials,
    session: SessionCache<PhotoPrismSession>,
}

impl PhotoPrismConnector {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        file_system: Arc<dyn FileSystemAccess>,
        base_url: impl Into<String>,
        album_path: impl Into<PathBuf>,
        credentials: Credentials,
    ) -> Self {
        Self {
            http_client,
            file_system,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            album_path: album_path.into(),
            credentials,
            session: SessionCache::new(PROVIDER_NAME),
        }
    }

    /// Publish session lifecycle events on `event_bus`.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.session = SessionCache::new(PROVIDER_NAME).with_event_bus(event_bus);
        self
    }

    pub fn album_path(&self) -> &Path {
        &self.album_path
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path)
    }

    /// Log in and fetch the download token.
    #[instrument(skip(self), fields(username = %self.credentials.username()))]
    async fn login(&self) -> Result<PhotoPrismSession> {
        let body = serde_json::json!({
            "username": self.credentials.username(),
            "password": self.credentials.password(),
        });
        let request = HttpRequest::new(HttpMethod::Post, self.api_url("session")).json(&body)?;
        let response = self.http_client.execute(request).await?;
        if !response.is_success() {
            return Err(PhotoPrismError::AuthenticationFailed(format!(
                "login returned status {}",
                response.status
            )));
        }

        let session_id = response
            .json::<SessionResponse>()
            .map_err(|e| PhotoPrismError::ParseError(e.to_string()))?
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                PhotoPrismError::AuthenticationFailed("login returned no session id".to_string())
            })?;

        let request = HttpRequest::new(HttpMethod::Get, self.api_url("config"))
            .header(SESSION_HEADER, session_id.as_str());
        let response = self.http_client.execute(request).await?;
        if !response.is_success() {
            return Err(PhotoPrismError::AuthenticationFailed(format!(
                "config returned status {}",
                response.status
            )));
        }

        let download_token = response
            .json::<ClientConfig>()
            .map_err(|e| PhotoPrismError::ParseError(e.to_string()))?
            .download_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                PhotoPrismError::AuthenticationFailed("config returned no download token".to_string())
            })?;

        info!("Logged in to PhotoPrism");
        Ok(PhotoPrismSession {
            session_id,
            download_token,
        })
    }

    async fn current_session(&self) -> Result<PhotoPrismSession> {
        self.session.get_or_acquire(|| self.login()).await
    }

    /// Send a request built from the current session.
    ///
    /// A 401 drops the session and the request is retried once with a fresh
    /// login. A second 401 is `SessionRejected`.
    async fn send_authorized<F>(&self, build: F) -> Result<HttpResponse>
    where
        F: Fn(&PhotoPrismSession) -> HttpRequest,
    {
        let session = self.current_session().await?;
        let response = self.http_client.execute(build(&session)).await?;
        if response.status != 401 {
            return Ok(response);
        }

        warn!("PhotoPrism rejected session, logging in again");
        self.session.invalidate(&session, "HTTP 401").await;

        let session = self.current_session().await?;
        let response = self.http_client.execute(build(&session)).await?;
        if response.status == 401 {
            self.session.invalidate(&session, "HTTP 401 after re-login").await;
            return Err(PhotoPrismError::SessionRejected);
        }
        Ok(response)
    }

    fn check_status(uid: &AssetId, response: &HttpResponse) -> Result<()> {
        match response.status {
            status if (200..300).contains(&status) => Ok(()),
            404 => Err(PhotoPrismError::PhotoNotFound {
                uid: uid.to_string(),
            }),
            status => Err(PhotoPrismError::ApiError {
                status_code: status,
                message: String::from_utf8_lossy(&response.body).chars().take(200).collect(),
            }),
        }
    }

    async fn read_album(&self) -> Result<std::collections::HashSet<AssetId>> {
        let bytes = self.file_system.read_file(&self.album_path).await?;
        let yaml = std::str::from_utf8(&bytes).map_err(|e| PhotoPrismError::Descriptor {
            path: self.album_path.clone(),
            message: e.to_string(),
        })?;
        parse_descriptor(&self.album_path, yaml)
    }

    async fn download(&self, uid: &AssetId) -> Result<FetchedAsset> {
        let path = format!("photos/{}/dl", uid);
        let response = self
            .send_authorized(|session| {
                HttpRequest::new(HttpMethod::Get, self.api_url(&path))
                    .query("t", &session.download_token)
                    .header(SESSION_HEADER, session.session_id.as_str())
            })
            .await?;
        Self::check_status(uid, &response)?;

        let hint = FilenameHint::from_headers(&response.headers);
        debug!(uid = %uid, bytes = response.body.len(), filename = ?hint.filename, "Downloaded photo");
        Ok(FetchedAsset {
            bytes: response.body,
            hint,
        })
    }

    async fn photo(&self, uid: &AssetId) -> Result<Photo> {
        let path = format!("photos/{}", uid);
        let response = self
            .send_authorized(|session| {
                HttpRequest::new(HttpMethod::Get, self.api_url(&path))
                    .header(SESSION_HEADER, session.session_id.as_str())
                    .header("Accept", "application/json")
            })
            .await?;
        Self::check_status(uid, &response)?;
        response
            .json::<Photo>()
            .map_err(|e| PhotoPrismError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl PhotoSource for PhotoPrismConnector {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    #[instrument(skip(self), fields(album = %self.album_path.display()))]
    async fn list_album_asset_ids(
        &self,
    ) -> bridge_traits::Result<std::collections::HashSet<AssetId>> {
        let ids = self.read_album().await?;
        debug!(count = ids.len(), "Read album descriptor");
        Ok(ids)
    }

    #[instrument(skip(self), fields(uid = %id))]
    async fn fetch_asset(&self, id: &AssetId) -> bridge_traits::Result<FetchedAsset> {
        Ok(self.download(id).await?)
    }

    #[instrument(skip(self), fields(uid = %id))]
    async fn get_taken_at(&self, id: &AssetId) -> bridge_traits::Result<Option<TakenAt>> {
        let photo = self.photo(id).await?;
        let present = |value: &String| !value.trim().is_empty();
        Ok(photo
            .taken_at
            .filter(present)
            .or_else(|| photo.taken_at_local.filter(present))
            .map(TakenAt::new))
    }
}
