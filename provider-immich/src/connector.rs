//! Immich API connector

use async_trait::async_trait;
use bridge_traits::{
    AssetId, FetchedAsset, FilenameHint, HttpClient, HttpMethod, HttpRequest, HttpResponse,
    PhotoSource, TakenAt,
};
use core_auth::ApiKey;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{ImmichError, Result};
use crate::types::{Album, Asset};

const PROVIDER_NAME: &str = "immich";

const API_KEY_HEADER: &str = "x-api-key";

/// Immich connector
///
/// Stateless apart from the API key, which is sent with every request.
///
/// # Example
///
/// ```ignore
/// let connector = ImmichConnector::new(http_client, "http://immich:2283", album_id, ApiKey::new(key));
/// let ids = connector.list_album_asset_ids().await?;
/// ```
pub struct ImmichConnector {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    album_id: String,
    api_key: ApiKey,
}

impl ImmichConnector {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        album_id: impl Into<String>,
        api_key: ApiKey,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            album_id: album_id.into(),
            api_key,
        }
    }

    pub fn album_id(&self) -> &str {
        &self.album_id
    }

    fn request(&self, method: HttpMethod, path: &str, accept: &str) -> HttpRequest {
        HttpRequest::new(method, format!("{}/api/{}", self.base_url, path))
            .header(API_KEY_HEADER, self.api_key.expose())
            .header("Accept", accept)
    }

    /// Send a request and map error statuses. `not_found` builds the error
    /// used for a 404.
    async fn send<F>(&self, request: HttpRequest, not_found: F) -> Result<HttpResponse>
    where
        F: FnOnce() -> ImmichError,
    {
        let response = self.http_client.execute(request).await?;
        match response.status {
            status if (200..300).contains(&status) => Ok(response),
            401 | 403 => Err(ImmichError::Unauthorized(response.status)),
            404 => Err(not_found()),
            status => Err(ImmichError::ApiError {
                status_code: status,
                message: String::from_utf8_lossy(&response.body).chars().take(200).collect(),
            }),
        }
    }

    async fn get_json<T, F>(&self, path: &str, not_found: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnOnce() -> ImmichError,
    {
        let request = self.request(HttpMethod::Get, path, "application/json");
        self.send(request, not_found)
            .await?
            .json::<T>()
            .map_err(|e| ImmichError::ParseError(e.to_string()))
    }

    async fn album_asset_ids(&self) -> Result<HashSet<AssetId>> {
        let album: Album = self
            .get_json(&format!("album/{}", self.album_id), || {
                ImmichError::AlbumNotFound {
                    album_id: self.album_id.clone(),
                }
            })
            .await?;

        album
            .assets
            .into_iter()
            .map(|asset| {
                AssetId::parse(asset.id).map_err(|e| ImmichError::ParseError(e.to_string()))
            })
            .collect()
    }

    async fn download(&self, id: &AssetId) -> Result<FetchedAsset> {
        let request = self.request(
            HttpMethod::Post,
            &format!("asset/download/{}", id),
            "application/octet-stream",
        );
        let response = self
            .send(request, || ImmichError::AssetNotFound {
                asset_id: id.to_string(),
            })
            .await?;

        let hint = FilenameHint::from_headers(&response.headers);
        debug!(asset_id = %id, bytes = response.body.len(), filename = ?hint.filename, "Downloaded asset");
        Ok(FetchedAsset {
            bytes: response.body,
            hint,
        })
    }

    async fn taken_at(&self, id: &AssetId) -> Result<Option<TakenAt>> {
        let asset: Asset = self
            .get_json(&format!("asset/assetById/{}", id), || {
                ImmichError::AssetNotFound {
                    asset_id: id.to_string(),
                }
            })
            .await?;

        let from_exif = asset
            .exif_info
            .and_then(|exif| exif.date_time_original)
            .filter(|value| !value.trim().is_empty());
        if from_exif.is_none() {
            debug!(asset_id = %id, "No EXIF capture date, using localDateTime");
        }

        Ok(from_exif
            .or(asset.local_date_time)
            .filter(|value| !value.trim().is_empty())
            .map(TakenAt::new))
    }
}

#[async_trait]
impl PhotoSource for ImmichConnector {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    #[instrument(skip(self), fields(album_id = %self.album_id))]
    async fn list_album_asset_ids(&self) -> bridge_traits::Result<HashSet<AssetId>> {
        let ids = self.album_asset_ids().await?;
        debug!(count = ids.len(), "Listed album assets");
        Ok(ids)
    }

    #[instrument(skip(self), fields(asset_id = %id))]
    async fn fetch_asset(&self, id: &AssetId) -> bridge_traits::Result<FetchedAsset> {
        Ok(self.download(id).await?)
    }

    #[instrument(skip(self), fields(asset_id = %id))]
    async fn get_taken_at(&self, id: &AssetId) -> bridge_traits::Result<Option<TakenAt>> {
        Ok(self.taken_at(id).await?)
    }
}
