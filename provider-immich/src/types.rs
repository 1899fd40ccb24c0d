//! Immich API response types (only the fields we use)

use serde::Deserialize;

/// `GET /api/album/{id}`
#[derive(Debug, Deserialize)]
pub struct Album {
    /// Required: a body without it is not an album listing.
    pub assets: Vec<AssetRef>,
}

#[derive(Debug, Deserialize)]
pub struct AssetRef {
    pub id: String,
}

/// `GET /api/asset/assetById/{id}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    #[serde(default)]
    pub exif_info: Option<ExifInfo>,
    #[serde(default)]
    pub local_date_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExifInfo {
    #[serde(default)]
    pub date_time_original: Option<String>,
}

/// Payload of an `albums` notification
#[derive(Debug, Deserialize)]
pub struct AlbumNotification {
    pub record: Option<NotificationRecord>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationRecord {
    pub id: Option<String>,
}
