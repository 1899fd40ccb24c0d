//! PhotoPrism API response types

use serde::Deserialize;

/// `POST /api/v1/session`
#[derive(Debug, Deserialize)]
pub struct SessionResponse {
    #[serde(default)]
    pub id: Option<String>,
}

/// `GET /api/v1/config` (only the fields we use)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[serde(default)]
    pub download_token: Option<String>,
}

/// `GET /api/v1/photos/{uid}` (only the fields we use)
#[derive(Debug, Deserialize)]
pub struct Photo {
    #[serde(rename = "UID", default)]
    pub uid: Option<String>,

    /// Capture time in UTC (RFC 3339)
    #[serde(rename = "TakenAt", default)]
    pub taken_at: Option<String>,

    /// Capture time in the photo's local time zone
    #[serde(rename = "TakenAtLocal", default)]
    pub taken_at_local: Option<String>,
}
