//! Descriptor reading and watching against real files.

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::{
    AssetId, BridgeError, ChangeFeed, FixedClock, HttpClient, HttpRequest, HttpResponse,
    PhotoSource,
};
use chrono::{TimeZone, Utc};
use core_auth::Credentials;
use provider_photoprism::{DescriptorWatcher, PhotoPrismConnector};
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::time::timeout;

const POLL: Duration = Duration::from_millis(20);

/// Membership never touches the network.
struct OfflineHttp;

#[async_trait]
impl HttpClient for OfflineHttp {
    async fn execute(&self, request: HttpRequest) -> bridge_traits::Result<HttpResponse> {
        Err(BridgeError::NotAvailable(format!("offline: {}", request.url)))
    }
}

fn watcher(path: &std::path::Path) -> DescriptorWatcher {
    DescriptorWatcher::new(Arc::new(TokioFileSystem::new()), path, POLL)
}

#[tokio::test]
async fn test_connector_lists_visible_photos_from_descriptor() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("album.yml");
    fs::write(
        &path,
        "UID: aq1\nPhotos:\n  - UID: pq1\n  - UID: pq2\n    Hidden: true\n  - UID: pq3\n",
    )
    .unwrap();

    let connector = PhotoPrismConnector::new(
        Arc::new(OfflineHttp),
        Arc::new(TokioFileSystem::new()),
        "http://photoprism.invalid",
        &path,
        Credentials::new("admin", "secret"),
    );

    let ids = connector.list_album_asset_ids().await.unwrap();
    let expected: HashSet<AssetId> = ["pq1", "pq3"]
        .iter()
        .map(|id| AssetId::parse(*id).unwrap())
        .collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_connector_rejects_truncated_descriptor() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("album.yml");
    let connector = PhotoPrismConnector::new(
        Arc::new(OfflineHttp),
        Arc::new(TokioFileSystem::new()),
        "http://photoprism.invalid",
        &path,
        Credentials::new("admin", "secret"),
    );

    for contents in ["", "~\n"] {
        fs::write(&path, contents).unwrap();
        let result = connector.list_album_asset_ids().await;
        assert!(
            matches!(result, Err(BridgeError::InvalidInput(_))),
            "{contents:?} read as {result:?}"
        );
    }
}

#[tokio::test]
async fn test_malformed_descriptor_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("album.yml");
    fs::write(&path, "Photos:\n  - Hidden: true\n").unwrap();

    let connector = PhotoPrismConnector::new(
        Arc::new(OfflineHttp),
        Arc::new(TokioFileSystem::new()),
        "http://photoprism.invalid",
        &path,
        Credentials::new("admin", "secret"),
    );

    assert!(matches!(
        connector.list_album_asset_ids().await,
        Err(BridgeError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_modification_is_signalled() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("album.yml");
    fs::write(&path, "Photos: []\n").unwrap();

    let observed_at = Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).unwrap();
    let mut watcher = watcher(&path).with_clock(Arc::new(FixedClock(observed_at)));
    let writer_path = path.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(&writer_path, "Photos:\n  - UID: pq1\n").unwrap();
    });

    let signal = timeout(Duration::from_secs(5), watcher.next_change())
        .await
        .expect("watcher should report the change")
        .unwrap()
        .unwrap();
    assert_eq!(signal.origin, "descriptor-watch");
    assert_eq!(signal.detail.as_deref(), Some(path.display().to_string().as_str()));
    assert_eq!(signal.observed_at, observed_at);
}

#[tokio::test]
async fn test_appearing_descriptor_is_signalled() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("album.yml");

    let mut watcher = watcher(&path);
    let writer_path = path.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(&writer_path, "Photos: []\n").unwrap();
    });

    let signal = timeout(Duration::from_secs(5), watcher.next_change()).await;
    assert!(matches!(signal, Ok(Ok(Some(_)))));
}

#[tokio::test]
async fn test_unchanged_descriptor_is_quiet() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("album.yml");
    fs::write(&path, "Photos: []\n").unwrap();

    let mut watcher = watcher(&path);
    let result = timeout(Duration::from_millis(300), watcher.next_change()).await;
    assert!(result.is_err(), "no signal expected for an untouched file");
}
