//! Cache store behavior against a real temporary directory.

use bridge_desktop::TokioFileSystem;
use bridge_traits::AssetId;
use bytes::Bytes;
use core_cache::{CacheError, CacheStore, RemoveOutcome};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn store(root: &Path) -> CacheStore {
    CacheStore::new(Arc::new(TokioFileSystem::new()), root, ".staging", "index")
}

fn id(raw: &str) -> AssetId {
    AssetId::parse(raw).unwrap()
}

fn ids(raw: &[&str]) -> HashSet<AssetId> {
    raw.iter().map(|r| id(r)).collect()
}

#[tokio::test]
async fn test_missing_directory_is_created_and_empty() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("cache");
    let store = store(&root);

    assert!(store.list_membership().await.unwrap().is_empty());
    assert!(root.is_dir());
}

#[tokio::test]
async fn test_membership_strips_extensions_and_skips_non_assets() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    for name in [
        "pqa1.jpg",
        "pqb2.JPG",
        "with.dots.png",
        "index.html",
        "album-index.json",
        ".DS_Store",
    ] {
        fs::write(root.join(name), b"x").unwrap();
    }
    fs::create_dir_all(root.join(".staging")).unwrap();
    fs::write(root.join(".staging").join("pqc3.jpg"), b"x").unwrap();
    fs::create_dir_all(root.join("subdir")).unwrap();

    let members = store(root).list_membership().await.unwrap();

    assert_eq!(members, ids(&["pqa1", "pqb2", "with.dots"]));
}

#[tokio::test]
async fn test_materialize_publishes_file() {
    let dir = tempdir().unwrap();
    let store = store(dir.path());

    let path = store
        .materialize(&id("pqa1"), Bytes::from_static(b"jpeg"), ".jpg")
        .await
        .unwrap();

    assert_eq!(path, dir.path().join("pqa1.jpg"));
    assert_eq!(fs::read(&path).unwrap(), b"jpeg");
    assert_eq!(store.list_membership().await.unwrap(), ids(&["pqa1"]));
    assert_eq!(fs::read_dir(store.staging_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_staged_asset_is_invisible_until_committed() {
    let dir = tempdir().unwrap();
    let store = store(dir.path());

    let staged = store
        .stage(&id("pqa1"), Bytes::from_static(b"png"), ".png")
        .await
        .unwrap();
    assert!(store.list_membership().await.unwrap().is_empty());

    // Normalization may change the extension before commit
    let converted = staged.path.with_extension("jpg");
    fs::rename(&staged.path, &converted).unwrap();

    let published = store.commit(&converted).await.unwrap();
    assert_eq!(published, dir.path().join("pqa1.jpg"));
    assert_eq!(store.list_membership().await.unwrap(), ids(&["pqa1"]));
}

#[tokio::test]
async fn test_commit_rejects_paths_outside_staging() {
    let dir = tempdir().unwrap();
    let store = store(dir.path());
    let outside = dir.path().join("pqa1.jpg");
    fs::write(&outside, b"x").unwrap();

    let result = store.commit(&outside).await;
    assert!(matches!(result, Err(CacheError::NotStaged(_))));
}

#[tokio::test]
async fn test_stage_rejects_bad_extension() {
    let dir = tempdir().unwrap();
    let store = store(dir.path());

    let result = store.stage(&id("pqa1"), Bytes::new(), "jpg").await;
    assert!(matches!(result, Err(CacheError::InvalidExtension(_))));
}

#[tokio::test]
async fn test_remove_deletes_all_extensions_of_asset() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("pqa1.jpg"), b"x").unwrap();
    fs::write(root.join("pqa1.png"), b"x").unwrap();
    fs::write(root.join("pqa10.jpg"), b"x").unwrap();
    fs::write(root.join("pqa1-index.json"), b"x").unwrap();

    let outcome = store(root).remove(&id("pqa1")).await.unwrap();

    assert_eq!(outcome, RemoveOutcome::Removed { files: 2 });
    assert!(!root.join("pqa1.jpg").exists());
    assert!(root.join("pqa10.jpg").exists());
    assert!(root.join("pqa1-index.json").exists());
}

#[tokio::test]
async fn test_remove_missing_asset_is_noop() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("other.jpg"), b"x").unwrap();

    let outcome = store(dir.path()).remove(&id("pqa1")).await.unwrap();

    assert_eq!(outcome, RemoveOutcome::NotPresent);
    assert!(dir.path().join("other.jpg").exists());
}

#[tokio::test]
async fn test_prepare_sweeps_staging_leftovers() {
    let dir = tempdir().unwrap();
    let staging = dir.path().join(".staging");
    fs::create_dir_all(staging.join("nested")).unwrap();
    fs::write(staging.join("half.jpg"), b"x").unwrap();
    fs::write(staging.join("half.jpg_original"), b"x").unwrap();

    let store = store(dir.path());
    store.prepare().await.unwrap();

    assert_eq!(fs::read_dir(&staging).unwrap().count(), 0);
    assert_eq!(store.sweep_staging().await.unwrap(), 0);
}

#[tokio::test]
async fn test_discard_is_idempotent() {
    let dir = tempdir().unwrap();
    let store = store(dir.path());
    let staged = store
        .stage(&id("pqa1"), Bytes::from_static(b"x"), ".jpg")
        .await
        .unwrap();

    store.discard(&staged.path).await.unwrap();
    store.discard(&staged.path).await.unwrap();
    assert!(!staged.path.exists());
}
