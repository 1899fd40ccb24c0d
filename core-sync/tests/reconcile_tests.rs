//! End-to-end reconciliation against an on-disk cache.
//!
//! The source and metadata editor are in-memory fakes; the cache, image codec
//! and filesystem are the real implementations.

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::{
    AssetId, BridgeError, ChangeFeed, ChangeSignal, FetchedAsset, FilenameHint, PhotoSource,
    TakenAt,
};
use bytes::Bytes;
use core_cache::CacheStore;
use core_ingest::{ImageCrateCodec, IngestPipeline, IngestSettings, MetadataEditor};
use core_runtime::events::{CoreEvent, EventBus, ReconcileEvent};
use core_sync::{pump_feed, ReconcileLoop, Reconciler, SyncError, Trigger};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock Implementations
// ============================================================================

/// Album held in memory. Every asset is a small JPEG.
struct FakeSource {
    album: Mutex<HashSet<AssetId>>,
    unreachable: AtomicBool,
    broken: HashSet<String>,
    corrupt: HashSet<String>,
    dates: HashMap<String, String>,
    fetched: Mutex<Vec<String>>,
}

impl FakeSource {
    fn new(ids: &[&str]) -> Self {
        Self {
            album: Mutex::new(ids.iter().map(|id| asset(id)).collect()),
            unreachable: AtomicBool::new(false),
            broken: HashSet::new(),
            corrupt: HashSet::new(),
            dates: HashMap::new(),
            fetched: Mutex::new(Vec::new()),
        }
    }

    fn with_broken(mut self, id: &str) -> Self {
        self.broken.insert(id.to_string());
        self
    }

    fn with_corrupt(mut self, id: &str) -> Self {
        self.corrupt.insert(id.to_string());
        self
    }

    fn with_date(mut self, id: &str, date: &str) -> Self {
        self.dates.insert(id.to_string(), date.to_string());
        self
    }

    fn fetched(&self) -> Vec<String> {
        let mut fetched = self.fetched.lock().unwrap().clone();
        fetched.sort();
        fetched
    }
}

#[async_trait]
impl PhotoSource for FakeSource {
    fn name(&self) -> &str {
        "fake"
    }

    async fn list_album_asset_ids(&self) -> bridge_traits::Result<HashSet<AssetId>> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("connection refused".to_string()));
        }
        Ok(self.album.lock().unwrap().clone())
    }

    async fn fetch_asset(&self, id: &AssetId) -> bridge_traits::Result<FetchedAsset> {
        self.fetched.lock().unwrap().push(id.to_string());
        if self.broken.contains(id.as_str()) {
            return Err(BridgeError::OperationFailed("HTTP 500".to_string()));
        }
        let bytes = if self.corrupt.contains(id.as_str()) {
            Bytes::from_static(b"\xFF\xD8\xFF truncated")
        } else {
            jpeg_bytes(24, 16)
        };
        Ok(FetchedAsset {
            bytes,
            hint: FilenameHint::new(
                Some(format!("{}.jpg", id)),
                Some("image/jpeg".to_string()),
            ),
        })
    }

    async fn get_taken_at(&self, id: &AssetId) -> bridge_traits::Result<Option<TakenAt>> {
        Ok(self.dates.get(id.as_str()).map(TakenAt::new))
    }
}

/// Treats files whose stem starts with `undated` as carrying no capture date.
struct FakeEditor;

#[async_trait]
impl MetadataEditor for FakeEditor {
    async fn repair(&self, _path: &Path) -> core_ingest::Result<()> {
        Ok(())
    }

    async fn capture_date(&self, path: &Path) -> core_ingest::Result<Option<String>> {
        let stem = path.file_stem().unwrap().to_string_lossy();
        if stem.starts_with("undated") {
            Ok(None)
        } else {
            Ok(Some("2020:01:01 00:00:00".to_string()))
        }
    }

    async fn write_capture_date(&self, _path: &Path, _exif: &str) -> core_ingest::Result<()> {
        Ok(())
    }

    async fn copy_metadata(&self, _from: &Path, _to: &Path) -> core_ingest::Result<()> {
        Ok(())
    }
}

/// Replays a fixed list of signals, then closes.
struct ScriptedFeed {
    signals: Vec<ChangeSignal>,
}

#[async_trait]
impl ChangeFeed for ScriptedFeed {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn next_change(&mut self) -> bridge_traits::Result<Option<ChangeSignal>> {
        if self.signals.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.signals.remove(0)))
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn asset(id: &str) -> AssetId {
    AssetId::parse(id).unwrap()
}

fn ids(raw: &[&str]) -> Vec<AssetId> {
    raw.iter().map(|id| asset(id)).collect()
}

fn jpeg_bytes(width: u32, height: u32) -> Bytes {
    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 160, 30])))
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
        .unwrap();
    Bytes::from(buffer)
}

struct Harness {
    dir: TempDir,
    cache: Arc<CacheStore>,
    source: Arc<FakeSource>,
    bus: EventBus,
    reconciler: Arc<Reconciler>,
}

impl Harness {
    fn new(source: FakeSource, cached: &[&str]) -> Self {
        let dir = tempdir().unwrap();
        for id in cached {
            fs::write(dir.path().join(format!("{}.jpg", id)), jpeg_bytes(8, 8)).unwrap();
        }

        let fs_access = Arc::new(TokioFileSystem::new());
        let cache = Arc::new(CacheStore::new(
            fs_access.clone(),
            dir.path(),
            ".staging",
            "index",
        ));
        let pipeline = Arc::new(IngestPipeline::new(
            Arc::new(ImageCrateCodec::default()),
            Arc::new(FakeEditor),
            fs_access,
            IngestSettings::default(),
        ));
        let source = Arc::new(source);
        let bus = EventBus::new(64);
        let reconciler = Arc::new(
            Reconciler::new(source.clone(), cache.clone(), pipeline, bus.clone())
                .with_max_concurrent_downloads(2),
        );

        Self {
            dir,
            cache,
            source,
            bus,
            reconciler,
        }
    }

    async fn membership(&self) -> Vec<AssetId> {
        let mut members: Vec<AssetId> = self.cache.list_membership().await.unwrap().into_iter().collect();
        members.sort();
        members
    }

    fn staging_is_empty(&self) -> bool {
        let staging = self.dir.path().join(".staging");
        !staging.exists() || fs::read_dir(staging).unwrap().count() == 0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_pass_adds_missing_and_removes_stale() {
    let harness = Harness::new(FakeSource::new(&["A", "B", "C"]), &["B", "D"]);

    let report = harness.reconciler.reconcile().await.unwrap();

    assert_eq!(report.to_add, ids(&["A", "C"]));
    assert_eq!(report.to_remove, ids(&["D"]));
    assert_eq!(report.added, ids(&["A", "C"]));
    assert_eq!(report.removed, ids(&["D"]));
    assert!(report.is_clean());
    assert_eq!(harness.source.fetched(), vec!["A", "C"]);
    assert_eq!(harness.membership().await, ids(&["A", "B", "C"]));
    assert!(harness.staging_is_empty());
}

#[tokio::test]
async fn test_failed_fetch_does_not_block_others() {
    let source = FakeSource::new(&["A", "B", "C"]).with_broken("C");
    let harness = Harness::new(source, &["B", "D"]);

    let report = harness.reconciler.reconcile().await.unwrap();

    assert_eq!(report.added, ids(&["A"]));
    assert_eq!(report.removed, ids(&["D"]));
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, asset("C"));
    assert!(report.failed[0].1.contains("HTTP 500"));
    assert_eq!(harness.membership().await, ids(&["A", "B"]));
}

#[tokio::test]
async fn test_failed_ingest_leaves_no_staged_file() {
    let source = FakeSource::new(&["A", "C"]).with_corrupt("C");
    let harness = Harness::new(source, &[]);

    let report = harness.reconciler.reconcile().await.unwrap();

    assert_eq!(report.added, ids(&["A"]));
    assert_eq!(report.failed.len(), 1);
    assert_eq!(harness.membership().await, ids(&["A"]));
    assert!(harness.staging_is_empty());
}

#[tokio::test]
async fn test_second_pass_is_noop() {
    let harness = Harness::new(FakeSource::new(&["A", "B"]), &["C"]);

    let first = harness.reconciler.reconcile().await.unwrap();
    assert!(!first.is_noop());

    let second = harness.reconciler.reconcile().await.unwrap();
    assert!(second.is_noop());
    assert_ne!(first.pass_id, second.pass_id);
    assert_eq!(harness.source.fetched(), vec!["A", "B"]);
}

#[tokio::test]
async fn test_unreachable_source_aborts_without_touching_cache() {
    let harness = Harness::new(FakeSource::new(&[]), &["B", "D"]);
    harness.source.unreachable.store(true, Ordering::SeqCst);
    let mut events = harness.bus.subscribe();

    let result = harness.reconciler.reconcile().await;

    assert!(matches!(result, Err(SyncError::SourceUnavailable(_))));
    assert_eq!(harness.membership().await, ids(&["B", "D"]));
    assert!(matches!(
        events.recv().await.unwrap(),
        CoreEvent::Reconcile(ReconcileEvent::Aborted { .. })
    ));
}

#[tokio::test]
async fn test_empty_album_empties_cache() {
    let harness = Harness::new(FakeSource::new(&[]), &["B", "D"]);

    let report = harness.reconciler.reconcile().await.unwrap();

    assert_eq!(report.removed, ids(&["B", "D"]));
    assert!(harness.membership().await.is_empty());
}

#[tokio::test]
async fn test_undated_asset_is_discarded_or_backfilled() {
    let source = FakeSource::new(&["undated1", "undated2"]).with_date("undated2", "2023-05-01T12:00:00Z");
    let harness = Harness::new(source, &[]);

    let report = harness.reconciler.reconcile().await.unwrap();

    assert_eq!(report.discarded, ids(&["undated1"]));
    assert_eq!(report.added, ids(&["undated2"]));
    assert_eq!(harness.membership().await, ids(&["undated2"]));
    assert!(harness.staging_is_empty());
}

#[tokio::test]
async fn test_events_follow_pass_lifecycle() {
    let harness = Harness::new(FakeSource::new(&["A"]), &["D"]);
    let mut events = harness.bus.subscribe();

    let report = harness.reconciler.reconcile().await.unwrap();

    let mut seen = Vec::new();
    while let Ok(CoreEvent::Reconcile(event)) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(
        &seen[0],
        ReconcileEvent::Started { to_add: 1, to_remove: 1, pass_id, .. } if *pass_id == report.pass_id
    ));
    assert!(seen.contains(&ReconcileEvent::AssetCached {
        pass_id: report.pass_id.clone(),
        asset_id: "A".to_string(),
    }));
    assert!(seen.contains(&ReconcileEvent::AssetRemoved {
        pass_id: report.pass_id.clone(),
        asset_id: "D".to_string(),
    }));
    assert!(matches!(
        seen.last(),
        Some(ReconcileEvent::Completed { added: 1, removed: 1, failed: 0, .. })
    ));
}

#[tokio::test]
async fn test_loop_coalesces_burst_into_one_pass() {
    let harness = Harness::new(FakeSource::new(&["A"]), &[]);
    let mut events = harness.bus.subscribe();
    let (trigger, pending) = Trigger::channel(harness.bus.clone());

    trigger.fire("one");
    trigger.fire("two");
    trigger.fire("three");

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(
        ReconcileLoop::new(harness.reconciler.clone(), pending).run(shutdown.clone()),
    );

    loop {
        if let CoreEvent::Reconcile(ReconcileEvent::Completed { .. }) = events.recv().await.unwrap()
        {
            break;
        }
    }
    shutdown.cancel();

    assert_eq!(handle.await.unwrap(), 1);
    assert_eq!(harness.membership().await, ids(&["A"]));
}

#[tokio::test]
async fn test_pump_forwards_feed_into_trigger() {
    let bus = EventBus::new(16);
    let (trigger, mut pending) = Trigger::channel(bus);
    let now = chrono::Utc::now();
    let feed = ScriptedFeed {
        signals: vec![
            ChangeSignal::new("scripted", now),
            ChangeSignal::new("scripted", now).with_detail("second"),
        ],
    };

    pump_feed(Box::new(feed), trigger, CancellationToken::new()).await;

    assert_eq!(pending.wait().await.as_deref(), Some("scripted"));
    assert_eq!(pending.wait().await, None);
}
