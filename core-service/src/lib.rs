//! Service façade and bootstrap.
//!
//! [`PhotostreamService`] turns a validated [`CoreConfig`] into a running
//! sync: the backend's `PhotoSource` and `ChangeFeed`, the cache store, the
//! ingestion pipeline and the reconcile loop. Hosts either drive single
//! passes with [`run_once`](PhotostreamService::run_once) or hand control to
//! [`run`](PhotostreamService::run) until shutdown.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{ChangeFeed, PhotoSource};
use core_auth::{ApiKey, Credentials};
use core_cache::CacheStore;
use core_ingest::{ExifToolEditor, ImageCrateCodec, IngestPipeline, IngestSettings};
use core_runtime::config::{BackendConfig, CoreConfig};
use core_runtime::events::EventBus;
use core_sync::{pump_feed, PendingTriggers, ReconcileLoop, ReconcileReport, Reconciler, Trigger};
use provider_immich::{AlbumNotificationFeed, ImmichConnector};
use provider_photoprism::{DescriptorWatcher, PhotoPrismConnector};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Origin recorded for the pass fired at startup
const STARTUP_ORIGIN: &str = "startup";

/// A fully wired album sync.
pub struct PhotostreamService {
    config: CoreConfig,
    event_bus: EventBus,
    reconciler: Arc<Reconciler>,
    feed: Box<dyn ChangeFeed>,
    trigger: Trigger,
    pending: PendingTriggers,
}

impl PhotostreamService {
    /// Build every component for the configured backend.
    ///
    /// Creates the cache directories and clears staging leftovers. Backends
    /// connect lazily, so an unreachable server is not an error here.
    #[instrument(skip(config), fields(backend = %config.backend.kind()))]
    pub async fn from_config(config: CoreConfig) -> Result<Self> {
        let event_bus = EventBus::default();
        let (source, feed) = build_backend(&config, &event_bus);

        let cache = Arc::new(CacheStore::new(
            config.file_system.clone(),
            config.cache_dir.clone(),
            &config.staging_dir_name,
            config.index_marker.clone(),
        ));
        cache.prepare().await?;

        let pipeline = Arc::new(IngestPipeline::new(
            Arc::new(ImageCrateCodec::new(config.jpeg_quality)),
            Arc::new(ExifToolEditor::new(config.exiftool_path.clone())),
            config.file_system.clone(),
            IngestSettings {
                max_dimension: config.max_dimension,
            },
        ));

        let reconciler = Arc::new(
            Reconciler::new(source, cache, pipeline, event_bus.clone())
                .with_max_concurrent_downloads(config.max_concurrent_downloads),
        );
        let (trigger, pending) = Trigger::channel(event_bus.clone());

        info!(
            cache_dir = %config.cache_dir.display(),
            feed = feed.name(),
            "Photostream service ready"
        );

        Ok(Self {
            config,
            event_bus,
            reconciler,
            feed,
            trigger,
            pending,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Bus carrying reconcile, trigger and auth events.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// A handle for requesting passes from outside the change feed.
    pub fn trigger(&self) -> Trigger {
        self.trigger.clone()
    }

    pub fn source_name(&self) -> &str {
        self.reconciler.source().name()
    }

    /// Run a single pass now.
    pub async fn run_once(&self) -> Result<ReconcileReport> {
        Ok(self.reconciler.reconcile().await?)
    }

    /// Watch for changes and reconcile until `shutdown` is cancelled.
    ///
    /// The loop also stops when the change feed ends and no other trigger
    /// handle is alive. Returns the number of passes run.
    pub async fn run(self, shutdown: CancellationToken) -> Result<usize> {
        let Self {
            config,
            reconciler,
            feed,
            trigger,
            pending,
            ..
        } = self;

        let pump = tokio::spawn(pump_feed(feed, trigger.clone(), shutdown.clone()));
        if config.reconcile_on_start {
            trigger.fire(STARTUP_ORIGIN);
        }
        drop(trigger);

        let passes = ReconcileLoop::new(reconciler, pending)
            .run(shutdown.clone())
            .await;

        shutdown.cancel();
        pump.await.map_err(|e| CoreError::Task(e.to_string()))?;

        info!(passes, "Photostream service stopped");
        Ok(passes)
    }
}

fn build_backend(
    config: &CoreConfig,
    event_bus: &EventBus,
) -> (Arc<dyn PhotoSource>, Box<dyn ChangeFeed>) {
    match &config.backend {
        BackendConfig::PhotoPrism {
            album_path,
            username,
            password,
        } => {
            let connector = PhotoPrismConnector::new(
                config.http_client.clone(),
                config.file_system.clone(),
                config.base_url.clone(),
                album_path.clone(),
                Credentials::new(username.clone(), password.clone()),
            )
            .with_event_bus(event_bus.clone());
            let watcher = DescriptorWatcher::new(
                config.file_system.clone(),
                album_path.clone(),
                config.watch_interval,
            );
            (Arc::new(connector), Box::new(watcher))
        }
        BackendConfig::Immich {
            album_id,
            api_key,
            database,
        } => {
            let connector = ImmichConnector::new(
                config.http_client.clone(),
                config.base_url.clone(),
                album_id.clone(),
                ApiKey::new(api_key.clone()),
            );
            let feed = AlbumNotificationFeed::new(database, album_id.clone());
            (Arc::new(connector), Box::new(feed))
        }
    }
}
