//! # Reconciler
//!
//! One pass brings the cache in line with the album:
//!
//! 1. list album membership (failure aborts the pass, cache untouched)
//! 2. list cache membership (failure aborts the pass)
//! 3. diff both snapshots
//! 4. fetch, stage, normalize and commit every missing asset on a bounded
//!    worker pool
//! 5. delete every cached asset that left the album
//!
//! Per-asset failures are recorded in the report and on the event bus; the
//! asset is simply retried on the next pass.

use crate::diff::MembershipDiff;
use crate::error::{Result, SyncError};
use bridge_traits::{AssetId, Clock, PhotoSource, SystemClock};
use core_cache::{CacheStore, RemoveOutcome};
use core_ingest::{IngestOutcome, IngestPipeline};
use core_runtime::config::DEFAULT_MAX_CONCURRENT_DOWNLOADS;
use core_runtime::events::{CoreEvent, EventBus, ReconcileEvent};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn, Span};
use uuid::Uuid;

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub pass_id: String,
    pub to_add: Vec<AssetId>,
    pub to_remove: Vec<AssetId>,
    pub added: Vec<AssetId>,
    /// No capture date in the file or on the backend
    pub discarded: Vec<AssetId>,
    pub failed: Vec<(AssetId, String)>,
    pub removed: Vec<AssetId>,
    /// Listed for removal but already gone
    pub removal_noops: Vec<AssetId>,
    pub removal_failed: Vec<(AssetId, String)>,
    pub duration_ms: u64,
}

impl ReconcileReport {
    fn new(pass_id: String, diff: &MembershipDiff) -> Self {
        Self {
            pass_id,
            to_add: diff.to_add.clone(),
            to_remove: diff.to_remove.clone(),
            ..Default::default()
        }
    }

    /// True when nothing had to change.
    pub fn is_noop(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// True when every planned operation succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.removal_failed.is_empty()
    }

    fn sort(&mut self) {
        self.added.sort();
        self.discarded.sort();
        self.failed.sort();
        self.removed.sort();
        self.removal_noops.sort();
        self.removal_failed.sort();
    }
}

enum AddOutcome {
    Cached(PathBuf),
    Discarded,
}

pub struct Reconciler {
    source: Arc<dyn PhotoSource>,
    cache: Arc<CacheStore>,
    pipeline: Arc<IngestPipeline>,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
    max_concurrent_downloads: usize,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn PhotoSource>,
        cache: Arc<CacheStore>,
        pipeline: Arc<IngestPipeline>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            source,
            cache,
            pipeline,
            event_bus,
            clock: Arc::new(SystemClock),
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_max_concurrent_downloads(mut self, limit: usize) -> Self {
        self.max_concurrent_downloads = limit.max(1);
        self
    }

    pub fn source(&self) -> &Arc<dyn PhotoSource> {
        &self.source
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Run one reconciliation pass.
    ///
    /// Returns `Err` only when a membership snapshot could not be taken; in
    /// that case the cache has not been touched.
    #[instrument(skip(self), fields(pass_id = tracing::field::Empty, source = self.source.name()))]
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let pass_id = Uuid::new_v4().to_string();
        Span::current().record("pass_id", pass_id.as_str());
        let started_at = self.clock.now();

        let remote = match self.source.list_album_asset_ids().await {
            Ok(remote) => remote,
            Err(e) => {
                return Err(self.abort(&pass_id, SyncError::SourceUnavailable(e.to_string())))
            }
        };
        let local = match self.cache.list_membership().await {
            Ok(local) => local,
            Err(e) => return Err(self.abort(&pass_id, SyncError::Cache(e.to_string()))),
        };

        let diff = MembershipDiff::compute(&remote, &local);
        info!(
            remote = remote.len(),
            local = local.len(),
            to_add = diff.to_add.len(),
            to_remove = diff.to_remove.len(),
            "Computed membership diff"
        );
        self.emit(ReconcileEvent::Started {
            pass_id: pass_id.clone(),
            source: self.source.name().to_string(),
            to_add: diff.to_add.len(),
            to_remove: diff.to_remove.len(),
        });

        let mut report = ReconcileReport::new(pass_id, &diff);
        self.apply_additions(&diff.to_add, &mut report).await;
        self.apply_removals(&diff.to_remove, &mut report).await;
        report.sort();

        report.duration_ms = (self.clock.now() - started_at).num_milliseconds().max(0) as u64;
        info!(
            added = report.added.len(),
            removed = report.removed.len(),
            discarded = report.discarded.len(),
            failed = report.failed.len() + report.removal_failed.len(),
            duration_ms = report.duration_ms,
            "Reconciliation completed"
        );
        self.emit(ReconcileEvent::Completed {
            pass_id: report.pass_id.clone(),
            added: report.added.len(),
            removed: report.removed.len(),
            discarded: report.discarded.len(),
            failed: report.failed.len() + report.removal_failed.len(),
            duration_ms: report.duration_ms,
        });

        Ok(report)
    }

    async fn apply_additions(&self, to_add: &[AssetId], report: &mut ReconcileReport) {
        let outcomes: Vec<(AssetId, Result<AddOutcome>)> = stream::iter(to_add.iter().cloned())
            .map(|asset_id| async move {
                let outcome = self.add_asset(&asset_id).await;
                (asset_id, outcome)
            })
            .buffer_unordered(self.max_concurrent_downloads)
            .collect()
            .await;

        for (asset_id, outcome) in outcomes {
            match outcome {
                Ok(AddOutcome::Cached(path)) => {
                    debug!(asset_id = %asset_id, path = ?path, "Asset cached");
                    self.emit(ReconcileEvent::AssetCached {
                        pass_id: report.pass_id.clone(),
                        asset_id: asset_id.to_string(),
                    });
                    report.added.push(asset_id);
                }
                Ok(AddOutcome::Discarded) => {
                    self.emit(ReconcileEvent::AssetDiscarded {
                        pass_id: report.pass_id.clone(),
                        asset_id: asset_id.to_string(),
                    });
                    report.discarded.push(asset_id);
                }
                Err(e) => {
                    error!(asset_id = %asset_id, error = %e, "Failed to add asset");
                    self.emit(ReconcileEvent::AssetFailed {
                        pass_id: report.pass_id.clone(),
                        asset_id: asset_id.to_string(),
                        message: e.to_string(),
                    });
                    report.failed.push((asset_id, e.to_string()));
                }
            }
        }
    }

    async fn apply_removals(&self, to_remove: &[AssetId], report: &mut ReconcileReport) {
        for asset_id in to_remove {
            match self.cache.remove(asset_id).await {
                Ok(RemoveOutcome::Removed { files }) => {
                    debug!(asset_id = %asset_id, files, "Asset removed");
                    self.emit(ReconcileEvent::AssetRemoved {
                        pass_id: report.pass_id.clone(),
                        asset_id: asset_id.to_string(),
                    });
                    report.removed.push(asset_id.clone());
                }
                Ok(RemoveOutcome::NotPresent) => {
                    debug!(asset_id = %asset_id, "Asset already absent");
                    report.removal_noops.push(asset_id.clone());
                }
                Err(e) => {
                    warn!(asset_id = %asset_id, error = %e, "Failed to remove asset");
                    report.removal_failed.push((asset_id.clone(), e.to_string()));
                }
            }
        }
    }

    /// Fetch, stage, normalize and publish one asset.
    async fn add_asset(&self, asset_id: &AssetId) -> Result<AddOutcome> {
        let asset = self
            .source
            .fetch_asset(asset_id)
            .await
            .map_err(|e| SyncError::AssetFetchFailed {
                asset_id: asset_id.to_string(),
                message: e.to_string(),
            })?;

        let extension = asset
            .hint
            .extension()
            .or_else(|| self.pipeline.codec().sniff_extension(&asset.bytes))
            .ok_or_else(|| SyncError::ingest(asset_id, "cannot determine file type"))?;

        let staged = self
            .cache
            .stage(asset_id, asset.bytes, &extension)
            .await
            .map_err(|e| SyncError::ingest(asset_id, e))?;

        let outcome = self
            .pipeline
            .normalize(asset_id, &staged.path, self.source.as_ref())
            .await;

        match outcome {
            Ok(IngestOutcome::Ready(path)) => match self.cache.commit(&path).await {
                Ok(published) => Ok(AddOutcome::Cached(published)),
                Err(e) => {
                    self.discard_staged(&staged.path).await;
                    Err(SyncError::ingest(asset_id, e))
                }
            },
            Ok(IngestOutcome::Discarded) => {
                self.discard_staged(&staged.path).await;
                Ok(AddOutcome::Discarded)
            }
            Err(e) => {
                self.discard_staged(&staged.path).await;
                Err(SyncError::ingest(asset_id, e))
            }
        }
    }

    /// Remove a staged file and the JPEG it may have been converted to.
    async fn discard_staged(&self, staged_path: &Path) {
        let converted = staged_path.with_extension("jpg");
        for path in [staged_path, converted.as_path()] {
            if let Err(e) = self.cache.discard(path).await {
                warn!(path = ?path, error = %e, "Failed to discard staged file");
            }
        }
    }

    fn abort(&self, pass_id: &str, error: SyncError) -> SyncError {
        error!(error = %error, "Reconciliation aborted");
        self.emit(ReconcileEvent::Aborted {
            pass_id: pass_id.to_string(),
            message: error.to_string(),
        });
        error
    }

    fn emit(&self, event: ReconcileEvent) {
        self.event_bus.emit(CoreEvent::Reconcile(event)).ok();
    }
}
