//! Album descriptor watcher
//!
//! PhotoPrism rewrites the album YAML whenever the album changes. The watcher
//! polls the file's size and modification time and yields a signal whenever
//! either differs from the previous poll.

use async_trait::async_trait;
use bridge_traits::{BridgeError, ChangeFeed, ChangeSignal, Clock, FileSystemAccess, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

const FEED_NAME: &str = "descriptor-watch";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    size: u64,
    modified_at: Option<i64>,
}

pub struct DescriptorWatcher {
    file_system: Arc<dyn FileSystemAccess>,
    path: PathBuf,
    interval: Duration,
    clock: Arc<dyn Clock>,
    /// `None` until the first poll; `Some(None)` while the file is absent
    last: Option<Option<Fingerprint>>,
}

impl DescriptorWatcher {
    pub fn new(
        file_system: Arc<dyn FileSystemAccess>,
        path: impl Into<PathBuf>,
        interval: Duration,
    ) -> Self {
        Self {
            file_system,
            path: path.into(),
            interval,
            clock: Arc::new(SystemClock),
            last: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn fingerprint(&self) -> bridge_traits::Result<Option<Fingerprint>> {
        match self.file_system.metadata(&self.path).await {
            Ok(meta) if meta.is_directory => Err(BridgeError::InvalidInput(format!(
                "album descriptor {} is a directory",
                self.path.display()
            ))),
            Ok(meta) => Ok(Some(Fingerprint {
                size: meta.size,
                modified_at: meta.modified_at,
            })),
            Err(BridgeError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ChangeFeed for DescriptorWatcher {
    fn name(&self) -> &str {
        FEED_NAME
    }

    /// Wait for the descriptor to change.
    ///
    /// The state seen on the first call is the baseline and is not reported.
    /// A descriptor that appears counts as a change; one that disappears does
    /// not.
    async fn next_change(&mut self) -> bridge_traits::Result<Option<ChangeSignal>> {
        if self.last.is_none() {
            let baseline = self.fingerprint().await?;
            debug!(path = ?self.path, present = baseline.is_some(), "Watching album descriptor");
            self.last = Some(baseline);
        }

        loop {
            tokio::time::sleep(self.interval).await;

            let current = self.fingerprint().await?;
            let previous = self.last.replace(current).flatten();
            trace!(path = ?self.path, ?current, "Polled album descriptor");

            if current.is_some() && current != previous {
                debug!(path = ?self.path, "Album descriptor changed");
                return Ok(Some(
                    ChangeSignal::new(FEED_NAME, self.clock.now())
                        .with_detail(self.path.display().to_string()),
                ));
            }
        }
    }
}
