//! # Session Cache
//!
//! Lazily acquired, shared, invalidatable session state.
//!
//! ## Usage
//!
//! ```ignore
//! let session = cache
//!     .get_or_acquire(|| async { connector.login().await })
//!     .await?;
//!
//! if response.status == 401 {
//!     cache.invalidate(&session, "HTTP 401").await;
//! }
//! ```

use crate::error::AuthError;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Default timeout for a single acquisition attempt
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(60);

/// Holds at most one session of type `S` for a provider.
///
/// Readers share the cached value through an `RwLock`. Acquisition is
/// serialized by a separate mutex and re-checks the cache after taking it, so
/// callers racing on an empty cache trigger exactly one login.
pub struct SessionCache<S> {
    provider: String,
    current: RwLock<Option<S>>,
    acquire_lock: Mutex<()>,
    acquire_timeout: Duration,
    event_bus: Option<EventBus>,
}

impl<S> SessionCache<S>
where
    S: Clone + PartialEq + Send + Sync,
{
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            current: RwLock::new(None),
            acquire_lock: Mutex::new(()),
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// The cached session, if one is established.
    pub async fn current(&self) -> Option<S> {
        self.current.read().await.clone()
    }

    /// Return the cached session or run `acquire` to establish one.
    ///
    /// A failed or timed-out acquisition leaves the cache empty so the next
    /// caller tries again.
    pub async fn get_or_acquire<F, Fut, E>(&self, acquire: F) -> Result<S, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<S, E>>,
        E: From<AuthError>,
    {
        if let Some(session) = self.current().await {
            return Ok(session);
        }

        let _guard = self.acquire_lock.lock().await;

        // Another caller may have finished acquiring while we waited
        if let Some(session) = self.current().await {
            debug!(provider = %self.provider, "Reusing session acquired concurrently");
            return Ok(session);
        }

        debug!(provider = %self.provider, "Acquiring session");
        let session = match timeout(self.acquire_timeout, acquire()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(provider = %self.provider, "Session acquisition timed out");
                return Err(AuthError::Timeout {
                    operation: format!("{} session acquisition", self.provider),
                }
                .into());
            }
        };

        *self.current.write().await = Some(session.clone());
        info!(provider = %self.provider, "Session acquired");
        self.emit(AuthEvent::SessionAcquired {
            provider: self.provider.clone(),
        });

        Ok(session)
    }

    /// Drop `stale` from the cache.
    ///
    /// Does nothing if the cache already holds a different session, which
    /// happens when several requests fail with the same stale session and one
    /// of them has already re-acquired. Returns whether the cache was cleared.
    pub async fn invalidate(&self, stale: &S, reason: &str) -> bool {
        let mut current = self.current.write().await;
        if current.as_ref() != Some(stale) {
            debug!(provider = %self.provider, "Session already replaced, skipping invalidation");
            return false;
        }

        *current = None;
        drop(current);

        warn!(provider = %self.provider, reason, "Session invalidated");
        self.emit(AuthEvent::SessionInvalidated {
            provider: self.provider.clone(),
            reason: reason.to_string(),
        });
        true
    }

    /// Forget any cached session unconditionally.
    pub async fn clear(&self) {
        *self.current.write().await = None;
    }

    fn emit(&self, event: AuthEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Auth(event)).ok();
        }
    }
}
