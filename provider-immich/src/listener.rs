//! Album change notifications from the Immich database.
//!
//! Immich publishes row changes of its `albums` table on the PostgreSQL
//! channel of the same name, with a JSON payload carrying the changed record:
//!
//! ```json
//! {"record": {"id": "5b9a...", "albumName": "Photostream", ...}}
//! ```

use async_trait::async_trait;
use bridge_traits::{BridgeError, ChangeFeed, ChangeSignal, Clock, SystemClock};
use core_runtime::config::DatabaseConfig;
use sqlx::postgres::{PgConnectOptions, PgListener, PgPoolOptions};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::error::ImmichError;
use crate::types::AlbumNotification;

/// PostgreSQL notification channel for album changes
pub const NOTIFY_CHANNEL: &str = "albums";

const FEED_NAME: &str = "album-notify";

/// Whether a notification payload refers to `album_id`.
///
/// Malformed payloads are logged and never match.
pub fn payload_matches(payload: &str, album_id: &str) -> bool {
    match serde_json::from_str::<AlbumNotification>(payload) {
        Ok(notification) => notification
            .record
            .and_then(|record| record.id)
            .is_some_and(|id| id == album_id),
        Err(e) => {
            warn!(error = %e, "Ignoring malformed album notification");
            false
        }
    }
}

/// `ChangeFeed` over `LISTEN albums`, filtered to one album.
///
/// Connects on the first call to `next_change`. A dropped connection is
/// re-established by the listener on the next receive.
pub struct AlbumNotificationFeed {
    options: PgConnectOptions,
    album_id: String,
    listener: Option<PgListener>,
    clock: Arc<dyn Clock>,
}

impl AlbumNotificationFeed {
    pub fn new(database: &DatabaseConfig, album_id: impl Into<String>) -> Self {
        let options = PgConnectOptions::new()
            .host(&database.host)
            .port(database.port)
            .database(&database.name)
            .username(&database.user)
            .password(&database.password);

        Self {
            options,
            album_id: album_id.into(),
            listener: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn connect(&self) -> Result<PgListener, ImmichError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_lazy_with(self.options.clone());
        let mut listener = PgListener::connect_with(&pool).await?;
        listener.listen(NOTIFY_CHANNEL).await?;
        info!(channel = NOTIFY_CHANNEL, album_id = %self.album_id, "Listening for album notifications");
        Ok(listener)
    }
}

#[async_trait]
impl ChangeFeed for AlbumNotificationFeed {
    fn name(&self) -> &str {
        FEED_NAME
    }

    async fn next_change(&mut self) -> bridge_traits::Result<Option<ChangeSignal>> {
        loop {
            if self.listener.is_none() {
                let listener = self.connect().await.map_err(BridgeError::from)?;
                self.listener = Some(listener);
            }
            let Some(listener) = self.listener.as_mut() else {
                continue;
            };

            let notification = match listener.recv().await {
                Ok(notification) => notification,
                Err(e) => {
                    self.listener = None;
                    return Err(ImmichError::Listener(e).into());
                }
            };

            let payload = notification.payload();
            trace!(payload, "Album notification");
            if payload_matches(payload, &self.album_id) {
                debug!(album_id = %self.album_id, "Album changed");
                return Ok(Some(
                    ChangeSignal::new(FEED_NAME, self.clock.now())
                        .with_detail(format!("{}:{}", NOTIFY_CHANNEL, self.album_id)),
                ));
            }
        }
    }
}
