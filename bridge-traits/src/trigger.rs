//! Change Feed Abstraction
//!
//! Backends report "the album may have changed" through a pull-based feed.
//! The core does not care what changed; every signal just requests another
//! reconciliation pass.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSignal {
    /// Feed that produced the signal, e.g. `descriptor-watch`
    pub origin: String,
    /// Free-form detail for logging (file path, notification channel)
    pub detail: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl ChangeSignal {
    pub fn new(origin: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            origin: origin.into(),
            detail: None,
            observed_at,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Change feed trait
///
/// `next_change` waits until the next relevant change. `Ok(None)` means the
/// feed is closed and will not produce more signals. Errors are reported to
/// the caller, which decides whether to keep pulling.
#[async_trait]
pub trait ChangeFeed: Send {
    fn name(&self) -> &str;

    async fn next_change(&mut self) -> Result<Option<ChangeSignal>>;
}
