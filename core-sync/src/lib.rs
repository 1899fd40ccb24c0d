//! # Album Reconciliation
//!
//! Keeps the local cache equal to the remote album.
//!
//! ## Components
//!
//! - [`MembershipDiff`]: what to fetch and what to delete
//! - [`Reconciler`]: runs one pass (list, diff, add, remove)
//! - [`Trigger`] / [`PendingTriggers`]: coalescing change channel
//! - [`ReconcileLoop`]: serializes passes, one per coalesced trigger
//! - [`pump_feed`]: forwards a backend change feed into the trigger
//!
//! ## Example
//!
//! ```ignore
//! let (trigger, pending) = Trigger::channel(event_bus.clone());
//! let reconciler = Arc::new(Reconciler::new(source, cache, pipeline, event_bus));
//!
//! tokio::spawn(pump_feed(feed, trigger.clone(), shutdown.clone()));
//! trigger.fire("startup");
//! ReconcileLoop::new(reconciler, pending).run(shutdown).await;
//! ```

pub mod diff;
pub mod error;
pub mod reconciler;
pub mod trigger;

pub use diff::MembershipDiff;
pub use error::{Result, SyncError};
pub use reconciler::{ReconcileReport, Reconciler};
pub use trigger::{pump_feed, FireOutcome, PendingTriggers, ReconcileLoop, Trigger};
