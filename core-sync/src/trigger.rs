//! # Triggers and the Reconcile Loop
//!
//! Change notifications arrive from backend feeds faster than passes can run.
//! [`Trigger`] is a channel of capacity one: while a pass is pending, further
//! signals collapse into it, so any burst of changes during a pass produces
//! exactly one follow-up pass.

use crate::reconciler::Reconciler;
use bridge_traits::ChangeFeed;
use core_runtime::events::{CoreEvent, EventBus, TriggerEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Delay before polling a feed again after it reported an error
const FEED_RETRY_DELAY: Duration = Duration::from_secs(5);

/// What happened to a fired trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// A new pass was scheduled
    Scheduled,
    /// A pass was already pending; this signal merged into it
    Coalesced,
    /// The reconcile loop is gone
    Closed,
}

/// Sending half. Cheap to clone; hand one to every feed.
#[derive(Clone)]
pub struct Trigger {
    sender: mpsc::Sender<String>,
    event_bus: EventBus,
}

/// Receiving half, owned by the reconcile loop.
pub struct PendingTriggers {
    receiver: mpsc::Receiver<String>,
}

impl Trigger {
    pub fn channel(event_bus: EventBus) -> (Trigger, PendingTriggers) {
        let (sender, receiver) = mpsc::channel(1);
        (Trigger { sender, event_bus }, PendingTriggers { receiver })
    }

    /// Request a pass. Never blocks.
    pub fn fire(&self, origin: &str) -> FireOutcome {
        match self.sender.try_send(origin.to_string()) {
            Ok(()) => {
                debug!(origin, "Pass scheduled");
                self.event_bus
                    .emit(CoreEvent::Trigger(TriggerEvent::Received {
                        origin: origin.to_string(),
                    }))
                    .ok();
                FireOutcome::Scheduled
            }
            Err(TrySendError::Full(_)) => {
                debug!(origin, "Pass already pending, coalescing");
                self.event_bus
                    .emit(CoreEvent::Trigger(TriggerEvent::Coalesced {
                        origin: origin.to_string(),
                    }))
                    .ok();
                FireOutcome::Coalesced
            }
            Err(TrySendError::Closed(_)) => FireOutcome::Closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl PendingTriggers {
    /// Wait for the next pending trigger. `None` once every sender is gone.
    pub async fn wait(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Drop anything already pending. Returns how many signals were dropped.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        while self.receiver.try_recv().is_ok() {
            drained += 1;
        }
        drained
    }
}

/// Runs one pass per coalesced trigger until shut down.
pub struct ReconcileLoop {
    reconciler: Arc<Reconciler>,
    pending: PendingTriggers,
}

impl ReconcileLoop {
    pub fn new(reconciler: Arc<Reconciler>, pending: PendingTriggers) -> Self {
        Self {
            reconciler,
            pending,
        }
    }

    /// Serve triggers until `shutdown` is cancelled or every trigger is
    /// dropped. Returns the number of passes run.
    ///
    /// Shutdown is only observed between passes.
    pub async fn run(mut self, shutdown: CancellationToken) -> usize {
        let mut passes = 0;
        loop {
            let origin = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Reconcile loop shutting down");
                    break;
                }
                next = self.pending.wait() => match next {
                    Some(origin) => origin,
                    None => {
                        info!("All triggers dropped, stopping reconcile loop");
                        break;
                    }
                },
            };

            let dropped = self.pending.drain();
            debug!(origin = %origin, dropped, "Starting pass");

            passes += 1;
            match self.reconciler.reconcile().await {
                Ok(report) if !report.is_clean() => warn!(
                    pass_id = %report.pass_id,
                    failed = report.failed.len(),
                    removal_failed = report.removal_failed.len(),
                    "Pass finished with failures"
                ),
                Ok(_) => {}
                // Already logged and published; the next trigger retries
                Err(e) => debug!(error = %e, "Pass aborted"),
            }
        }
        passes
    }
}

/// Forward every change from `feed` into `trigger` until the feed ends, the
/// trigger closes or `shutdown` is cancelled.
///
/// Feed errors are logged and polling resumes after a short delay.
pub async fn pump_feed(
    mut feed: Box<dyn ChangeFeed>,
    trigger: Trigger,
    shutdown: CancellationToken,
) {
    let name = feed.name().to_string();
    info!(feed = %name, "Watching for album changes");

    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = feed.next_change() => next,
        };

        match next {
            Ok(Some(signal)) => {
                debug!(feed = %name, detail = ?signal.detail, "Change observed");
                if trigger.fire(&signal.origin) == FireOutcome::Closed {
                    break;
                }
            }
            Ok(None) => {
                info!(feed = %name, "Change feed ended");
                break;
            }
            Err(e) => {
                error!(feed = %name, error = %e, "Change feed failed, retrying");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(FEED_RETRY_DELAY) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fire_coalesces_while_pending() {
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        let (trigger, mut pending) = Trigger::channel(bus);

        assert_eq!(trigger.fire("a"), FireOutcome::Scheduled);
        assert_eq!(trigger.fire("b"), FireOutcome::Coalesced);
        assert_eq!(trigger.fire("c"), FireOutcome::Coalesced);

        assert_eq!(pending.wait().await.as_deref(), Some("a"));
        assert_eq!(pending.drain(), 0);

        assert_eq!(trigger.fire("d"), FireOutcome::Scheduled);

        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Trigger(TriggerEvent::Received { origin }) if origin == "a"
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Trigger(TriggerEvent::Coalesced { origin }) if origin == "b"
        ));
    }

    #[tokio::test]
    async fn test_fire_after_receiver_dropped_is_closed() {
        let (trigger, pending) = Trigger::channel(EventBus::new(4));
        drop(pending);
        assert!(trigger.is_closed());
        assert_eq!(trigger.fire("x"), FireOutcome::Closed);
    }

    #[tokio::test]
    async fn test_wait_ends_when_triggers_dropped() {
        let (trigger, mut pending) = Trigger::channel(EventBus::new(4));
        trigger.fire("last");
        drop(trigger);

        assert_eq!(pending.wait().await.as_deref(), Some("last"));
        assert_eq!(pending.wait().await, None);
    }
}
