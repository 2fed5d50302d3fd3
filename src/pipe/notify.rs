/*!
 * Async Notification
 * Best-effort "data arrived" hooks fired after every successful write
 */

use crate::core::types::{HandleId, Size};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Band reported to async subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyBand {
    /// Data is available for reading
    PollIn,
}

/// Event delivered to async subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyEvent {
    pub device: Arc<str>,
    pub band: NotifyBand,
    /// Bytes accepted by the write that triggered the event
    pub len: Size,
}

/// Receiver of async notifications
///
/// Implementations must not block for long; they run on the writer's thread
/// after the channel lock has been released. Errors are logged and dropped,
/// they never fail the write.
pub trait AsyncNotifier: Send + Sync {
    fn notify(&self, event: &NotifyEvent) -> anyhow::Result<()>;
}

impl<F> AsyncNotifier for F
where
    F: Fn(&NotifyEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn notify(&self, event: &NotifyEvent) -> anyhow::Result<()> {
        self(event)
    }
}

type Subscriber = (HandleId, Arc<dyn AsyncNotifier>);

/// Registered async subscribers of one channel
///
/// # Performance
/// - Writers load a snapshot of the list without taking any lock
/// - (Un)subscribing copies the list, which is rare compared to writes
pub struct AsyncQueue {
    subscribers: ArcSwap<Vec<Subscriber>>,
}

impl AsyncQueue {
    pub fn new() -> Self {
        Self {
            subscribers: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Register `notifier` for `handle`, replacing an earlier registration
    pub fn subscribe(&self, handle: HandleId, notifier: Arc<dyn AsyncNotifier>) {
        self.subscribers.rcu(|current| {
            let mut next: Vec<Subscriber> = current
                .iter()
                .filter(|(id, _)| *id != handle)
                .cloned()
                .collect();
            next.push((handle, Arc::clone(&notifier)));
            next
        });
    }

    /// Remove the registration of `handle`; returns whether one existed
    pub fn unsubscribe(&self, handle: HandleId) -> bool {
        let previous = self.subscribers.rcu(|current| {
            current
                .iter()
                .filter(|(id, _)| *id != handle)
                .cloned()
                .collect::<Vec<_>>()
        });
        previous.iter().any(|(id, _)| *id == handle)
    }

    pub fn is_subscribed(&self, handle: HandleId) -> bool {
        self.subscribers.load().iter().any(|(id, _)| *id == handle)
    }

    pub fn len(&self) -> usize {
        self.subscribers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every subscriber
    pub fn fire(&self, event: &NotifyEvent) {
        let subscribers = self.subscribers.load();
        for (handle, notifier) in subscribers.iter() {
            if let Err(e) = notifier.notify(event) {
                warn!(
                    device = %event.device,
                    handle = handle,
                    error = %e,
                    "async notification failed"
                );
            }
        }
    }
}

impl Default for AsyncQueue {
    fn default() -> Self {
        Self::new()
    }
}
