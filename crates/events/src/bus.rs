//! Publish/subscribe abstraction for state-change notifications.
//!
//! The bus is for **distribution only**. The caches inside `ConnectionManager`
//! and `LedgerClient` remain the source of truth; a subscriber that falls
//! behind or misses a message can always read the current value directly.
//!
//! - **Broadcast**: every subscription receives every message published after it
//!   was created.
//! - **Per-publisher ordering**: messages from one component arrive in the order
//!   that component published them. No ordering holds across publishers.
//! - **Best-effort**: a failed publish never fails the operation that caused it
//!   (see [`publish_or_log`]).

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use thiserror::Error;

/// A subscription to a notification stream.
///
/// ```ignore
/// let sub = bus.subscribe();
/// portal.mount().await;
/// while let Ok(event) = sub.try_recv() {
///     render(event);
/// }
/// ```
///
/// Subscriptions are meant for a single consumer. Dropping one unsubscribes it
/// (the bus prunes dead receivers on the next publish).
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently queued, without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Publish failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Internal lock poisoning.
    #[error("event bus lock poisoned")]
    Poisoned,

    /// The bus has been shut down.
    #[error("event bus closed")]
    Closed,
}

/// Transport-agnostic pub/sub bus.
pub trait EventBus<M>: Send + Sync {
    fn publish(&self, message: M) -> Result<(), BusError>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    fn publish(&self, message: M) -> Result<(), BusError> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}

/// Shared handle components publish through.
pub type SharedBus = Arc<dyn EventBus<crate::PortalEvent>>;

/// Publish, logging (not propagating) any failure.
pub fn publish_or_log(bus: &dyn EventBus<crate::PortalEvent>, event: crate::PortalEvent) {
    let event_type = event.event_type();
    if let Err(err) = bus.publish(event) {
        tracing::warn!(event_type, error = %err, "failed to publish portal event");
    }
}
