//! In-process pub/sub bus.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, mpsc};

use crate::bus::{BusError, EventBus, Subscription};

/// In-memory fan-out bus.
///
/// - No IO, never blocks the publisher
/// - Each subscriber gets an unbounded queue
/// - Dead subscribers are dropped while publishing
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
    closed: AtomicBool,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop accepting messages and disconnect every subscriber.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.clear();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    fn publish(&self, message: M) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }

        let mut subs = self.subscribers.lock().map_err(|_| BusError::Poisoned)?;
        subs.retain(|tx| tx.send(message.clone()).is_ok());

        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        // A closed bus hands out a subscription that is already disconnected.
        if !self.closed.load(Ordering::SeqCst) {
            if let Ok(mut subs) = self.subscribers.lock() {
                subs.push(tx);
            }
        }

        Subscription::new(rx)
    }
}
