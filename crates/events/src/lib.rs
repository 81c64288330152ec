//! State-change notifications for the wave portal client.
//!
//! `ConnectionManager` and `LedgerClient` publish a [`PortalEvent`] whenever a
//! field they own changes. Presentation layers subscribe instead of polling.

pub mod bus;
pub mod event;
pub mod in_memory_bus;

pub use bus::{BusError, EventBus, SharedBus, Subscription, publish_or_log};
pub use event::PortalEvent;
pub use in_memory_bus::InMemoryEventBus;
