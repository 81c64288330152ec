//! `waveportal-app`: the surface a presentation layer binds to.
//!
//! [`Portal`] composes `ConnectionManager` and `LedgerClient`, turns failures
//! into transient [`Notice`]s, and derives a renderable [`PortalView`].

pub mod config;
pub mod notice;
pub mod portal;
pub mod view;

pub use config::{ContractDescriptor, PortalConfig};
pub use notice::Notice;
pub use portal::Portal;
pub use view::{ConnectControl, FeedItem, PortalView};
