//! Wallet-provider boundary and connection state.
//!
//! [`ConnectionManager`] discovers and authorizes the signing account through
//! a [`WalletProvider`]. It depends on nothing but the provider and the
//! notification bus.

pub mod connection;
pub mod in_memory;
pub mod provider;

pub use connection::{ConnectionManager, ConnectionState};
pub use in_memory::{InMemoryWalletProvider, PromptResponse};
pub use provider::{ProviderError, WalletProvider};
