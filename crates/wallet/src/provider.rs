//! Wallet provider boundary (consumed).

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use waveportal_core::Account;

/// Failure reported by a wallet provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// No provider is installed/injected.
    #[error("wallet provider unavailable")]
    Unavailable,

    /// The user declined the prompt.
    #[error("user rejected the request")]
    UserRejected,

    /// Any other provider-side failure (malformed response, RPC error, ...).
    #[error("provider error: {0}")]
    Rpc(String),
}

/// External wallet that holds and authorizes signing accounts.
///
/// Implementations wrap whatever the host environment offers (a browser
/// extension bridge, a hardware signer, a test double).
///
/// - [`authorized_accounts`](WalletProvider::authorized_accounts) must never
///   prompt the user.
/// - [`request_accounts`](WalletProvider::request_accounts) may prompt and may
///   be rejected.
///
/// Accounts are returned in provider preference order; callers use the first.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Whether a provider is present at all.
    fn is_present(&self) -> bool;

    /// Accounts the user has already authorized for this client (non-interactive).
    async fn authorized_accounts(&self) -> Result<Vec<Account>, ProviderError>;

    /// Ask the user to authorize an account (interactive).
    async fn request_accounts(&self) -> Result<Vec<Account>, ProviderError>;
}

#[async_trait]
impl<P> WalletProvider for Arc<P>
where
    P: WalletProvider + ?Sized,
{
    fn is_present(&self) -> bool {
        (**self).is_present()
    }

    async fn authorized_accounts(&self) -> Result<Vec<Account>, ProviderError> {
        (**self).authorized_accounts().await
    }

    async fn request_accounts(&self) -> Result<Vec<Account>, ProviderError> {
        (**self).request_accounts().await
    }
}
