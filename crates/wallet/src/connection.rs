//! Account discovery and authorization.

use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use waveportal_core::{Account, PortalError, PortalResult};
use waveportal_events::{PortalEvent, SharedBus, publish_or_log};

use crate::provider::{ProviderError, WalletProvider};

/// Connection state owned by [`ConnectionManager`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected(Account),
}

impl ConnectionState {
    pub fn account(&self) -> Option<&Account> {
        match self {
            ConnectionState::Connected(account) => Some(account),
            ConnectionState::Disconnected => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected(_) => "connected",
        }
    }
}

/// Discovers and authorizes the signing account.
///
/// ```text
/// Disconnected --(detect ok | request ok)--> Connected
/// Connected --(provider reports no accounts)--> Disconnected
/// ```
///
/// The account is only ever written by this type's own methods; consumers
/// read it through [`account`](Self::account) or subscribe to
/// [`PortalEvent::AccountChanged`].
pub struct ConnectionManager {
    provider: Arc<dyn WalletProvider>,
    state: RwLock<ConnectionState>,
    bus: SharedBus,
}

impl core::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    pub fn new(provider: Arc<dyn WalletProvider>, bus: SharedBus) -> Self {
        Self {
            provider,
            state: RwLock::new(ConnectionState::Disconnected),
            bus,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
            .read()
            .map(|s| s.clone())
            .unwrap_or(ConnectionState::Disconnected)
    }

    pub fn account(&self) -> Option<Account> {
        self.state().account().cloned()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// The authorized signer, or `NotConnected`.
    pub fn signer(&self) -> PortalResult<Account> {
        self.account().ok_or(PortalError::NotConnected)
    }

    /// Look for an already-authorized account without prompting.
    ///
    /// Never fails: a missing provider is an expected condition and is only
    /// logged, as is a provider fault.
    pub async fn detect_authorized_account(&self) -> Option<Account> {
        if !self.provider.is_present() {
            info!("no wallet provider present; waiting for an explicit connect");
            return None;
        }

        let accounts = match self.provider.authorized_accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                warn!(error = %err, "authorized account query failed");
                return None;
            }
        };

        match accounts.into_iter().next() {
            Some(account) => {
                info!(account = %account, "found an authorized account");
                self.set_state(ConnectionState::Connected(account.clone()));
                Some(account)
            }
            None => {
                debug!("no authorized account found");
                None
            }
        }
    }

    /// Prompt the user to authorize an account.
    ///
    /// Calling again (after a rejection, or while connected) simply prompts
    /// again.
    pub async fn request_connection(&self) -> PortalResult<Account> {
        if !self.provider.is_present() {
            warn!("connect requested but no wallet provider is present");
            return Err(PortalError::ProviderUnavailable);
        }

        let accounts = self.provider.request_accounts().await.map_err(|err| {
            warn!(error = %err, "connection request failed");
            map_provider_error(err)
        })?;

        let account = accounts.into_iter().next().ok_or_else(|| {
            warn!("provider granted no accounts");
            PortalError::UserRejected
        })?;

        info!(account = %account, "wallet connected");
        self.set_state(ConnectionState::Connected(account.clone()));
        Ok(account)
    }

    /// React to the provider's "accounts changed" notification.
    ///
    /// An empty list means the user disconnected the client in the wallet.
    pub fn handle_accounts_changed(&self, accounts: Vec<Account>) {
        let next = match accounts.into_iter().next() {
            Some(account) => ConnectionState::Connected(account),
            None => ConnectionState::Disconnected,
        };
        info!(state = next.as_str(), "provider reported an account change");
        self.set_state(next);
    }

    fn set_state(&self, next: ConnectionState) {
        let changed = match self.state.write() {
            Ok(mut state) => {
                if *state == next {
                    false
                } else {
                    *state = next.clone();
                    true
                }
            }
            Err(_) => {
                warn!("connection state lock poisoned; state not updated");
                false
            }
        };

        if changed {
            publish_or_log(
                self.bus.as_ref(),
                PortalEvent::AccountChanged {
                    account: next.account().cloned(),
                },
            );
        }
    }
}

fn map_provider_error(err: ProviderError) -> PortalError {
    match err {
        ProviderError::Unavailable => PortalError::ProviderUnavailable,
        ProviderError::UserRejected => PortalError::UserRejected,
        ProviderError::Rpc(msg) => PortalError::unknown(msg),
    }
}
