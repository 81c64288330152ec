//! In-memory wallet provider for tests/dev.

use std::sync::RwLock;

use async_trait::async_trait;

use waveportal_core::Account;

use crate::provider::{ProviderError, WalletProvider};

/// How the simulated user answers an interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResponse {
    /// Authorize this account (it stays authorized for later sessions).
    Approve(Account),
    /// Decline the prompt.
    Reject,
    /// The provider itself fails.
    Fail(String),
}

#[derive(Debug)]
struct WalletState {
    authorized: Vec<Account>,
    prompt_response: PromptResponse,
    prompts: usize,
    query_fault: Option<String>,
}

/// Simulated wallet extension.
///
/// Authorization state lives in the provider, not in the client, so sharing
/// one instance across several `ConnectionManager`s models a page reload:
/// an account approved in one session is detected in the next.
#[derive(Debug)]
pub struct InMemoryWalletProvider {
    present: bool,
    state: RwLock<WalletState>,
}

impl InMemoryWalletProvider {
    /// A present provider with no authorized accounts; prompts are rejected
    /// until a response is configured.
    pub fn new() -> Self {
        Self {
            present: true,
            state: RwLock::new(WalletState {
                authorized: Vec::new(),
                prompt_response: PromptResponse::Reject,
                prompts: 0,
                query_fault: None,
            }),
        }
    }

    /// No provider installed.
    pub fn absent() -> Self {
        Self {
            present: false,
            ..Self::new()
        }
    }

    /// A present provider whose user approves prompts with `account`.
    pub fn approving(account: Account) -> Self {
        let provider = Self::new();
        provider.set_prompt_response(PromptResponse::Approve(account));
        provider
    }

    pub fn set_prompt_response(&self, response: PromptResponse) {
        if let Ok(mut state) = self.state.write() {
            state.prompt_response = response;
        }
    }

    /// Pre-authorize an account (as if approved in an earlier session).
    pub fn authorize(&self, account: Account) {
        if let Ok(mut state) = self.state.write() {
            if !state.authorized.contains(&account) {
                state.authorized.push(account);
            }
        }
    }

    /// Forget every authorization (the user disconnected the site).
    pub fn revoke_all(&self) {
        if let Ok(mut state) = self.state.write() {
            state.authorized.clear();
        }
    }

    /// Make non-interactive queries fail with `msg` (`None` to heal).
    pub fn set_query_fault(&self, msg: Option<String>) {
        if let Ok(mut state) = self.state.write() {
            state.query_fault = msg;
        }
    }

    /// Number of interactive prompts shown so far.
    pub fn prompt_count(&self) -> usize {
        self.state.read().map(|s| s.prompts).unwrap_or(0)
    }
}

impl Default for InMemoryWalletProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletProvider for InMemoryWalletProvider {
    fn is_present(&self) -> bool {
        self.present
    }

    async fn authorized_accounts(&self) -> Result<Vec<Account>, ProviderError> {
        if !self.present {
            return Err(ProviderError::Unavailable);
        }

        let state = self
            .state
            .read()
            .map_err(|_| ProviderError::Rpc("lock poisoned".to_string()))?;

        if let Some(fault) = &state.query_fault {
            return Err(ProviderError::Rpc(fault.clone()));
        }

        Ok(state.authorized.clone())
    }

    async fn request_accounts(&self) -> Result<Vec<Account>, ProviderError> {
        if !self.present {
            return Err(ProviderError::Unavailable);
        }

        let mut state = self
            .state
            .write()
            .map_err(|_| ProviderError::Rpc("lock poisoned".to_string()))?;
        state.prompts += 1;

        match state.prompt_response.clone() {
            PromptResponse::Approve(account) => {
                // Most recently approved account first, like real wallets.
                state.authorized.retain(|a| a != &account);
                state.authorized.insert(0, account);
                Ok(state.authorized.clone())
            }
            PromptResponse::Reject => Err(ProviderError::UserRejected),
            PromptResponse::Fail(msg) => Err(ProviderError::Rpc(msg)),
        }
    }
}
