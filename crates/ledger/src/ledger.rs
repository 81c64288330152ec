use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use waveportal_core::{Account, ContractAddress, PortalError, WaveEntry, WaveIndex};

/// Explicit cap on the resources a write may consume (the "gas limit").
///
/// Always sent with a dispatch so the ledger never has to estimate it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceLimit(u64);

impl ResourceLimit {
    pub const DEFAULT: ResourceLimit = ResourceLimit(300_000);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl Default for ResourceLimit {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl core::fmt::Display for ResourceLimit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Ledger-issued handle for a dispatched write (a transaction hash, typically).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionHandle(String);

impl SubmissionHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for SubmissionHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Proof that a dispatched write was durably applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationReceipt {
    pub handle: SubmissionHandle,
    /// Where the new entry landed, when the ledger reports it.
    pub entry_index: Option<WaveIndex>,
}

/// Entry exactly as the ledger returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawWaveEntry {
    pub author: String,
    pub message: String,
    /// Ledger-native integer seconds since the Unix epoch.
    pub timestamp_seconds: u64,
}

impl RawWaveEntry {
    /// Convert to the client type. The timestamp maps to exactly
    /// `timestamp_seconds` seconds after the epoch.
    pub fn decode(&self) -> Result<WaveEntry, PortalError> {
        let author = Account::new(self.author.clone())
            .map_err(|_| PortalError::read("ledger entry has an empty author"))?;
        let submitted_at = timestamp_from_seconds(self.timestamp_seconds)?;
        Ok(WaveEntry::new(author, self.message.clone(), submitted_at))
    }
}

pub(crate) fn timestamp_from_seconds(seconds: u64) -> Result<DateTime<Utc>, PortalError> {
    i64::try_from(seconds)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| PortalError::read(format!("timestamp {seconds} is out of range")))
}

/// Ledger call failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Transport or node failure; the call may not have reached the ledger.
    #[error("network fault: {0}")]
    Network(String),

    /// The signer refused to sign the write.
    #[error("rejected by signer: {0}")]
    Rejected(String),

    /// The supplied resource limit is below what the write needs.
    #[error("resource limit {limit} below required {required}")]
    ResourceLimitExceeded { limit: u64, required: u64 },

    /// The ledger accepted the write but refused to apply it.
    #[error("reverted: {0}")]
    Reverted(String),

    /// The handle does not refer to a pending write.
    #[error("unknown submission handle: {0}")]
    UnknownHandle(String),
}

/// External append-only ledger of waves (consumed).
///
/// The ledger is the source of truth for the count and the entries. It is
/// mutated only by [`submit_entry`](WaveLedger::submit_entry) followed by a
/// successful [`await_confirmation`](WaveLedger::await_confirmation).
///
/// Implementations must return entries in ledger order, with indices that
/// never change once assigned.
#[async_trait]
pub trait WaveLedger: Send + Sync {
    /// Address of the contract this ledger is bound to.
    fn contract(&self) -> &ContractAddress;

    async fn get_count(&self) -> Result<u64, LedgerError>;

    async fn get_entries(&self) -> Result<Vec<RawWaveEntry>, LedgerError>;

    /// Dispatch one write, signed by `signer`. Returns once the ledger accepted
    /// the dispatch, not once it is applied.
    async fn submit_entry(
        &self,
        signer: &Account,
        message: &str,
        resource_limit: ResourceLimit,
    ) -> Result<SubmissionHandle, LedgerError>;

    /// Suspend until the write behind `handle` is applied (or fails).
    async fn await_confirmation(
        &self,
        handle: &SubmissionHandle,
    ) -> Result<ConfirmationReceipt, LedgerError>;
}

#[async_trait]
impl<L> WaveLedger for Arc<L>
where
    L: WaveLedger + ?Sized,
{
    fn contract(&self) -> &ContractAddress {
        (**self).contract()
    }

    async fn get_count(&self) -> Result<u64, LedgerError> {
        (**self).get_count().await
    }

    async fn get_entries(&self) -> Result<Vec<RawWaveEntry>, LedgerError> {
        (**self).get_entries().await
    }

    async fn submit_entry(
        &self,
        signer: &Account,
        message: &str,
        resource_limit: ResourceLimit,
    ) -> Result<SubmissionHandle, LedgerError> {
        (**self).submit_entry(signer, message, resource_limit).await
    }

    async fn await_confirmation(
        &self,
        handle: &SubmissionHandle,
    ) -> Result<ConfirmationReceipt, LedgerError> {
        (**self).await_confirmation(handle).await
    }
}
