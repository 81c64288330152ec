use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;

use waveportal_core::{Account, ContractAddress, WaveIndex};

use crate::ledger::{
    ConfirmationReceipt, LedgerError, RawWaveEntry, ResourceLimit, SubmissionHandle, WaveLedger,
};

/// When dispatched writes get applied.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConfirmationMode {
    /// `await_confirmation` applies the write right away.
    Immediate,
    /// `await_confirmation` suspends until [`InMemoryWaveLedger::release_confirmations`].
    Manual,
}

/// Number of calls made against each ledger operation.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CallStats {
    pub get_count: usize,
    pub get_entries: usize,
    pub submit_entry: usize,
    pub await_confirmation: usize,
}

impl CallStats {
    pub fn total(&self) -> usize {
        self.get_count + self.get_entries + self.submit_entry + self.await_confirmation
    }
}

#[derive(Debug)]
struct PendingWrite {
    author: Account,
    message: String,
}

#[derive(Debug, Default)]
struct LedgerState {
    entries: Vec<RawWaveEntry>,
    pending: HashMap<SubmissionHandle, PendingWrite>,
    next_handle: u64,
    clock_seconds: Option<u64>,
    read_fault: Option<String>,
    dispatch_fault: Option<LedgerError>,
    confirmation_fault: Option<LedgerError>,
    calls: CallStats,
}

impl LedgerState {
    fn now_seconds(&self) -> u64 {
        self.clock_seconds
            .unwrap_or_else(|| u64::try_from(Utc::now().timestamp()).unwrap_or(0))
    }

    fn push(&mut self, author: Account, message: String) -> WaveIndex {
        let index = WaveIndex::new(self.entries.len() as u64);
        let timestamp_seconds = self.now_seconds();
        self.entries.push(RawWaveEntry {
            author: author.into(),
            message,
            timestamp_seconds,
        });
        index
    }
}

/// Simulated wave contract.
///
/// Append-only: entries are only ever pushed, in confirmation order, and the
/// count always equals the number of entries. Intended for tests/dev; faults
/// can be injected to exercise client error paths.
#[derive(Debug)]
pub struct InMemoryWaveLedger {
    contract: ContractAddress,
    min_resource_limit: ResourceLimit,
    mode: ConfirmationMode,
    gate: Semaphore,
    state: RwLock<LedgerState>,
}

impl InMemoryWaveLedger {
    pub fn new(contract: ContractAddress) -> Self {
        Self {
            contract,
            min_resource_limit: ResourceLimit::new(21_000),
            mode: ConfirmationMode::Immediate,
            gate: Semaphore::new(0),
            state: RwLock::new(LedgerState::default()),
        }
    }

    pub fn with_confirmation_mode(mut self, mode: ConfirmationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Writes dispatched with a smaller limit are refused.
    pub fn with_min_resource_limit(mut self, limit: ResourceLimit) -> Self {
        self.min_resource_limit = limit;
        self
    }

    /// Freeze the clock used to timestamp new entries.
    pub fn set_clock_seconds(&self, seconds: u64) {
        if let Ok(mut state) = self.state.write() {
            state.clock_seconds = Some(seconds);
        }
    }

    /// Append an entry from another signer, bypassing dispatch/confirmation.
    pub fn append_external(&self, author: Account, message: impl Into<String>) -> WaveIndex {
        match self.state.write() {
            Ok(mut state) => state.push(author, message.into()),
            Err(poisoned) => poisoned.into_inner().push(author, message.into()),
        }
    }

    /// Let `n` manual-mode confirmations through.
    pub fn release_confirmations(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Make reads fail with a network fault (`None` to heal).
    pub fn set_read_fault(&self, msg: Option<String>) {
        if let Ok(mut state) = self.state.write() {
            state.read_fault = msg;
        }
    }

    /// Fail the next dispatch with `err`.
    pub fn fail_next_dispatch(&self, err: LedgerError) {
        if let Ok(mut state) = self.state.write() {
            state.dispatch_fault = Some(err);
        }
    }

    /// Fail the next confirmation with `err`; the pending write is dropped.
    pub fn fail_next_confirmation(&self, err: LedgerError) {
        if let Ok(mut state) = self.state.write() {
            state.confirmation_fault = Some(err);
        }
    }

    pub fn calls(&self) -> CallStats {
        self.state.read().map(|s| s.calls).unwrap_or_default()
    }

    pub fn pending_count(&self) -> usize {
        self.state.read().map(|s| s.pending.len()).unwrap_or(0)
    }

    pub fn snapshot(&self) -> Vec<RawWaveEntry> {
        self.state.read().map(|s| s.entries.clone()).unwrap_or_default()
    }

    fn write_state(&self) -> Result<std::sync::RwLockWriteGuard<'_, LedgerState>, LedgerError> {
        self.state
            .write()
            .map_err(|_| LedgerError::Network("ledger lock poisoned".to_string()))
    }
}

#[async_trait]
impl WaveLedger for InMemoryWaveLedger {
    fn contract(&self) -> &ContractAddress {
        &self.contract
    }

    async fn get_count(&self) -> Result<u64, LedgerError> {
        let mut state = self.write_state()?;
        state.calls.get_count += 1;

        if let Some(fault) = &state.read_fault {
            return Err(LedgerError::Network(fault.clone()));
        }

        Ok(state.entries.len() as u64)
    }

    async fn get_entries(&self) -> Result<Vec<RawWaveEntry>, LedgerError> {
        let mut state = self.write_state()?;
        state.calls.get_entries += 1;

        if let Some(fault) = &state.read_fault {
            return Err(LedgerError::Network(fault.clone()));
        }

        Ok(state.entries.clone())
    }

    async fn submit_entry(
        &self,
        signer: &Account,
        message: &str,
        resource_limit: ResourceLimit,
    ) -> Result<SubmissionHandle, LedgerError> {
        let mut state = self.write_state()?;
        state.calls.submit_entry += 1;

        if let Some(err) = state.dispatch_fault.take() {
            return Err(err);
        }

        if resource_limit < self.min_resource_limit {
            return Err(LedgerError::ResourceLimitExceeded {
                limit: resource_limit.get(),
                required: self.min_resource_limit.get(),
            });
        }

        state.next_handle += 1;
        let handle = SubmissionHandle::new(format!("0x{:064x}", state.next_handle));
        state.pending.insert(
            handle.clone(),
            PendingWrite {
                author: signer.clone(),
                message: message.to_string(),
            },
        );

        Ok(handle)
    }

    async fn await_confirmation(
        &self,
        handle: &SubmissionHandle,
    ) -> Result<ConfirmationReceipt, LedgerError> {
        {
            let mut state = self.write_state()?;
            state.calls.await_confirmation += 1;
            if !state.pending.contains_key(handle) {
                return Err(LedgerError::UnknownHandle(handle.to_string()));
            }
        }

        if self.mode == ConfirmationMode::Manual {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| LedgerError::Network("confirmation gate closed".to_string()))?;
            permit.forget();
        }

        let mut state = self.write_state()?;
        let pending = state
            .pending
            .remove(handle)
            .ok_or_else(|| LedgerError::UnknownHandle(handle.to_string()))?;

        if let Some(err) = state.confirmation_fault.take() {
            return Err(err);
        }

        let index = state.push(pending.author, pending.message);

        Ok(ConfirmationReceipt {
            handle: handle.clone(),
            entry_index: Some(index),
        })
    }
}
