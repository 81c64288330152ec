//! Ledger boundary and the client that keeps a local view of it in sync.
//!
//! - [`WaveLedger`]: the consumed interface of the external append-only ledger
//! - [`InMemoryWaveLedger`]: simulated ledger for tests/dev
//! - [`LedgerClient`]: cached reads plus the single-flight submission state machine

pub mod client;
pub mod in_memory;
pub mod ledger;
pub mod submission;

pub use client::{LedgerClient, LedgerClientConfig};
pub use in_memory::{CallStats, ConfirmationMode, InMemoryWaveLedger};
pub use ledger::{
    ConfirmationReceipt, LedgerError, RawWaveEntry, ResourceLimit, SubmissionHandle, WaveLedger,
};
pub use submission::PendingSubmission;
