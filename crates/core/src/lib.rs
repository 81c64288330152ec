//! `waveportal-core`: domain primitives shared by the wave portal client.
//!
//! This crate contains **pure domain** types (no IO, no async). The wallet and
//! ledger crates build their boundaries on top of these.

pub mod error;
pub mod id;
pub mod submission;
pub mod wave;

pub use error::{FailureReason, PortalError, PortalResult};
pub use id::{Account, ContractAddress, SubmissionId};
pub use submission::SubmissionStatus;
pub use wave::{PageHint, WaveCount, WaveEntry, WaveIndex, WaveLog};
