//! Client error model.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the client crates.
pub type PortalResult<T> = Result<T, PortalError>;

/// Client-level error surfaced to the presentation layer.
///
/// Every failure a consumer can observe maps to one of these variants. None of
/// them is fatal; every operation may be retried except while
/// [`PortalError::AlreadyInProgress`] holds. Passive provider absence during
/// account detection is deliberately *not* represented here (it is logged).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortalError {
    /// No wallet provider is installed/injected.
    #[error("no wallet provider available")]
    ProviderUnavailable,

    /// The user declined the prompt (connection or signature).
    #[error("request rejected by user")]
    UserRejected,

    /// Input failed local validation; nothing was dispatched.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The ledger refused the write (dispatch or on-ledger revert).
    #[error("dispatch failed: {0}")]
    DispatchError(String),

    /// No confirmation arrived within the configured window.
    ///
    /// The external write may still land; only the client view gives up.
    #[error("confirmation not received within {0:?}")]
    ConfirmationTimeout(Duration),

    /// A read-only ledger call failed.
    #[error("ledger read failed: {0}")]
    ReadError(String),

    /// A submission is already `Submitting` or `AwaitingConfirmation`.
    #[error("a submission is already in progress")]
    AlreadyInProgress,

    /// The operation needs an authorized signer and none is connected.
    #[error("no account connected")]
    NotConnected,

    /// Anything else, including faults whose outcome on the ledger is unknown.
    #[error("unknown fault: {0}")]
    UnknownFault(String),
}

impl PortalError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn dispatch(msg: impl Into<String>) -> Self {
        Self::DispatchError(msg.into())
    }

    pub fn read(msg: impl Into<String>) -> Self {
        Self::ReadError(msg.into())
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::UnknownFault(msg.into())
    }

    /// Stable, machine-readable code (used by views and structured logs).
    pub fn code(&self) -> &'static str {
        match self {
            PortalError::ProviderUnavailable => "provider_unavailable",
            PortalError::UserRejected => "user_rejected",
            PortalError::InvalidInput(_) => "invalid_input",
            PortalError::DispatchError(_) => "dispatch_error",
            PortalError::ConfirmationTimeout(_) => "confirmation_timeout",
            PortalError::ReadError(_) => "read_error",
            PortalError::AlreadyInProgress => "already_in_progress",
            PortalError::NotConnected => "not_connected",
            PortalError::UnknownFault(_) => "unknown_fault",
        }
    }

    /// The terminal submission reason this error corresponds to, if any.
    ///
    /// Errors that never move a submission into `Failed` (reads, the in-flight
    /// guard, a missing signer, a missing provider) return `None`.
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            PortalError::InvalidInput(_) => Some(FailureReason::InvalidInput),
            PortalError::UserRejected => Some(FailureReason::UserRejected),
            PortalError::DispatchError(_) => Some(FailureReason::DispatchError),
            PortalError::ConfirmationTimeout(_) => Some(FailureReason::ConfirmationTimeout),
            PortalError::UnknownFault(_) => Some(FailureReason::UnknownFault),
            PortalError::ProviderUnavailable
            | PortalError::ReadError(_)
            | PortalError::AlreadyInProgress
            | PortalError::NotConnected => None,
        }
    }
}

/// Why a submission ended in `Failed`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    InvalidInput,
    UserRejected,
    DispatchError,
    ConfirmationTimeout,
    UnknownFault,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::InvalidInput => "invalid_input",
            FailureReason::UserRejected => "user_rejected",
            FailureReason::DispatchError => "dispatch_error",
            FailureReason::ConfirmationTimeout => "confirmation_timeout",
            FailureReason::UnknownFault => "unknown_fault",
        }
    }
}

impl core::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
