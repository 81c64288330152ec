//! Lifecycle states of a single submission.

use serde::{Deserialize, Serialize};

use crate::error::FailureReason;

/// Status of the (at most one) submission a client tracks.
///
/// ```text
/// Idle -> Submitting -> AwaitingConfirmation -> Confirmed
///              \                 \
///               +-----------------+--> Failed(reason)
/// ```
///
/// `Confirmed` and `Failed` are terminal; the next submit resets to `Idle`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    Idle,
    Submitting,
    AwaitingConfirmation,
    Confirmed,
    Failed(FailureReason),
}

impl SubmissionStatus {
    /// `Submitting` or `AwaitingConfirmation`.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            SubmissionStatus::Submitting | SubmissionStatus::AwaitingConfirmation
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionStatus::Confirmed | SubmissionStatus::Failed(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Idle => "idle",
            SubmissionStatus::Submitting => "submitting",
            SubmissionStatus::AwaitingConfirmation => "awaiting_confirmation",
            SubmissionStatus::Confirmed => "confirmed",
            SubmissionStatus::Failed(_) => "failed",
        }
    }
}

impl core::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SubmissionStatus::Failed(reason) => write!(f, "failed({reason})"),
            other => f.write_str(other.as_str()),
        }
    }
}
