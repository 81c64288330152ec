use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use waveportal_core::{SubmissionId, SubmissionStatus, WaveCount};

use crate::ledger::{ConfirmationReceipt, SubmissionHandle};

/// The one submission a [`LedgerClient`](crate::LedgerClient) tracks.
///
/// Transient: replaced wholesale by the next `submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSubmission {
    pub id: SubmissionId,
    pub message: String,
    pub status: SubmissionStatus,
    pub started_at: DateTime<Utc>,
    /// Set once the ledger accepted the dispatch.
    pub handle: Option<SubmissionHandle>,
    /// Set once the write is confirmed.
    pub receipt: Option<ConfirmationReceipt>,
    /// Count re-read after confirmation; `None` if that read failed.
    pub refreshed_count: Option<WaveCount>,
}

impl PendingSubmission {
    pub(crate) fn start(message: impl Into<String>, status: SubmissionStatus) -> Self {
        Self {
            id: SubmissionId::new(),
            message: message.into(),
            status,
            started_at: Utc::now(),
            handle: None,
            receipt: None,
            refreshed_count: None,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.status.is_in_flight()
    }
}
