use serde::{Deserialize, Serialize};

use waveportal_core::{Account, SubmissionId, SubmissionStatus, WaveCount};

/// A change to client-owned state.
///
/// Events are facts about the *client's* view (a cache was replaced, a status
/// moved), not about the ledger. The new value is carried inline so a
/// subscriber never has to read back from the component that emitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PortalEvent {
    /// The authorized account was set, switched, or cleared.
    AccountChanged { account: Option<Account> },

    /// The cached wave count was replaced by a fresh read.
    WaveCountUpdated { count: WaveCount },

    /// The cached wave log was replaced by a fresh full snapshot.
    WaveLogRefreshed { entries: usize },

    /// The tracked submission moved to a new status.
    SubmissionStatusChanged {
        submission_id: SubmissionId,
        status: SubmissionStatus,
    },
}

impl PortalEvent {
    /// Stable event name (e.g. "portal.account.changed").
    pub fn event_type(&self) -> &'static str {
        match self {
            PortalEvent::AccountChanged { .. } => "portal.account.changed",
            PortalEvent::WaveCountUpdated { .. } => "portal.wave_count.updated",
            PortalEvent::WaveLogRefreshed { .. } => "portal.wave_log.refreshed",
            PortalEvent::SubmissionStatusChanged { .. } => "portal.submission.status_changed",
        }
    }
}
