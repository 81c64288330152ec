//! Render-ready snapshot of the portal.
//!
//! A [`PortalView`] is derived from the client state on demand and never
//! written back; whatever renders it (a terminal, a web page) only reads.

use chrono::{DateTime, Utc};
use serde::Serialize;

use waveportal_core::{Account, SubmissionStatus, WaveCount, WaveIndex, WaveLog};

use crate::notice::Notice;

pub const CONNECT_WALLET_LABEL: &str = "Connect Wallet";
pub const WAITING_LABEL: &str = "Waiting for transaction to be approved...";

/// The connect button, or the account shown in its place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConnectControl {
    ConnectWallet,
    Connected { account: Account },
}

impl ConnectControl {
    pub fn from_account(account: Option<Account>) -> Self {
        match account {
            Some(account) => ConnectControl::Connected { account },
            None => ConnectControl::ConnectWallet,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ConnectControl::ConnectWallet => CONNECT_WALLET_LABEL,
            ConnectControl::Connected { account } => account.as_str(),
        }
    }
}

impl core::fmt::Display for ConnectControl {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the wave feed, keyed by its ledger index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedItem {
    pub key: WaveIndex,
    pub author: Account,
    pub message: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortalView {
    pub connect: ConnectControl,
    /// `None` until the first successful count read.
    pub total_waves: Option<WaveCount>,
    pub feed: Vec<FeedItem>,
    pub status: SubmissionStatus,
    /// Spinner text while a submission is in flight.
    pub waiting: Option<&'static str>,
    /// Whether the wave action is available.
    pub can_wave: bool,
    pub notice: Option<Notice>,
}

impl PortalView {
    pub fn derive(
        account: Option<Account>,
        total_waves: Option<WaveCount>,
        log: &WaveLog,
        status: SubmissionStatus,
        notice: Option<Notice>,
    ) -> Self {
        let feed = log
            .iter_keyed()
            .map(|(key, entry)| FeedItem {
                key,
                author: entry.author().clone(),
                message: entry.message().to_string(),
                submitted_at: entry.submitted_at(),
            })
            .collect();

        let in_flight = status.is_in_flight();
        Self {
            can_wave: account.is_some() && !in_flight,
            connect: ConnectControl::from_account(account),
            total_waves,
            feed,
            status,
            waiting: in_flight.then_some(WAITING_LABEL),
            notice,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting.is_some()
    }
}
