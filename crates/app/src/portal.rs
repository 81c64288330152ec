//! The portal facade: one object per session, wiring the wallet side and the
//! ledger side to a shared event bus.
//!
//! ```text
//! mount() ── detect account ──> refresh()
//! connect() ── prompt ──> refresh()
//! submit(msg) ── LedgerClient::submit ──> (confirmed) read log
//! ```
//!
//! Failed actions are recorded as a [`Notice`] instead of being left for the
//! caller to display; the `PortalResult` is still returned.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use waveportal_core::{
    Account, PortalError, PortalResult, SubmissionStatus, WaveCount, WaveLog,
};
use waveportal_events::{EventBus, InMemoryEventBus, PortalEvent, SharedBus, Subscription};
use waveportal_ledger::{LedgerClient, PendingSubmission, WaveLedger};
use waveportal_wallet::{ConnectionManager, WalletProvider};

use crate::config::PortalConfig;
use crate::notice::Notice;
use crate::view::PortalView;

pub struct Portal {
    connection: Arc<ConnectionManager>,
    client: LedgerClient,
    bus: Arc<InMemoryEventBus<PortalEvent>>,
    notice: RwLock<Option<Notice>>,
    notice_ttl: Duration,
}

impl core::fmt::Debug for Portal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Portal")
            .field("connection", &self.connection)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl Portal {
    pub fn new(
        provider: Arc<dyn WalletProvider>,
        ledger: Arc<dyn WaveLedger>,
        config: &PortalConfig,
    ) -> Self {
        let bus = Arc::new(InMemoryEventBus::new());
        let shared: SharedBus = bus.clone();
        let connection = Arc::new(ConnectionManager::new(provider, shared.clone()));
        let client = LedgerClient::new(
            ledger,
            connection.clone(),
            config.ledger_client_config(),
            shared,
        );

        Self {
            connection,
            client,
            bus,
            notice: RwLock::new(None),
            notice_ttl: config.notice_ttl,
        }
    }

    /// Receive every [`PortalEvent`] published from now on.
    pub fn subscribe(&self) -> Subscription<PortalEvent> {
        self.bus.subscribe()
    }

    pub fn account(&self) -> Option<Account> {
        self.connection.account()
    }

    pub fn wave_count(&self) -> Option<WaveCount> {
        self.client.wave_count()
    }

    pub fn wave_log(&self) -> WaveLog {
        self.client.wave_log()
    }

    pub fn submission(&self) -> Option<PendingSubmission> {
        self.client.submission()
    }

    pub fn submission_status(&self) -> SubmissionStatus {
        self.client.submission_status()
    }

    /// The current notice, if it has not expired.
    pub fn last_error(&self) -> Option<Notice> {
        self.last_error_at(Utc::now())
    }

    pub fn last_error_at(&self, now: DateTime<Utc>) -> Option<Notice> {
        self.notice
            .read()
            .ok()
            .and_then(|notice| notice.clone())
            .filter(|notice| notice.is_active(now))
    }

    pub fn dismiss_notice(&self) {
        if let Ok(mut notice) = self.notice.write() {
            *notice = None;
        }
    }

    /// Fetch on mount: pick up an already-authorized account and, if there is
    /// one, load the count and the log. Never prompts.
    #[instrument(skip(self))]
    pub async fn mount(&self) -> Option<Account> {
        let account = self.connection.detect_authorized_account().await?;
        // Read failures are kept as a notice; the account is still connected.
        let _ = self.refresh().await;
        Some(account)
    }

    /// Prompt for an account, then load the count and the log.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> PortalResult<Account> {
        let account = self
            .connection
            .request_connection()
            .await
            .map_err(|err| self.record(err))?;
        let _ = self.refresh().await;
        Ok(account)
    }

    /// Forward the provider's "accounts changed" notification and reload for
    /// the new signer.
    pub async fn handle_accounts_changed(&self, accounts: Vec<Account>) {
        self.connection.handle_accounts_changed(accounts);
        if self.connection.is_connected() {
            let _ = self.refresh().await;
        }
    }

    /// Submit one wave. After confirmation the log is read again so the new
    /// entry shows up in the feed.
    #[instrument(skip(self, message))]
    pub async fn submit(&self, message: impl Into<String>) -> PortalResult<PendingSubmission> {
        let submission = self
            .client
            .submit(message)
            .await
            .map_err(|err| self.record(err))?;

        if submission.status == SubmissionStatus::Confirmed {
            let reread = if submission.refreshed_count.is_some() {
                self.client.read_log(None).await.map(|_| ())
            } else {
                self.refresh().await
            };
            if let Err(err) = reread {
                self.record(err);
            }
        }

        Ok(submission)
    }

    /// Read the count and the log. Both are attempted; the first failure is
    /// returned and recorded.
    pub async fn refresh(&self) -> PortalResult<()> {
        let (count, log) = tokio::join!(self.client.read_count(), self.client.read_log(None));

        match (count, log) {
            (Ok(count), Ok(log)) => {
                debug!(count = count.get(), entries = log.len(), "portal refreshed");
                Ok(())
            }
            (Err(err), _) | (_, Err(err)) => Err(self.record(err)),
        }
    }

    pub fn view(&self) -> PortalView {
        self.view_at(Utc::now())
    }

    pub fn view_at(&self, now: DateTime<Utc>) -> PortalView {
        PortalView::derive(
            self.account(),
            self.wave_count(),
            &self.wave_log(),
            self.submission_status(),
            self.last_error_at(now),
        )
    }

    fn record(&self, err: PortalError) -> PortalError {
        info!(code = err.code(), error = %err, "action failed");
        let notice = Notice::from_error(&err, Utc::now(), self.notice_ttl);
        if let Ok(mut slot) = self.notice.write() {
            *slot = Some(notice);
        }
        err
    }
}
