//! Client-side view of the ledger: cached reads and single-flight writes.
//!
//! ## Read path
//!
//! `read_count` and `read_log` each make one ledger call and, on success,
//! replace the corresponding cache wholesale. On failure the cache keeps its
//! previous value and the caller gets `ReadError`. Reads are not serialised
//! against each other or against a submission, so every result is a
//! point-in-time snapshot.
//!
//! ## Write path
//!
//! ```text
//! submit(message)
//!   ↓
//! 0. validate locally (empty → InvalidInput, no ledger call)
//!   ↓
//! 1. claim the in-flight slot (busy → AlreadyInProgress)      status: Submitting
//!   ↓
//! 2. dispatch with an explicit resource limit
//!   ↓                                                          status: AwaitingConfirmation
//! 3. await confirmation (optionally bounded by a timeout)
//!   ↓                                                          status: Confirmed
//! 4. re-read the count from the ledger
//! ```
//!
//! Any failure in steps 2 and 3 ends in `Failed(reason)` and frees the slot. The client
//! never retries on its own, so a dispatch happens at most once per call.
//!
//! A caller may drop `submit` at any await point (an outer timeout, a
//! `select!`). The slot is then failed on drop: `UnknownFault` if the dispatch
//! had not been accepted yet, `ConfirmationTimeout` once it had.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tracing::{debug, info, warn};

use waveportal_core::{
    Account, FailureReason, PageHint, PortalError, PortalResult, SubmissionId, SubmissionStatus,
    WaveCount, WaveLog,
};
use waveportal_events::{PortalEvent, SharedBus, publish_or_log};
use waveportal_wallet::ConnectionManager;

use crate::ledger::{
    ConfirmationReceipt, LedgerError, RawWaveEntry, ResourceLimit, SubmissionHandle, WaveLedger,
};
use crate::submission::PendingSubmission;

/// Write-path tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerClientConfig {
    /// Sent with every dispatch.
    pub resource_limit: ResourceLimit,
    /// Client-side bound on `AwaitingConfirmation`; `None` waits indefinitely.
    pub confirmation_timeout: Option<Duration>,
}

impl Default for LedgerClientConfig {
    fn default() -> Self {
        Self {
            resource_limit: ResourceLimit::DEFAULT,
            confirmation_timeout: Some(Duration::from_secs(120)),
        }
    }
}

/// Wraps a [`WaveLedger`] for one connected session.
///
/// Owns the wave count cache, the wave log cache, and the tracked submission.
/// Only this type's methods write them; everyone else reads through the
/// accessors or subscribes to the bus.
pub struct LedgerClient {
    ledger: Arc<dyn WaveLedger>,
    connection: Arc<ConnectionManager>,
    config: LedgerClientConfig,
    bus: SharedBus,
    count: RwLock<Stamped<Option<WaveCount>>>,
    log: RwLock<Stamped<WaveLog>>,
    read_seq: AtomicU64,
    submission: Mutex<Option<PendingSubmission>>,
}

/// A cached read plus the ticket of the read that produced it.
#[derive(Debug, Default)]
struct Stamped<T> {
    ticket: u64,
    value: T,
}

impl<T> Stamped<T> {
    /// Store `value` unless a read that started later already landed.
    ///
    /// Returns the replaced value, or `None` if `value` was discarded.
    fn offer(&mut self, ticket: u64, value: T) -> Option<T> {
        if ticket < self.ticket {
            return None;
        }
        self.ticket = ticket;
        Some(std::mem::replace(&mut self.value, value))
    }
}

impl core::fmt::Debug for LedgerClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LedgerClient")
            .field("contract", self.ledger.contract())
            .field("config", &self.config)
            .field("count", &self.wave_count())
            .field("status", &self.submission_status())
            .finish_non_exhaustive()
    }
}

impl LedgerClient {
    pub fn new(
        ledger: Arc<dyn WaveLedger>,
        connection: Arc<ConnectionManager>,
        config: LedgerClientConfig,
        bus: SharedBus,
    ) -> Self {
        Self {
            ledger,
            connection,
            config,
            bus,
            count: RwLock::new(Stamped::default()),
            log: RwLock::new(Stamped::default()),
            read_seq: AtomicU64::new(0),
            submission: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &LedgerClientConfig {
        &self.config
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    /// Last successfully read count, if any read has succeeded yet.
    pub fn wave_count(&self) -> Option<WaveCount> {
        self.count.read().map(|c| c.value).unwrap_or(None)
    }

    /// Last successfully read full snapshot (empty before the first read).
    pub fn wave_log(&self) -> WaveLog {
        self.log.read().map(|l| l.value.clone()).unwrap_or_default()
    }

    /// The tracked submission, if `submit` was ever called.
    pub fn submission(&self) -> Option<PendingSubmission> {
        self.submission.lock().map(|s| s.clone()).unwrap_or(None)
    }

    pub fn submission_status(&self) -> SubmissionStatus {
        self.submission().map(|s| s.status).unwrap_or_default()
    }

    /// Read the aggregate count.
    ///
    /// A result overtaken by a read that started later is returned but not
    /// cached.
    pub async fn read_count(&self) -> PortalResult<WaveCount> {
        self.connection.signer()?;
        let ticket = self.next_ticket();

        let raw = self.ledger.get_count().await.map_err(|err| {
            warn!(contract = %self.ledger.contract(), error = %err, "wave count read failed");
            PortalError::read(err.to_string())
        })?;
        let count = WaveCount::new(raw);

        let stored = match self.count.write() {
            Ok(mut cached) => cached.offer(ticket, Some(count)),
            Err(_) => return Err(PortalError::unknown("wave count cache lock poisoned")),
        };

        let previous = match stored {
            Some(previous) => previous,
            None => {
                debug!(count = count.get(), ticket, "count read overtaken; not cached");
                return Ok(count);
            }
        };

        match previous {
            Some(prev) if count < prev => {
                warn!(previous = prev.get(), current = count.get(), "ledger reported a lower wave count");
            }
            _ => debug!(count = count.get(), "wave count refreshed"),
        }

        publish_or_log(self.bus.as_ref(), PortalEvent::WaveCountUpdated { count });
        Ok(count)
    }

    /// Read the full entry set, replacing the cached snapshot.
    ///
    /// With a `page` hint the returned log is that window of the fresh
    /// snapshot (ledger indices preserved); the cache always holds the whole
    /// snapshot.
    pub async fn read_log(&self, page: Option<PageHint>) -> PortalResult<WaveLog> {
        self.connection.signer()?;
        let ticket = self.next_ticket();

        let raw = self.ledger.get_entries().await.map_err(|err| {
            warn!(contract = %self.ledger.contract(), error = %err, "wave log read failed");
            PortalError::read(err.to_string())
        })?;

        let entries = raw
            .iter()
            .map(RawWaveEntry::decode)
            .collect::<PortalResult<Vec<_>>>()?;
        let log = WaveLog::new(entries);

        let stored = match self.log.write() {
            Ok(mut cached) => cached.offer(ticket, log.clone()).is_some(),
            Err(_) => return Err(PortalError::unknown("wave log cache lock poisoned")),
        };

        if stored {
            debug!(entries = log.len(), "wave log refreshed");
            publish_or_log(
                self.bus.as_ref(),
                PortalEvent::WaveLogRefreshed { entries: log.len() },
            );
        } else {
            debug!(entries = log.len(), ticket, "log read overtaken; not cached");
        }

        Ok(match page {
            Some(hint) => log.page(hint),
            None => log,
        })
    }

    /// Submit one wave and wait for it to be confirmed.
    ///
    /// Returns the submission in `Confirmed` state. Failures come back as the
    /// error; the tracked submission then reads `Failed(reason)`, except for
    /// `AlreadyInProgress` and `NotConnected`, which leave it untouched.
    pub async fn submit(&self, message: impl Into<String>) -> PortalResult<PendingSubmission> {
        let message = message.into();

        if message.trim().is_empty() {
            self.record_invalid_input(&message);
            return Err(PortalError::invalid_input("wave message must not be empty"));
        }

        let (id, signer) = self.claim(&message)?;
        let _flight = FlightGuard { client: self, id };
        info!(submission_id = %id, account = %signer, "dispatching wave");

        let handle = match self
            .ledger
            .submit_entry(&signer, &message, self.config.resource_limit)
            .await
        {
            Ok(handle) => handle,
            Err(err) => return Err(self.fail(id, map_dispatch_error(err))),
        };

        let handle_for_state = handle.clone();
        self.advance(id, move |s| {
            s.status = SubmissionStatus::AwaitingConfirmation;
            s.handle = Some(handle_for_state);
        });
        info!(submission_id = %id, handle = %handle, "wave dispatched; awaiting confirmation");

        let receipt = match self.confirm(&handle).await {
            Ok(receipt) => receipt,
            Err(err) => return Err(self.fail(id, err)),
        };

        let receipt_for_state = receipt.clone();
        let mut confirmed = self
            .advance(id, move |s| {
                s.status = SubmissionStatus::Confirmed;
                s.receipt = Some(receipt_for_state);
            })
            .ok_or_else(|| PortalError::unknown("submission state lost"))?;
        info!(submission_id = %id, handle = %handle, "wave confirmed");

        // Never assume +1: other signers may have written in the meantime.
        match self.read_count().await {
            Ok(count) => {
                confirmed.refreshed_count = Some(count);
                self.advance(id, move |s| s.refreshed_count = Some(count));
            }
            Err(err) => {
                warn!(submission_id = %id, error = %err, "count refresh after confirmation failed");
            }
        }

        Ok(confirmed)
    }

    async fn confirm(&self, handle: &SubmissionHandle) -> PortalResult<ConfirmationReceipt> {
        let wait = self.ledger.await_confirmation(handle);

        let result = match self.config.confirmation_timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| PortalError::ConfirmationTimeout(limit))?,
            None => wait.await,
        };

        result.map_err(map_confirmation_error)
    }

    fn next_ticket(&self) -> u64 {
        self.read_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Atomically check the in-flight slot and take it.
    fn claim(&self, message: &str) -> PortalResult<(SubmissionId, Account)> {
        let (id, signer, reset) = {
            let mut slot = self
                .submission
                .lock()
                .map_err(|_| PortalError::unknown("submission lock poisoned"))?;

            if slot.as_ref().is_some_and(PendingSubmission::is_in_flight) {
                debug!("submit rejected: a submission is already in flight");
                return Err(PortalError::AlreadyInProgress);
            }

            let signer = self.connection.signer()?;
            let reset = slot.as_ref().is_some_and(|s| s.status.is_terminal());
            let next = PendingSubmission::start(message, SubmissionStatus::Submitting);
            let id = next.id;
            *slot = Some(next);
            (id, signer, reset)
        };

        if reset {
            self.publish_status(id, SubmissionStatus::Idle);
        }
        self.publish_status(id, SubmissionStatus::Submitting);

        Ok((id, signer))
    }

    fn record_invalid_input(&self, message: &str) {
        let recorded = match self.submission.lock() {
            Ok(mut slot) => {
                if slot.as_ref().is_some_and(PendingSubmission::is_in_flight) {
                    // Leave the in-flight submission alone.
                    None
                } else {
                    let reset = slot.as_ref().is_some_and(|s| s.status.is_terminal());
                    let failed = PendingSubmission::start(
                        message,
                        SubmissionStatus::Failed(FailureReason::InvalidInput),
                    );
                    let id = failed.id;
                    *slot = Some(failed);
                    Some((id, reset))
                }
            }
            Err(_) => None,
        };

        if let Some((id, reset)) = recorded {
            if reset {
                self.publish_status(id, SubmissionStatus::Idle);
            }
            self.publish_status(id, SubmissionStatus::Failed(FailureReason::InvalidInput));
        }
        debug!("submit rejected locally: empty message");
    }

    /// Apply `update` to the tracked submission if it is still `id`.
    fn advance(
        &self,
        id: SubmissionId,
        update: impl FnOnce(&mut PendingSubmission),
    ) -> Option<PendingSubmission> {
        let (before, after) = {
            let mut slot = self.submission.lock().ok()?;
            let current = slot.as_mut().filter(|s| s.id == id)?;
            let before = current.status;
            update(current);
            (before, current.clone())
        };

        if before != after.status {
            self.publish_status(id, after.status);
        }

        Some(after)
    }

    fn fail(&self, id: SubmissionId, err: PortalError) -> PortalError {
        let reason = err.failure_reason().unwrap_or(FailureReason::UnknownFault);
        warn!(submission_id = %id, reason = %reason, error = %err, "submission failed");
        self.advance(id, |s| s.status = SubmissionStatus::Failed(reason));
        err
    }

    fn publish_status(&self, submission_id: SubmissionId, status: SubmissionStatus) {
        publish_or_log(
            self.bus.as_ref(),
            PortalEvent::SubmissionStatusChanged {
                submission_id,
                status,
            },
        );
    }
}

/// Fails the tracked submission if `submit` is dropped mid-flight.
///
/// On a normal return the submission is already terminal and this is a no-op.
struct FlightGuard<'a> {
    client: &'a LedgerClient,
    id: SubmissionId,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let abandoned = self
            .client
            .submission()
            .is_some_and(|s| s.id == self.id && s.is_in_flight());
        if !abandoned {
            return;
        }

        let failed = self.client.advance(self.id, |s| {
            let reason = match s.status {
                SubmissionStatus::Submitting => FailureReason::UnknownFault,
                _ => FailureReason::ConfirmationTimeout,
            };
            s.status = SubmissionStatus::Failed(reason);
        });
        if let Some(failed) = failed {
            warn!(submission_id = %self.id, status = %failed.status, "submit dropped while in flight");
        }
    }
}

fn map_dispatch_error(err: LedgerError) -> PortalError {
    match err {
        LedgerError::Rejected(_) => PortalError::UserRejected,
        other => PortalError::dispatch(other.to_string()),
    }
}

fn map_confirmation_error(err: LedgerError) -> PortalError {
    match err {
        LedgerError::Reverted(_) | LedgerError::ResourceLimitExceeded { .. } | LedgerError::Rejected(_) => {
            PortalError::dispatch(err.to_string())
        }
        // The write may or may not have landed.
        LedgerError::Network(_) | LedgerError::UnknownHandle(_) => PortalError::unknown(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use proptest::prelude::*;
    use waveportal_core::{ContractAddress, WaveIndex};
    use waveportal_events::{EventBus, InMemoryEventBus, Subscription};
    use waveportal_wallet::InMemoryWalletProvider;

    use super::*;
    use crate::in_memory::{ConfirmationMode, InMemoryWaveLedger};

    struct Harness {
        ledger: Arc<InMemoryWaveLedger>,
        connection: Arc<ConnectionManager>,
        bus: Arc<InMemoryEventBus<PortalEvent>>,
        client: Arc<LedgerClient>,
    }

    fn contract() -> ContractAddress {
        "0xd1b7c7faf9e9e01b5c7287dd0d8013f88e1b7681".parse().unwrap()
    }

    fn alice() -> Account {
        Account::new("0xa11ce").unwrap()
    }

    fn bob() -> Account {
        Account::new("0xb0b").unwrap()
    }

    fn harness_with(ledger: InMemoryWaveLedger, config: LedgerClientConfig) -> Harness {
        let ledger = Arc::new(ledger);
        let bus = Arc::new(InMemoryEventBus::<PortalEvent>::new());
        let provider = Arc::new(InMemoryWalletProvider::approving(alice()));
        let connection = Arc::new(ConnectionManager::new(provider, bus.clone()));
        let client = Arc::new(LedgerClient::new(
            ledger.clone(),
            connection.clone(),
            config,
            bus.clone(),
        ));
        Harness {
            ledger,
            connection,
            bus,
            client,
        }
    }

    fn harness() -> Harness {
        harness_with(InMemoryWaveLedger::new(contract()), LedgerClientConfig::default())
    }

    fn manual_harness(timeout: Option<Duration>) -> Harness {
        harness_with(
            InMemoryWaveLedger::new(contract()).with_confirmation_mode(ConfirmationMode::Manual),
            LedgerClientConfig {
                confirmation_timeout: timeout,
                ..LedgerClientConfig::default()
            },
        )
    }

    async fn connected(h: &Harness) {
        h.connection.request_connection().await.unwrap();
    }

    fn statuses(sub: &Subscription<PortalEvent>) -> Vec<SubmissionStatus> {
        sub.drain()
            .into_iter()
            .filter_map(|e| match e {
                PortalEvent::SubmissionStatusChanged { status, .. } => Some(status),
                _ => None,
            })
            .collect()
    }

    async fn wait_for_status(client: &LedgerClient, status: SubmissionStatus) {
        for _ in 0..200 {
            if client.submission_status() == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("submission never reached {status}");
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn confirmed_submission_walks_the_full_status_path() {
        let h = harness();
        connected(&h).await;
        for i in 0..5 {
            h.ledger.append_external(bob(), format!("wave {i}"));
        }
        assert_eq!(h.client.read_count().await.unwrap(), WaveCount::new(5));
        assert_eq!(h.client.submission_status(), SubmissionStatus::Idle);

        let sub = h.bus.subscribe();
        let done = h.client.submit("gm").await.unwrap();

        assert_eq!(
            statuses(&sub),
            vec![
                SubmissionStatus::Submitting,
                SubmissionStatus::AwaitingConfirmation,
                SubmissionStatus::Confirmed,
            ]
        );
        assert_eq!(done.status, SubmissionStatus::Confirmed);
        assert!(done.refreshed_count.unwrap() >= WaveCount::new(5));
        assert_eq!(done.receipt.unwrap().entry_index, Some(WaveIndex::new(5)));
        assert!(h.client.wave_count().unwrap() >= WaveCount::new(5));

        let log = h.client.read_log(None).await.unwrap();
        assert!(log.entries().iter().any(|e| e.message() == "gm" && e.author() == &alice()));
    }

    #[tokio::test]
    async fn count_after_confirmation_accounts_for_concurrent_signers() {
        let h = manual_harness(None);
        connected(&h).await;
        let before = h.client.read_count().await.unwrap();

        let client = h.client.clone();
        let task = tokio::spawn(async move { client.submit("hello").await });
        wait_for_status(&h.client, SubmissionStatus::AwaitingConfirmation).await;

        // Someone else lands a wave while ours is pending.
        h.ledger.append_external(bob(), "me first");
        h.ledger.release_confirmations(1);

        let done = task.await.unwrap().unwrap();
        let after = done.refreshed_count.unwrap();
        assert!(after >= before);
        assert_eq!(after, WaveCount::new(before.get() + 2));
    }

    #[tokio::test]
    async fn second_submit_while_in_flight_is_rejected_without_disturbing_the_first() {
        let h = manual_harness(None);
        connected(&h).await;

        let client = h.client.clone();
        let first = tokio::spawn(async move { client.submit("first").await });
        wait_for_status(&h.client, SubmissionStatus::AwaitingConfirmation).await;
        let in_flight = h.client.submission().unwrap();

        assert_eq!(h.client.submit("second").await, Err(PortalError::AlreadyInProgress));
        assert_eq!(h.client.submission().unwrap(), in_flight);
        assert_eq!(h.ledger.calls().submit_entry, 1);

        h.ledger.release_confirmations(1);
        let done = first.await.unwrap().unwrap();
        assert_eq!(done.message, "first");
        assert_eq!(done.status, SubmissionStatus::Confirmed);
        assert_eq!(h.ledger.get_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_message_during_flight_leaves_flight_alone() {
        let h = manual_harness(None);
        connected(&h).await;

        let client = h.client.clone();
        let first = tokio::spawn(async move { client.submit("first").await });
        wait_for_status(&h.client, SubmissionStatus::AwaitingConfirmation).await;

        assert!(matches!(h.client.submit("").await, Err(PortalError::InvalidInput(_))));
        assert_eq!(h.client.submission_status(), SubmissionStatus::AwaitingConfirmation);

        h.ledger.release_confirmations(1);
        assert!(first.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn read_fault_keeps_cached_count() {
        let h = harness();
        connected(&h).await;
        h.ledger.append_external(bob(), "one");
        h.ledger.append_external(bob(), "two");
        assert_eq!(h.client.read_count().await.unwrap(), WaveCount::new(2));

        h.ledger.set_read_fault(Some("connection reset".to_string()));
        assert!(matches!(h.client.read_count().await, Err(PortalError::ReadError(_))));
        assert_eq!(h.client.wave_count(), Some(WaveCount::new(2)));

        assert!(matches!(h.client.read_log(None).await, Err(PortalError::ReadError(_))));
        assert!(h.client.wave_log().is_empty());
    }

    #[tokio::test]
    async fn reads_require_a_connected_signer() {
        let h = harness();
        assert_eq!(h.client.read_count().await, Err(PortalError::NotConnected));
        assert_eq!(h.client.read_log(None).await, Err(PortalError::NotConnected));
        assert_eq!(h.client.submit("gm").await, Err(PortalError::NotConnected));
        assert_eq!(h.client.submission_status(), SubmissionStatus::Idle);
        assert_eq!(h.ledger.calls().total(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_timeout_fails_without_touching_the_ledger_write() {
        let h = manual_harness(Some(Duration::from_secs(5)));
        connected(&h).await;

        let err = h.client.submit("slow").await.unwrap_err();
        assert_eq!(err, PortalError::ConfirmationTimeout(Duration::from_secs(5)));
        assert_eq!(
            h.client.submission_status(),
            SubmissionStatus::Failed(FailureReason::ConfirmationTimeout)
        );
        // The ledger still holds the dispatched write.
        assert_eq!(h.ledger.pending_count(), 1);
    }

    #[tokio::test]
    async fn signer_rejection_is_user_rejected() {
        let h = harness();
        connected(&h).await;
        h.ledger
            .fail_next_dispatch(LedgerError::Rejected("user denied signature".to_string()));

        assert_eq!(h.client.submit("gm").await, Err(PortalError::UserRejected));
        assert_eq!(
            h.client.submission_status(),
            SubmissionStatus::Failed(FailureReason::UserRejected)
        );
    }

    #[tokio::test]
    async fn resource_limit_below_ledger_minimum_is_dispatch_error() {
        let h = harness_with(
            InMemoryWaveLedger::new(contract()).with_min_resource_limit(ResourceLimit::new(500_000)),
            LedgerClientConfig::default(),
        );
        connected(&h).await;

        assert!(matches!(h.client.submit("gm").await, Err(PortalError::DispatchError(_))));
        assert_eq!(
            h.client.submission_status(),
            SubmissionStatus::Failed(FailureReason::DispatchError)
        );
        assert_eq!(h.ledger.get_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn confirmation_faults_map_to_reasons() {
        let h = harness();
        connected(&h).await;

        h.ledger
            .fail_next_confirmation(LedgerError::Reverted("paused".to_string()));
        assert!(matches!(h.client.submit("a").await, Err(PortalError::DispatchError(_))));

        h.ledger
            .fail_next_confirmation(LedgerError::Network("dropped".to_string()));
        assert!(matches!(h.client.submit("b").await, Err(PortalError::UnknownFault(_))));
        assert_eq!(
            h.client.submission_status(),
            SubmissionStatus::Failed(FailureReason::UnknownFault)
        );
    }

    #[tokio::test]
    async fn submit_after_failure_resets_to_idle_then_proceeds() {
        let h = harness();
        connected(&h).await;
        h.ledger
            .fail_next_dispatch(LedgerError::Network("offline".to_string()));
        assert!(h.client.submit("gm").await.is_err());

        let sub = h.bus.subscribe();
        h.client.submit("gm again").await.unwrap();
        assert_eq!(
            statuses(&sub),
            vec![
                SubmissionStatus::Idle,
                SubmissionStatus::Submitting,
                SubmissionStatus::AwaitingConfirmation,
                SubmissionStatus::Confirmed,
            ]
        );
        assert_eq!(h.ledger.calls().submit_entry, 2);
    }

    #[tokio::test]
    async fn count_refresh_failure_still_reports_confirmed() {
        let h = manual_harness(None);
        connected(&h).await;

        let client = h.client.clone();
        let task = tokio::spawn(async move { client.submit("gm").await });
        wait_for_status(&h.client, SubmissionStatus::AwaitingConfirmation).await;
        h.ledger.set_read_fault(Some("flaky".to_string()));
        h.ledger.release_confirmations(1);

        let done = task.await.unwrap().unwrap();
        assert_eq!(done.status, SubmissionStatus::Confirmed);
        assert_eq!(done.refreshed_count, None);
        assert_eq!(h.ledger.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn paged_read_keeps_full_snapshot_cached() {
        let h = harness();
        connected(&h).await;
        for i in 0..6 {
            h.ledger.append_external(bob(), format!("w{i}"));
        }

        let page = h.client.read_log(Some(PageHint::new(4, 10))).await.unwrap();
        assert_eq!(page.offset(), 4);
        assert_eq!(page.entries()[0].message(), "w4");
        assert_eq!(h.client.wave_log().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_dropped_by_caller_fails_the_slot_and_allows_a_retry() {
        let h = manual_harness(None);
        connected(&h).await;

        let outer = tokio::time::timeout(Duration::from_secs(5), h.client.submit("gm")).await;
        assert!(outer.is_err());
        assert_eq!(
            h.client.submission_status(),
            SubmissionStatus::Failed(FailureReason::ConfirmationTimeout)
        );

        let sub = h.bus.subscribe();
        h.ledger.release_confirmations(1);
        let done = h.client.submit("gm again").await.unwrap();
        assert_eq!(done.status, SubmissionStatus::Confirmed);
        assert_eq!(
            statuses(&sub),
            vec![
                SubmissionStatus::Idle,
                SubmissionStatus::Submitting,
                SubmissionStatus::AwaitingConfirmation,
                SubmissionStatus::Confirmed,
            ]
        );
    }

    #[tokio::test]
    async fn dropping_a_finished_submit_changes_nothing() {
        let h = harness();
        connected(&h).await;
        let sub = h.bus.subscribe();

        let done = h.client.submit("gm").await.unwrap();
        assert_eq!(h.client.submission().unwrap(), done);
        assert_eq!(statuses(&sub).last(), Some(&SubmissionStatus::Confirmed));
    }

    /// Wraps a ledger so that one count read stalls after fetching its value.
    struct StallingCountLedger {
        inner: Arc<InMemoryWaveLedger>,
        stall_next: AtomicBool,
        gate: tokio::sync::Semaphore,
    }

    #[async_trait::async_trait]
    impl WaveLedger for StallingCountLedger {
        fn contract(&self) -> &ContractAddress {
            self.inner.contract()
        }

        async fn get_count(&self) -> Result<u64, LedgerError> {
            let count = self.inner.get_count().await?;
            if self.stall_next.swap(false, Ordering::SeqCst) {
                self.gate
                    .acquire()
                    .await
                    .map_err(|_| LedgerError::Network("gate closed".to_string()))?
                    .forget();
            }
            Ok(count)
        }

        async fn get_entries(&self) -> Result<Vec<RawWaveEntry>, LedgerError> {
            self.inner.get_entries().await
        }

        async fn submit_entry(
            &self,
            signer: &Account,
            message: &str,
            resource_limit: ResourceLimit,
        ) -> Result<SubmissionHandle, LedgerError> {
            self.inner.submit_entry(signer, message, resource_limit).await
        }

        async fn await_confirmation(
            &self,
            handle: &SubmissionHandle,
        ) -> Result<ConfirmationReceipt, LedgerError> {
            self.inner.await_confirmation(handle).await
        }
    }

    #[tokio::test]
    async fn overtaken_count_read_does_not_replace_a_newer_one() {
        let inner = Arc::new(InMemoryWaveLedger::new(contract()));
        inner.append_external(bob(), "one");
        let ledger = Arc::new(StallingCountLedger {
            inner: inner.clone(),
            stall_next: AtomicBool::new(true),
            gate: tokio::sync::Semaphore::new(0),
        });
        let bus = Arc::new(InMemoryEventBus::<PortalEvent>::new());
        let connection = Arc::new(ConnectionManager::new(
            Arc::new(InMemoryWalletProvider::approving(alice())),
            bus.clone(),
        ));
        connection.request_connection().await.unwrap();
        let client = Arc::new(LedgerClient::new(
            ledger.clone(),
            connection,
            LedgerClientConfig::default(),
            bus,
        ));

        let slow = tokio::spawn({
            let client = client.clone();
            async move { client.read_count().await }
        });
        while inner.calls().get_count == 0 {
            tokio::task::yield_now().await;
        }

        inner.append_external(bob(), "two");
        assert_eq!(client.read_count().await.unwrap(), WaveCount::new(2));

        ledger.gate.add_permits(1);
        assert_eq!(slow.await.unwrap().unwrap(), WaveCount::new(1));
        assert_eq!(client.wave_count(), Some(WaveCount::new(2)));
    }

    #[test]
    fn stamped_keeps_the_latest_started_read() {
        let mut cached = Stamped::<u64>::default();
        assert_eq!(cached.offer(2, 20), Some(0));
        assert_eq!(cached.offer(1, 10), None);
        assert_eq!(cached.value, 20);
        assert_eq!(cached.offer(3, 30), Some(20));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: blank messages are refused locally, whatever the connection state.
        #[test]
        fn blank_message_never_reaches_the_ledger(
            message in "[ \t\n]{0,8}",
            is_connected in any::<bool>(),
        ) {
            let rt = runtime();
            let h = harness();
            rt.block_on(async {
                if is_connected {
                    connected(&h).await;
                }
                let result = h.client.submit(message.clone()).await;
                prop_assert!(matches!(result, Err(PortalError::InvalidInput(_))));
                prop_assert_eq!(h.ledger.calls().total(), 0);
                prop_assert_eq!(
                    h.client.submission_status(),
                    SubmissionStatus::Failed(FailureReason::InvalidInput)
                );
                Ok(())
            })?;
        }

        /// Property: the log keeps ledger order and maps each timestamp exactly.
        #[test]
        fn log_preserves_order_and_timestamps(
            stamps in prop::collection::vec(0u64..=253_402_300_799u64, 0..20),
        ) {
            let rt = runtime();
            let h = harness();
            rt.block_on(async {
                connected(&h).await;
                for (i, secs) in stamps.iter().enumerate() {
                    h.ledger.set_clock_seconds(*secs);
                    h.ledger.append_external(bob(), format!("m{i}"));
                }

                let log = h.client.read_log(None).await.unwrap();
                prop_assert_eq!(log.len(), stamps.len());
                for ((index, entry), secs) in log.iter_keyed().zip(stamps.iter()) {
                    prop_assert_eq!(entry.message(), format!("m{}", index.get()));
                    prop_assert_eq!(entry.submitted_at().timestamp(), *secs as i64);
                    prop_assert_eq!(entry.submitted_at().timestamp_subsec_nanos(), 0);
                }
                Ok(())
            })?;
        }
    }
}
