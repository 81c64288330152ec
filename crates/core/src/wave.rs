//! Wave records as seen by the client.
//!
//! Entries are produced only by the ledger. The client holds snapshots of them
//! and never edits one in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::Account;

/// Aggregate number of waves recorded on the ledger.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaveCount(u64);

impl WaveCount {
    pub const ZERO: WaveCount = WaveCount(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for WaveCount {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl core::fmt::Display for WaveCount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Position of an entry in ledger order.
///
/// Stable once assigned, so it doubles as the rendering key for feeds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaveIndex(u64);

impl WaveIndex {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for WaveIndex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One immutable wave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveEntry {
    author: Account,
    message: String,
    submitted_at: DateTime<Utc>,
}

impl WaveEntry {
    pub fn new(author: Account, message: impl Into<String>, submitted_at: DateTime<Utc>) -> Self {
        Self {
            author,
            message: message.into(),
            submitted_at,
        }
    }

    pub fn author(&self) -> &Account {
        &self.author
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

/// Requested window over the log: `limit` entries starting at ledger index `start`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageHint {
    pub start: u64,
    pub limit: usize,
}

impl PageHint {
    pub fn new(start: u64, limit: usize) -> Self {
        Self { start, limit }
    }
}

/// Snapshot of the wave log in ledger order.
///
/// `offset` is the ledger index of `entries[0]`; a full snapshot has offset 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveLog {
    offset: u64,
    entries: Vec<WaveEntry>,
}

impl WaveLog {
    /// A full snapshot (offset 0).
    pub fn new(entries: Vec<WaveEntry>) -> Self {
        Self { offset: 0, entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[WaveEntry] {
        &self.entries
    }

    pub fn get(&self, index: WaveIndex) -> Option<&WaveEntry> {
        let pos = index.get().checked_sub(self.offset)?;
        self.entries.get(usize::try_from(pos).ok()?)
    }

    /// Entries paired with their ledger index.
    pub fn iter_keyed(&self) -> impl Iterator<Item = (WaveIndex, &WaveEntry)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(move |(i, e)| (WaveIndex::new(self.offset + i as u64), e))
    }

    /// Window of this snapshot. Indices are preserved; out-of-range windows are empty.
    pub fn page(&self, hint: PageHint) -> WaveLog {
        let start = hint.start.max(self.offset);
        let skip = usize::try_from(start - self.offset).unwrap_or(usize::MAX);
        let entries: Vec<WaveEntry> = self
            .entries
            .iter()
            .skip(skip)
            .take(hint.limit)
            .cloned()
            .collect();

        WaveLog {
            offset: start,
            entries,
        }
    }
}
