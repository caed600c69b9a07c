use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregation::RealizationMatrix;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    Stale,
    Fetching,
    Fresh,
}

/// Proof that a fetch was started. Only the newest ticket for a year may
/// commit its result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchTicket {
    year: i32,
    generation: u64,
}

impl FetchTicket {
    pub fn year(&self) -> i32 {
        self.year
    }
}

#[derive(Debug)]
struct CacheEntry {
    state: CacheState,
    generation: u64,
    matrix: Option<Arc<RealizationMatrix>>,
    fetched_at: Option<DateTime<Utc>>,
}

impl Default for CacheEntry {
    fn default() -> Self {
        Self { state: CacheState::Stale, generation: 0, matrix: None, fetched_at: None }
    }
}

/// Per-year cache of aggregated matrices.
///
/// `Stale -> Fetching -> Fresh`, back to `Stale` on expiry, invalidation or a
/// failed fetch. The last committed matrix survives every transition so
/// callers can keep showing it while a refresh is failing.
#[derive(Debug)]
pub struct RealizationCache {
    freshness: Duration,
    entries: Mutex<HashMap<i32, CacheEntry>>,
}

impl RealizationCache {
    pub fn new(freshness: Duration) -> Self {
        Self { freshness, entries: Mutex::new(HashMap::new()) }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<i32, CacheEntry>> {
        match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn expire_if_due(&self, entry: &mut CacheEntry, now: DateTime<Utc>) {
        if entry.state != CacheState::Fresh {
            return;
        }
        let expired = entry.fetched_at.map(|at| now - at >= self.freshness).unwrap_or(true);
        if expired {
            entry.state = CacheState::Stale;
        }
    }

    pub fn state(&self, year: i32, now: DateTime<Utc>) -> CacheState {
        let mut entries = self.entries();
        match entries.get_mut(&year) {
            Some(entry) => {
                self.expire_if_due(entry, now);
                entry.state
            }
            None => CacheState::Stale,
        }
    }

    /// The cached matrix, only while it is inside the freshness window.
    pub fn get_fresh(&self, year: i32, now: DateTime<Utc>) -> Option<Arc<RealizationMatrix>> {
        let mut entries = self.entries();
        let entry = entries.get_mut(&year)?;
        self.expire_if_due(entry, now);
        match entry.state {
            CacheState::Fresh => entry.matrix.clone(),
            CacheState::Stale | CacheState::Fetching => None,
        }
    }

    /// Last committed matrix regardless of freshness.
    pub fn last_known_good(&self, year: i32) -> Option<Arc<RealizationMatrix>> {
        self.entries().get(&year).and_then(|entry| entry.matrix.clone())
    }

    /// Marks the year as fetching and supersedes any fetch already in flight.
    pub fn begin_fetch(&self, year: i32) -> FetchTicket {
        let mut entries = self.entries();
        let entry = entries.entry(year).or_default();
        entry.generation += 1;
        entry.state = CacheState::Fetching;
        FetchTicket { year, generation: entry.generation }
    }

    /// Commits a fetched matrix. Returns `false` when the ticket was
    /// superseded by a newer fetch or an invalidation; the result is then
    /// discarded.
    pub fn complete_fetch(
        &self,
        ticket: FetchTicket,
        matrix: Arc<RealizationMatrix>,
        now: DateTime<Utc>,
    ) -> bool {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(&ticket.year) else {
            return false;
        };
        if entry.generation != ticket.generation {
            return false;
        }

        entry.state = CacheState::Fresh;
        entry.matrix = Some(matrix);
        entry.fetched_at = Some(now);
        true
    }

    pub fn fail_fetch(&self, ticket: FetchTicket) {
        let mut entries = self.entries();
        if let Some(entry) = entries.get_mut(&ticket.year) {
            if entry.generation == ticket.generation {
                entry.state = CacheState::Stale;
            }
        }
    }

    /// Forces the next read of `year` to refetch. Fetches started before the
    /// invalidation can no longer commit.
    pub fn invalidate(&self, year: i32) {
        let mut entries = self.entries();
        if let Some(entry) = entries.get_mut(&year) {
            entry.generation += 1;
            entry.state = CacheState::Stale;
        }
    }
}
