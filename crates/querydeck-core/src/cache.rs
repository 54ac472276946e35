//! Per-query snapshot cache entry.
//!
//! A [`CacheEntry`] holds the last successfully fetched [`Snapshot`] for
//! one query, the time of that fetch, a generation counter, and the
//! refresh gate.
//!
//! # Refresh gate
//!
//! The gate is an [`AtomicBool`] flipped from `false` to `true` by a single
//! compare-and-swap. Whoever wins holds a [`RefreshGuard`] and is the only
//! caller allowed to store a new snapshot; losers do not wait and read the
//! current value instead. Dropping the guard reopens the gate, so it is
//! released on every exit path, including errors and cancelled futures.
//!
//! The stored state sits behind a [`RwLock`] that is only held long enough
//! to clone or replace an `Arc`, never across a fetch.
//!
//! The gate is process-local. Separate service instances each keep their
//! own cache and refresh on their own schedule.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use querydeck_types::Snapshot;

/// A cached snapshot together with the generation it was stored under.
///
/// Generation 0 is the placeholder held before the first successful fetch.
#[derive(Debug, Clone)]
pub struct CachedSnapshot {
    /// The snapshot.
    pub snapshot: Arc<Snapshot>,
    /// Incremented on every successful store.
    pub generation: u64,
}

#[derive(Debug)]
struct CachedState {
    current: CachedSnapshot,
    last_refresh: Option<DateTime<Utc>>,
}

/// Cached state and refresh gate for one query.
#[derive(Debug)]
pub struct CacheEntry {
    refreshing: AtomicBool,
    state: RwLock<CachedState>,
}

impl CacheEntry {
    /// Create an entry holding `placeholder` and no refresh history.
    pub fn new(placeholder: Snapshot) -> Self {
        Self {
            refreshing: AtomicBool::new(false),
            state: RwLock::new(CachedState {
                current: CachedSnapshot {
                    snapshot: Arc::new(placeholder),
                    generation: 0,
                },
                last_refresh: None,
            }),
        }
    }

    /// The currently stored snapshot.
    pub fn current(&self) -> CachedSnapshot {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    /// Time of the last successful refresh, if any.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last_refresh
    }

    /// Whether the entry is due for a refresh at `now`.
    ///
    /// An entry that was never refreshed is always stale. Otherwise it is
    /// stale once strictly more than `interval_secs` whole seconds have
    /// elapsed. `None` means the entry is fetched once and never again.
    pub fn is_stale_at(&self, now: DateTime<Utc>, interval_secs: Option<u64>) -> bool {
        let Some(last) = self.last_refresh() else {
            return true;
        };
        let Some(interval) = interval_secs else {
            return false;
        };
        let elapsed = now.timestamp().saturating_sub(last.timestamp());
        elapsed > i64::try_from(interval).unwrap_or(i64::MAX)
    }

    /// Try to take the refresh gate without waiting.
    ///
    /// Returns `None` when another caller already holds it.
    pub fn try_begin_refresh(&self) -> Option<RefreshGuard<'_>> {
        self.refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RefreshGuard { entry: self })
    }

    /// Take the refresh gate only if the entry is still stale once held.
    ///
    /// A caller that saw a stale entry may win the gate just after another
    /// refresh stored a fresh snapshot and released it. Staleness is checked
    /// again under the gate so that caller does not fetch a second time.
    /// Returns `None` when the gate is busy or the entry is fresh.
    pub fn begin_refresh_if_stale(
        &self,
        now: DateTime<Utc>,
        interval_secs: Option<u64>,
    ) -> Option<RefreshGuard<'_>> {
        self.try_begin_refresh()
            .filter(|_| self.is_stale_at(now, interval_secs))
    }

    /// Whether a refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }
}

/// Proof of holding the refresh gate of one [`CacheEntry`].
#[derive(Debug)]
pub struct RefreshGuard<'a> {
    entry: &'a CacheEntry,
}

impl RefreshGuard<'_> {
    /// Replace the stored snapshot and stamp the refresh time.
    ///
    /// Returns the newly stored snapshot with its generation.
    pub fn store(&self, snapshot: Snapshot, refreshed_at: DateTime<Utc>) -> CachedSnapshot {
        let mut state = self
            .entry
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        state.current = CachedSnapshot {
            snapshot: Arc::new(snapshot),
            generation: state.current.generation.saturating_add(1),
        };
        state.last_refresh = Some(refreshed_at);
        state.current.clone()
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.entry.refreshing.store(false, Ordering::Release);
    }
}
