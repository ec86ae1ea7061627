//! # Tide Result Cache
//!
//! A bounded LRU of finished [`TideInfo`] values that also deduplicates work:
//! while a key is being computed, later requests for the same key attach to
//! the running computation instead of starting another one.
//!
//! ## Locking
//! Entries, the in-flight registry and the statistics sit behind one mutex.
//! The lock is only held for map bookkeeping, never across an `.await` and
//! never while the compute closure runs.
//!
//! ## Lifecycle of a miss
//! 1. The first caller registers a `watch` channel for the key and hands the
//!    closure to `spawn_blocking`.
//! 2. The blocking task runs the closure, then, under the lock, stores a
//!    successful result, removes the registration and publishes the outcome.
//! 3. Every caller (owner included) waits on the channel for that outcome.
//!
//! Because step 2 happens inside the spawned task, a caller that stops
//! waiting does not cancel anything: the computation still lands in the
//! cache. Failures are published to all waiters and never cached.

use crate::coordinate::Coordinate;
use crate::error::TideError;
use crate::TideInfo;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, warn};

type Outcome = Option<Result<TideInfo, TideError>>;

/// Identity of a request: rounded coordinate, start instant and the version
/// of the variation settings that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub coordinate_hash: String,
    pub date_hash: String,
    pub variation_options_version: u32,
}

impl CacheKey {
    pub fn derive(coordinate: &Coordinate, date: DateTime<Utc>, variation_options_version: u32) -> Self {
        let (lat, lon) = coordinate.rounded();
        Self {
            coordinate_hash: format!("{lat:.4},{lon:.4}"),
            date_hash: date.to_rfc3339_opts(SecondsFormat::Secs, true),
            variation_options_version,
        }
    }

    /// Inverse of the `Display` form, `"<lat>,<lon>|<date>|v<version>"`.
    pub fn parse(s: &str) -> Result<Self, TideError> {
        let mut parts = s.split('|');
        let (Some(coordinate_hash), Some(date_hash), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TideError::corruption(format!("malformed cache key '{s}'")));
        };

        let variation_options_version = version
            .strip_prefix('v')
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| TideError::corruption(format!("bad version in cache key '{s}'")))?;
        DateTime::parse_from_rfc3339(date_hash)
            .map_err(|e| TideError::corruption(format!("bad date in cache key '{s}': {e}")))?;
        if coordinate_hash.split(',').count() != 2 {
            return Err(TideError::corruption(format!("bad coordinate in cache key '{s}'")));
        }

        Ok(Self {
            coordinate_hash: coordinate_hash.to_string(),
            date_hash: date_hash.to_string(),
            variation_options_version,
        })
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|v{}",
            self.coordinate_hash, self.date_hash, self.variation_options_version
        )
    }
}

/// A stored result with its bookkeeping.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub data: TideInfo,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub calculation_time_ms: u64,
    /// Monotonic touch counter, orders accesses within the same millisecond
    access_seq: u64,
}

impl CacheEntry {
    pub fn new(key: CacheKey, data: TideInfo, calculation_time_ms: u64) -> Self {
        let now = Utc::now();
        Self::restored(key, data, now, now, calculation_time_ms)
    }

    /// Rebuild an entry with its original timestamps.
    pub fn restored(
        key: CacheKey,
        data: TideInfo,
        created_at: DateTime<Utc>,
        last_accessed_at: DateTime<Utc>,
        calculation_time_ms: u64,
    ) -> Self {
        Self {
            key,
            data,
            created_at,
            last_accessed_at,
            calculation_time_ms,
            access_seq: 0,
        }
    }
}

/// Counters describing cache behaviour since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Requests that attached to an in-flight computation
    pub joined: u64,
    pub evictions: u64,
    pub failures: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    in_flight: HashMap<CacheKey, watch::Receiver<Outcome>>,
    next_seq: u64,
    stats: CacheStats,
}

impl CacheState {
    fn touch(&mut self, key: &CacheKey) -> Option<TideInfo> {
        self.next_seq += 1;
        let seq = self.next_seq;
        let entry = self.entries.get_mut(key)?;
        entry.last_accessed_at = Utc::now();
        entry.access_seq = seq;
        Some(entry.data.clone())
    }

    fn insert(&mut self, mut entry: CacheEntry, capacity: usize) {
        self.next_seq += 1;
        entry.access_seq = self.next_seq;
        self.entries.insert(entry.key.clone(), entry);

        while self.entries.len() > capacity {
            let Some(victim) = self
                .entries
                .values()
                .min_by(|a, b| {
                    a.last_accessed_at
                        .cmp(&b.last_accessed_at)
                        .then_with(|| a.created_at.cmp(&b.created_at))
                        .then_with(|| a.access_seq.cmp(&b.access_seq))
                })
                .map(|e| e.key.clone())
            else {
                break;
            };
            debug!(key = %victim, "evicting least recently used entry");
            self.entries.remove(&victim);
            self.stats.evictions += 1;
        }
    }
}

/// Clears the in-flight registration if the compute closure unwinds.
struct InFlightGuard {
    state: Arc<Mutex<CacheState>>,
    key: CacheKey,
    armed: bool,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.armed {
            lock(&self.state).in_flight.remove(&self.key);
        }
    }
}

fn lock(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bounded, deduplicating store of tide results.
pub struct TideCache {
    capacity: usize,
    state: Arc<Mutex<CacheState>>,
}

impl TideCache {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        lock(&self.state).entries.contains_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        lock(&self.state).stats
    }

    /// Look up a finished result, marking it as recently used.
    pub fn get(&self, key: &CacheKey) -> Option<TideInfo> {
        let mut state = lock(&self.state);
        let hit = state.touch(key);
        if hit.is_some() {
            state.stats.hits += 1;
        }
        hit
    }

    /// Store an entry directly, evicting as needed.
    pub fn insert(&self, entry: CacheEntry) {
        lock(&self.state).insert(entry, self.capacity);
    }

    /// Copies of every stored entry, most recently used first.
    pub fn entries(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = lock(&self.state).entries.values().cloned().collect();
        entries.sort_by(|a, b| b.access_seq.cmp(&a.access_seq));
        entries
    }

    pub fn clear(&self) {
        lock(&self.state).entries.clear();
    }

    /// Return the cached result for `key`, or compute it exactly once no
    /// matter how many callers ask concurrently.
    pub async fn get_or_compute<F>(&self, key: CacheKey, compute: F) -> Result<TideInfo, TideError>
    where
        F: FnOnce() -> Result<TideInfo, TideError> + Send + 'static,
    {
        let mut outcome = {
            let mut state = lock(&self.state);
            if let Some(info) = state.touch(&key) {
                state.stats.hits += 1;
                debug!(%key, "cache hit");
                return Ok(info);
            }

            if let Some(pending) = state.in_flight.get(&key) {
                let pending = pending.clone();
                state.stats.joined += 1;
                debug!(%key, "joining in-flight computation");
                pending
            } else {
                let (tx, rx) = watch::channel(None);
                state.in_flight.insert(key.clone(), rx.clone());
                state.stats.misses += 1;
                debug!(%key, "cache miss, computing");
                self.spawn_computation(key.clone(), tx, compute);
                rx
            }
        };

        let published = match outcome.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        };
        published.unwrap_or_else(|| Err(TideError::ComputationLost(key.to_string())))
    }

    fn spawn_computation<F>(&self, key: CacheKey, tx: watch::Sender<Outcome>, compute: F)
    where
        F: FnOnce() -> Result<TideInfo, TideError> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let capacity = self.capacity;

        tokio::task::spawn_blocking(move || {
            let mut guard = InFlightGuard {
                state: Arc::clone(&state),
                key: key.clone(),
                armed: true,
            };

            let started = Instant::now();
            let result = compute();
            let calculation_time_ms = started.elapsed().as_millis() as u64;

            {
                let mut locked = lock(&state);
                locked.in_flight.remove(&key);
                match &result {
                    Ok(info) => {
                        locked.insert(CacheEntry::new(key.clone(), info.clone(), calculation_time_ms), capacity);
                    }
                    Err(e) => {
                        locked.stats.failures += 1;
                        warn!(%key, error = %e, "tide computation failed");
                    }
                }
            }
            guard.armed = false;
            tx.send_replace(Some(result));
        });
    }
}
