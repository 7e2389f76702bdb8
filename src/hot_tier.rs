//! Hot tier (L1) - in-process, bounded, TTL+LRU store
//!
//! Provides sub-millisecond access to recently touched keys. Entries past
//! their TTL are treated as absent on read (lazy expiry) and reclaimed by
//! the periodic sweep; exceeding the size bound evicts the least recently
//! accessed entry until the store is back within bound.
//!
//! All state sits behind a single `parking_lot::Mutex` that is never held
//! across an await point, so the store is safe to share between concurrent
//! engine calls.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::types::StreamDataPoint;

struct HotEntry {
    points: Arc<Vec<StreamDataPoint>>,
    inserted_at: Instant,
    ttl: Duration,
    /// Monotonic recency stamp; lowest value is the LRU victim
    last_access: u64,
}

impl HotEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.ttl
    }
}

#[derive(Default)]
struct HotState {
    entries: HashMap<String, HotEntry>,
    /// Recency index mirroring `entries`: stamp -> key. Stamps are unique,
    /// so the first index entry is always the LRU victim and eviction stays
    /// O(log n) under sustained write pressure.
    recency: BTreeMap<u64, String>,
    access_seq: u64,
    evictions: u64,
    expirations: u64,
}

/// In-process bounded TTL+LRU store for tick payloads
pub struct HotTierStore {
    state: Mutex<HotState>,
    max_entries: usize,
}

impl HotTierStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: Mutex::new(HotState::default()),
            max_entries,
        }
    }

    /// Insert or overwrite an entry, resetting its recency and TTL clock.
    /// Evicts LRU entries inline if the insert pushed the store over bound.
    pub fn put(&self, key: &str, points: Arc<Vec<StreamDataPoint>>, ttl: Duration) {
        let mut state = self.state.lock();
        state.access_seq += 1;
        let last_access = state.access_seq;
        if let Some(old) = state.entries.insert(
            key.to_string(),
            HotEntry {
                points,
                inserted_at: Instant::now(),
                ttl,
                last_access,
            },
        ) {
            state.recency.remove(&old.last_access);
        }
        state.recency.insert(last_access, key.to_string());
        Self::evict_locked(&mut state, self.max_entries);
    }

    /// Fetch an entry if present and fresh; a hit refreshes recency.
    /// An expired entry is removed on the spot and reported as absent.
    pub fn get(&self, key: &str) -> Option<Arc<Vec<StreamDataPoint>>> {
        let mut state = self.state.lock();
        let now = Instant::now();

        let expired = match state.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => return None,
        };

        if expired {
            if let Some(entry) = state.entries.remove(key) {
                state.recency.remove(&entry.last_access);
            }
            state.expirations += 1;
            debug!("Hot tier entry expired on read: {}", key);
            return None;
        }

        state.access_seq += 1;
        let seq = state.access_seq;
        let HotState {
            entries, recency, ..
        } = &mut *state;
        entries.get_mut(key).map(|entry| {
            recency.remove(&entry.last_access);
            recency.insert(seq, key.to_string());
            entry.last_access = seq;
            Arc::clone(&entry.points)
        })
    }

    /// Evict least-recently-accessed entries until within the size bound
    pub fn evict_if_needed(&self) {
        let mut state = self.state.lock();
        Self::evict_locked(&mut state, self.max_entries);
    }

    fn evict_locked(state: &mut HotState, max_entries: usize) {
        while state.entries.len() > max_entries {
            match state.recency.pop_first() {
                Some((_, key)) => {
                    state.entries.remove(&key);
                    state.evictions += 1;
                    debug!("Evicted LRU hot tier entry: {}", key);
                }
                None => break,
            }
        }
    }

    /// Reclaim all entries whose TTL has elapsed
    pub fn sweep_expired(&self) -> usize {
        let mut state = self.state.lock();
        let now = Instant::now();
        let HotState {
            entries, recency, ..
        } = &mut *state;
        let before = entries.len();
        entries.retain(|_, entry| {
            if entry.is_expired(now) {
                recency.remove(&entry.last_access);
                false
            } else {
                true
            }
        });
        let removed = before - entries.len();
        state.expirations += removed as u64;
        if removed > 0 {
            debug!("Hot tier sweep removed {} expired entries", removed);
        }
        removed
    }

    /// Remove a single entry; absent keys are a no-op
    pub fn delete(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        match state.entries.remove(key) {
            Some(entry) => {
                state.recency.remove(&entry.last_access);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.recency.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lifetime eviction count (size-bound victims only)
    pub fn eviction_count(&self) -> u64 {
        self.state.lock().evictions
    }

    /// Lifetime TTL expiration count (lazy reads + sweeps)
    pub fn expiration_count(&self) -> u64 {
        self.state.lock().expirations
    }
}
