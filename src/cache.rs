use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Source of the current time for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock used outside of tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
    seq: u64,
}

#[derive(Debug)]
struct CacheState<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    // insertion sequence -> key, oldest first
    order: BTreeMap<u64, K>,
    next_seq: u64,
}

impl<K: Eq + Hash + Clone, V> CacheState<K, V> {
    fn remove(&mut self, key: &K) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.seq);
        Some(entry)
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, entry)| now >= entry.expires_at)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    fn evict_oldest(&mut self) -> bool {
        match self.order.pop_first() {
            Some((_, key)) => {
                self.entries.remove(&key);
                true
            }
            None => false,
        }
    }
}

/// In-memory key/value store bounded by entry count and per-entry TTL.
///
/// Expired entries are dropped lazily on read and eagerly when an insert
/// would exceed capacity; after that the oldest insertions go first.
pub struct BoundedTtlCache<K, V> {
    name: &'static str,
    max_entries: usize,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState<K, V>>,
}

impl<K, V> BoundedTtlCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    /// Creates a cache on the system clock. A capacity of zero is treated as one.
    #[must_use]
    pub fn new(name: &'static str, max_entries: usize) -> Self {
        Self::with_clock(name, max_entries, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(name: &'static str, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            max_entries: max_entries.max(1),
            clock,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                next_seq: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<K, V>> {
        // The state is never left half-updated, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Retrieves a value if it exists and has not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut state = self.lock();

        let expired = match state.entries.get(key) {
            Some(entry) if now < entry.expires_at => {
                tracing::debug!(cache = self.name, ?key, "Key found and still fresh");
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            tracing::debug!(cache = self.name, ?key, "Key found but expired");
            state.remove(key);
        } else {
            tracing::debug!(cache = self.name, ?key, "Key not found");
        }
        None
    }

    /// Stores a value with a time-to-live. A zero TTL stores nothing.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        if ttl.is_zero() {
            tracing::debug!(cache = self.name, ?key, "Skipping insert with zero TTL");
            return;
        }
        let now = self.clock.now();
        let Some(expires_at) = now.checked_add(ttl) else {
            tracing::warn!(cache = self.name, ?key, "TTL overflow, skipping insert");
            return;
        };

        let mut state = self.lock();
        state.remove(&key);

        if state.entries.len() >= self.max_entries {
            let purged = state.purge_expired(now);
            let mut evicted = 0;
            while state.entries.len() >= self.max_entries && state.evict_oldest() {
                evicted += 1;
            }
            tracing::debug!(cache = self.name, purged, evicted, "Made room in cache");
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.order.insert(seq, key.clone());
        state.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at,
                seq,
            },
        );
    }

    /// Manually removes a key from the cache.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.lock().remove(key).map(|entry| entry.value)
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        self.lock().purge_expired(now)
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.max_entries
    }
}
