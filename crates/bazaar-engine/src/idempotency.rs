//! Idempotency cache for request deduplication.
//!
//! A client may attach an idempotency key to any mutating request. The first
//! request with a key runs; a retry with the same key and the same payload
//! gets the stored response without running again. Reusing a key for a
//! different payload, or while the first request is still running, is
//! refused.
//!
//! Completed entries expire after the configured TTL. When the cache is
//! full, expired entries are evicted first, then the oldest completed one.
//! A request still in progress is never evicted; if every slot is in
//! progress, new keys are refused until one finishes.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use crate::config::IdempotencyConfig;
use crate::error::Result;

/// Content hash of a request payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint(blake3::Hash);

impl Fingerprint {
    /// Hashes the canonical JSON form of `payload`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn of<T: Serialize>(payload: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(payload)?;
        Ok(Self(blake3::hash(&bytes)))
    }
}

/// What to do with an incoming keyed request.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission<V> {
    /// First sighting; run the request and call [`IdempotencyCache::finish`].
    Fresh,
    /// Same key and payload already completed; return this.
    Replay(V),
    /// The key cannot be used for this request.
    Conflict(&'static str),
}

#[derive(Debug, Clone)]
enum Slot<V> {
    InFlight,
    Done(V),
}

#[derive(Debug, Clone)]
struct Entry<V> {
    fingerprint: Fingerprint,
    slot: Slot<V>,
    inserted_at: Instant,
}

impl<V> Entry<V> {
    fn is_live(&self, ttl: Duration) -> bool {
        matches!(self.slot, Slot::InFlight) || self.inserted_at.elapsed() < ttl
    }
}

/// Bounded cache of responses by idempotency key.
#[derive(Debug)]
pub struct IdempotencyCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    capacity: usize,
    ttl: Duration,
}

impl<V: Clone> IdempotencyCache<V> {
    /// Creates a cache with the given limits.
    #[must_use]
    pub fn new(config: IdempotencyConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: config.capacity.max(1),
            ttl: config.ttl(),
        }
    }

    /// Claims `key` for a request with `fingerprint`.
    pub fn begin(&self, key: &str, fingerprint: Fingerprint) -> Admission<V> {
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get(key) {
            if entry.is_live(self.ttl) {
                if entry.fingerprint != fingerprint {
                    return Admission::Conflict("idempotency key was used for a different request");
                }
                return match &entry.slot {
                    Slot::InFlight => {
                        Admission::Conflict("a request with this idempotency key is in progress")
                    }
                    Slot::Done(response) => Admission::Replay(response.clone()),
                };
            }
        }

        if entries.len() >= self.capacity
            && !entries.contains_key(key)
            && !self.evict(&mut entries)
        {
            return Admission::Conflict("too many requests in progress");
        }
        entries.insert(
            key.to_string(),
            Entry {
                fingerprint,
                slot: Slot::InFlight,
                inserted_at: Instant::now(),
            },
        );
        Admission::Fresh
    }

    /// Stores the response of a request admitted with [`Admission::Fresh`].
    pub fn finish(&self, key: &str, fingerprint: Fingerprint, response: V) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(key) {
            if entry.fingerprint == fingerprint {
                entry.slot = Slot::Done(response);
            }
        }
    }

    /// Releases a key so the request can be retried.
    pub fn abandon(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    /// Number of remembered keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if no keys are remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Frees one slot. Returns false if every entry is still in progress.
    fn evict(&self, entries: &mut HashMap<String, Entry<V>>) -> bool {
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.is_live(ttl));
        if entries.len() < self.capacity {
            return true;
        }

        let oldest = entries
            .iter()
            .filter(|(_, entry)| matches!(entry.slot, Slot::Done(_)))
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(key, _)| key.clone());
        match oldest {
            Some(key) => {
                entries.remove(&key);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize, ttl_secs: u64) -> IdempotencyCache<String> {
        IdempotencyCache::new(IdempotencyConfig { capacity, ttl_secs })
    }

    fn fp(payload: &str) -> Fingerprint {
        Fingerprint::of(&payload).expect("fingerprint")
    }

    #[test]
    fn first_request_is_fresh_then_replayed() {
        let cache = cache(10, 300);
        assert_eq!(cache.begin("k1", fp("a")), Admission::Fresh);
        cache.finish("k1", fp("a"), "done".to_string());

        assert_eq!(
            cache.begin("k1", fp("a")),
            Admission::Replay("done".to_string())
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn different_payload_conflicts() {
        let cache = cache(10, 300);
        assert_eq!(cache.begin("k1", fp("a")), Admission::Fresh);
        cache.finish("k1", fp("a"), "done".to_string());
        assert!(matches!(cache.begin("k1", fp("b")), Admission::Conflict(_)));
    }

    #[test]
    fn in_flight_request_conflicts() {
        let cache = cache(10, 300);
        assert_eq!(cache.begin("k1", fp("a")), Admission::Fresh);
        assert!(matches!(cache.begin("k1", fp("a")), Admission::Conflict(_)));
    }

    #[test]
    fn abandoned_key_can_be_reused() {
        let cache = cache(10, 300);
        assert_eq!(cache.begin("k1", fp("a")), Admission::Fresh);
        cache.abandon("k1");
        assert!(cache.is_empty());
        assert_eq!(cache.begin("k1", fp("a")), Admission::Fresh);
    }

    #[test]
    fn expired_entries_are_forgotten() {
        let cache = cache(10, 0);
        assert_eq!(cache.begin("k1", fp("a")), Admission::Fresh);
        cache.finish("k1", fp("a"), "done".to_string());
        assert_eq!(cache.begin("k1", fp("b")), Admission::Fresh);
    }

    #[test]
    fn full_cache_stays_bounded() {
        let cache = cache(2, 300);
        for key in ["k1", "k2", "k3"] {
            assert_eq!(cache.begin(key, fp(key)), Admission::Fresh);
            cache.finish(key, fp(key), key.to_string());
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(
            cache.begin("k3", fp("k3")),
            Admission::Replay("k3".to_string())
        );
    }

    #[test]
    fn full_cache_keeps_requests_in_progress() {
        let cache = cache(1, 300);
        assert_eq!(cache.begin("a", fp("a")), Admission::Fresh);

        assert!(matches!(cache.begin("b", fp("b")), Admission::Conflict(_)));
        assert!(matches!(cache.begin("a", fp("a")), Admission::Conflict(_)));

        cache.finish("a", fp("a"), "done".to_string());
        assert_eq!(cache.begin("b", fp("b")), Admission::Fresh);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn eviction_skips_requests_in_progress() {
        let cache = cache(2, 300);
        assert_eq!(cache.begin("running", fp("running")), Admission::Fresh);
        assert_eq!(cache.begin("done", fp("done")), Admission::Fresh);
        cache.finish("done", fp("done"), "done".to_string());

        assert_eq!(cache.begin("next", fp("next")), Admission::Fresh);
        assert!(matches!(
            cache.begin("running", fp("running")),
            Admission::Conflict(_)
        ));
        assert_eq!(
            cache.begin("done", fp("done")),
            Admission::Conflict("too many requests in progress")
        );
    }

    #[test]
    fn in_flight_entries_outlive_ttl() {
        let cache = cache(10, 0);
        assert_eq!(cache.begin("k1", fp("a")), Admission::Fresh);
        assert!(matches!(cache.begin("k1", fp("a")), Admission::Conflict(_)));
    }

    #[test]
    fn fingerprint_is_deterministic() {
        assert_eq!(fp("payload"), fp("payload"));
        assert_ne!(fp("payload"), fp("other"));
    }
}
