use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{CasinoError, Result};
use crate::types::{UserId, current_timestamp};

pub const MAX_KEY_LEN: usize = 255;

/// How long a stored result answers replays
pub const DEFAULT_TTL_MS: u64 = 24 * 60 * 60 * 1000;

struct Stored<T> {
    fingerprint: String,
    result: T,
    stored_at: u64,
}

type Slot<T> = Arc<Mutex<Option<Stored<T>>>>;
type SlotKey = (UserId, String);

struct Slots<T> {
    map: HashMap<SlotKey, Slot<T>>,
    last_sweep: u64,
}

/// Remembers the receipt produced under each (user, key) pair.
///
/// One cache exists per operation family, so the same key may be reused
/// across families. Only successful results are stored; a failed call leaves
/// the key free for a retry. Results expire after the cache's TTL.
pub struct IdempotencyCache<T> {
    slots: Mutex<Slots<T>>,
    ttl_ms: u64,
}

impl<T> Default for IdempotencyCache<T> {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_TTL_MS)
    }
}

pub fn fingerprint<R: Serialize>(request: &R) -> Result<String> {
    let bytes = serde_json::to_vec(request)
        .map_err(|e| CasinoError::Storage(format!("cannot fingerprint request: {e}")))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

impl<T> IdempotencyCache<T> {
    pub fn with_ttl(ttl_ms: u64) -> Self {
        Self {
            slots: Mutex::new(Slots {
                map: HashMap::new(),
                last_sweep: current_timestamp(),
            }),
            ttl_ms,
        }
    }

    fn is_live(&self, stored: &Stored<T>, now: u64) -> bool {
        now.saturating_sub(stored.stored_at) <= self.ttl_ms
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        lock(&self.slots).map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops expired results. Slots another caller holds are left alone.
    fn sweep(&self, slots: &mut Slots<T>, now: u64) {
        let before = slots.map.len();
        // Clones are only taken under the map lock, so a count of one means nobody else has it
        slots.map.retain(|_, slot| {
            Arc::strong_count(slot) > 1
                || lock(slot)
                    .as_ref()
                    .is_some_and(|stored| self.is_live(stored, now))
        });
        slots.last_sweep = now;
        let dropped = before - slots.map.len();
        if dropped > 0 {
            tracing::debug!(dropped, "expired idempotency keys");
        }
    }

    /// Forgets an empty slot after a failed call unless another caller is waiting on it
    fn release(&self, key: &SlotKey, slot: &Slot<T>) {
        let mut slots = lock(&self.slots);
        let unshared = Arc::strong_count(slot) == 2
            && slots.map.get(key).is_some_and(|s| Arc::ptr_eq(s, slot));
        if unshared && lock(slot).is_none() {
            slots.map.remove(key);
        }
    }
}

impl<T: Clone> IdempotencyCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` at most once per key. Replays of the same request get the
    /// stored result; a different request under a used key is a conflict.
    pub fn run<R, F>(&self, user_id: UserId, key: Option<&str>, request: &R, f: F) -> Result<T>
    where
        R: Serialize,
        F: FnOnce() -> Result<T>,
    {
        let Some(key) = key else {
            return f();
        };
        if key.is_empty() || key.len() > MAX_KEY_LEN {
            return Err(CasinoError::validation(format!(
                "Idempotency key must be 1 to {MAX_KEY_LEN} characters"
            )));
        }

        let fingerprint = fingerprint(request)?;
        let slot_key = (user_id, key.to_string());
        let slot = {
            let now = current_timestamp();
            let mut slots = lock(&self.slots);
            if now.saturating_sub(slots.last_sweep) >= self.ttl_ms {
                self.sweep(&mut slots, now);
            }
            slots.map.entry(slot_key.clone()).or_default().clone()
        };

        // Held across `f` so concurrent replays wait for the first caller
        let mut guard = lock(&slot);
        if let Some(stored) = guard.as_ref() {
            if self.is_live(stored, current_timestamp()) {
                if stored.fingerprint != fingerprint {
                    return Err(CasinoError::IdempotencyConflict);
                }
                tracing::debug!(user_id, key, "idempotent replay");
                return Ok(stored.result.clone());
            }
        }

        match f() {
            Ok(result) => {
                *guard = Some(Stored {
                    fingerprint,
                    result: result.clone(),
                    stored_at: current_timestamp(),
                });
                Ok(result)
            }
            Err(e) => {
                // Clears an expired result so the slot can be released
                *guard = None;
                drop(guard);
                self.release(&slot_key, &slot);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_without_key_always_runs() {
        let cache: IdempotencyCache<u32> = IdempotencyCache::new();
        let calls = AtomicU32::new(0);
        for _ in 0..3 {
            cache
                .run(1, None, &"req", || Ok(calls.fetch_add(1, Ordering::SeqCst)))
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_replay_returns_first_result() {
        let cache: IdempotencyCache<u32> = IdempotencyCache::new();
        let first = cache.run(1, Some("k"), &"req", || Ok(7)).unwrap();
        let second = cache.run(1, Some("k"), &"req", || Ok(8)).unwrap();
        assert_eq!(first, 7);
        assert_eq!(second, 7);
    }

    #[test]
    fn test_different_request_same_key_conflicts() {
        let cache: IdempotencyCache<u32> = IdempotencyCache::new();
        cache.run(1, Some("k"), &"a", || Ok(1)).unwrap();
        assert_eq!(
            cache.run(1, Some("k"), &"b", || Ok(2)),
            Err(CasinoError::IdempotencyConflict)
        );
    }

    #[test]
    fn test_keys_are_scoped_per_user() {
        let cache: IdempotencyCache<u32> = IdempotencyCache::new();
        assert_eq!(cache.run(1, Some("k"), &"a", || Ok(1)).unwrap(), 1);
        assert_eq!(cache.run(2, Some("k"), &"a", || Ok(2)).unwrap(), 2);
    }

    #[test]
    fn test_failure_leaves_key_free() {
        let cache: IdempotencyCache<u32> = IdempotencyCache::new();
        let failed = cache.run(1, Some("k"), &"a", || Err(CasinoError::validation("nope")));
        assert!(failed.is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.run(1, Some("k"), &"a", || Ok(3)).unwrap(), 3);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_result_runs_again() {
        let cache: IdempotencyCache<u32> = IdempotencyCache::with_ttl(5);
        assert_eq!(cache.run(1, Some("k"), &"a", || Ok(1)).unwrap(), 1);
        thread::sleep(Duration::from_millis(20));

        // Past the TTL the key is free, even for a different request
        assert_eq!(cache.run(1, Some("k"), &"b", || Ok(2)).unwrap(), 2);
    }

    #[test]
    fn test_expired_keys_are_swept() {
        let cache: IdempotencyCache<u32> = IdempotencyCache::with_ttl(100);
        cache.run(1, Some("old-1"), &"a", || Ok(1)).unwrap();
        cache.run(1, Some("old-2"), &"a", || Ok(2)).unwrap();
        assert_eq!(cache.len(), 2);
        thread::sleep(Duration::from_millis(250));

        cache.run(1, Some("new"), &"a", || Ok(3)).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_rejects_bad_keys() {
        let cache: IdempotencyCache<u32> = IdempotencyCache::new();
        assert!(cache.run(1, Some(""), &"a", || Ok(1)).is_err());
        let long = "x".repeat(MAX_KEY_LEN + 1);
        assert!(cache.run(1, Some(&long), &"a", || Ok(1)).is_err());
    }

    #[test]
    fn test_concurrent_replays_run_once() {
        let cache: Arc<IdempotencyCache<u32>> = Arc::new(IdempotencyCache::new());
        let calls = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                thread::spawn(move || {
                    cache
                        .run(1, Some("same"), &"req", || {
                            Ok(calls.fetch_add(1, Ordering::SeqCst))
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 0);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
