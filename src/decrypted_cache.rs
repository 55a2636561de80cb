//! TTL cache over decrypted PGP key material (§4.8).
//!
//! Keyed by `keyId`; values are immutable once inserted (the cache never
//! mutates a `DecryptedKey` in place — rotation/deletion always goes
//! through `invalidate`). Lazily evicts on read, matching the JWKS cache's
//! debounce-via-atomic-flag shape for the optional single-flight around a
//! cold-start decryption.
//!
//! Generic over the cached value type so this module stays independent of
//! the `pgp` crate; [`crate::signer`] instantiates it with
//! `Arc<pgp::composed::SignedSecretKey>`.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

pub struct DecryptedKeyCache<V> {
    entries: DashMap<String, Entry<V>>,
    ttl: Duration,
    in_flight: DashMap<String, Arc<AtomicBool>>,
}

pub struct CacheStats {
    pub size: usize,
    pub ttl: Duration,
}

impl<V: Clone> DecryptedKeyCache<V> {
    pub fn new(ttl: Duration) -> Self {
        DecryptedKeyCache {
            entries: DashMap::new(),
            ttl,
            in_flight: DashMap::new(),
        }
    }

    pub fn get(&self, key_id: &str) -> Option<V> {
        if let Some(entry) = self.entries.get(key_id) {
            if entry.expires_at > Instant::now() {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove(key_id);
        None
    }

    pub fn set(&self, key_id: &str, value: V) {
        self.entries.insert(
            key_id.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn invalidate(&self, key_id: &str) {
        self.entries.remove(key_id);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
        CacheStats {
            size: self.entries.len(),
            ttl: self.ttl,
        }
    }

    /// Marks `key_id` as "a decryption is in flight"; returns `true` if the
    /// caller won the race and should perform the decryption, `false` if
    /// another thread already claimed it (the caller should then retry
    /// `get` instead of decrypting again).
    pub fn claim_decrypt(&self, key_id: &str) -> bool {
        let flag = self
            .in_flight
            .entry(key_id.to_string())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone();
        !flag.swap(true, Ordering::SeqCst)
    }

    pub fn release_decrypt(&self, key_id: &str) {
        if let Some(flag) = self.in_flight.get(key_id) {
            flag.store(false, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_retrieves_within_ttl() {
        let cache: DecryptedKeyCache<Arc<str>> = DecryptedKeyCache::new(Duration::from_secs(60));
        cache.set("A1B2C3D4E5F60718", Arc::from("decrypted-key-material"));
        assert!(cache.get("A1B2C3D4E5F60718").is_some());
    }

    #[test]
    fn expired_entries_are_evicted_on_read() {
        let cache: DecryptedKeyCache<Arc<str>> = DecryptedKeyCache::new(Duration::from_millis(1));
        cache.set("A1B2C3D4E5F60718", Arc::from("decrypted-key-material"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("A1B2C3D4E5F60718").is_none());
    }

    #[test]
    fn invalidate_removes_single_entry() {
        let cache: DecryptedKeyCache<Arc<str>> = DecryptedKeyCache::new(Duration::from_secs(60));
        cache.set("A1B2C3D4E5F60718", Arc::from("decrypted-key-material"));
        cache.invalidate("A1B2C3D4E5F60718");
        assert!(cache.get("A1B2C3D4E5F60718").is_none());
    }

    #[test]
    fn clear_purges_every_entry() {
        let cache: DecryptedKeyCache<Arc<str>> = DecryptedKeyCache::new(Duration::from_secs(60));
        cache.set("A1B2C3D4E5F60718", Arc::from("a"));
        cache.set("FEDCBA9876543210", Arc::from("b"));
        cache.clear();
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn stats_prunes_expired_before_counting() {
        let cache: DecryptedKeyCache<Arc<str>> = DecryptedKeyCache::new(Duration::from_millis(1));
        cache.set("A1B2C3D4E5F60718", Arc::from("decrypted-key-material"));
        std::thread::sleep(Duration::from_millis(5));
        let stats = cache.stats();
        assert_eq!(stats.size, 0);
    }

    #[test]
    fn claim_decrypt_only_lets_one_winner_through() {
        let cache: DecryptedKeyCache<Arc<str>> = DecryptedKeyCache::new(Duration::from_secs(60));
        assert!(cache.claim_decrypt("A1B2C3D4E5F60718"));
        assert!(!cache.claim_decrypt("A1B2C3D4E5F60718"));
        cache.release_decrypt("A1B2C3D4E5F60718");
        assert!(cache.claim_decrypt("A1B2C3D4E5F60718"));
    }
}
