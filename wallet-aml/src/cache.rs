//! Time-bounded cache of screening results keyed by address.
//!
//! Entries live for a fixed TTL (6 hours unless the host configures otherwise
//! at construction). Expired entries read as absent and are evicted lazily on
//! access or by [`ScreeningCache::cleanup_expired`]; until then they still count
//! towards [`ScreeningCache::size`] and [`ScreeningCache::keys`].
//!
//! There is no capacity bound: growth is limited only by TTL eviction.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::errors::{AmlError, AmlResult};
use crate::risk::ScreeningResult;
use crate::store::NamespacedStore;

/// Default lifetime of a cached screening result.
pub const SCREENING_CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub result: ScreeningResult,
    pub stored_at: i64,
}

/// Backing storage for [`ScreeningCache`].
pub trait CacheStorage: Send + Sync + fmt::Debug {
    fn load(&self, address: &str) -> AmlResult<Option<CacheEntry>>;
    /// Write `entry`; `ttl` is the cache lifetime, for backends with native expiry.
    fn store(&self, address: &str, entry: CacheEntry, ttl: Duration) -> AmlResult<()>;
    fn remove(&self, address: &str) -> AmlResult<bool>;
    /// Remove the entry only if it is still the one written at `stored_at`.
    fn remove_if_stored_at(&self, address: &str, stored_at: i64) -> AmlResult<bool>;
    fn clear(&self) -> AmlResult<()>;
    fn len(&self) -> AmlResult<usize>;
    fn keys(&self) -> AmlResult<Vec<String>>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStorage for MemoryStorage {
    fn load(&self, address: &str) -> AmlResult<Option<CacheEntry>> {
        Ok(self.entries.read().get(address).cloned())
    }

    fn store(&self, address: &str, entry: CacheEntry, _ttl: Duration) -> AmlResult<()> {
        self.entries.write().insert(address.to_string(), entry);
        Ok(())
    }

    fn remove(&self, address: &str) -> AmlResult<bool> {
        Ok(self.entries.write().remove(address).is_some())
    }

    fn remove_if_stored_at(&self, address: &str, stored_at: i64) -> AmlResult<bool> {
        let mut entries = self.entries.write();
        match entries.get(address) {
            Some(entry) if entry.stored_at == stored_at => {
                entries.remove(address);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn clear(&self) -> AmlResult<()> {
        self.entries.write().clear();
        Ok(())
    }

    fn len(&self) -> AmlResult<usize> {
        Ok(self.entries.read().len())
    }

    fn keys(&self) -> AmlResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}

/// Cache entries serialized as JSON into a namespaced key-value store.
///
/// Keys expire in the store after the cache TTL. Writes from this process are
/// serialized so a conditional remove cannot drop a concurrent rewrite.
#[derive(Debug)]
pub struct KeyValueStorage {
    store: Arc<NamespacedStore>,
    writes: Mutex<()>,
}

impl KeyValueStorage {
    pub fn new(store: Arc<NamespacedStore>) -> Self {
        Self {
            store,
            writes: Mutex::new(()),
        }
    }
}

impl CacheStorage for KeyValueStorage {
    fn load(&self, address: &str) -> AmlResult<Option<CacheEntry>> {
        match self.store.get(address) {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn store(&self, address: &str, entry: CacheEntry, ttl: Duration) -> AmlResult<()> {
        let raw = serde_json::to_string(&entry)?;
        let _guard = self.writes.lock();
        if self.store.set(address, &raw, Some(ttl)) {
            Ok(())
        } else {
            Err(AmlError::CacheUnavailable(format!(
                "could not write {} to store",
                address
            )))
        }
    }

    fn remove(&self, address: &str) -> AmlResult<bool> {
        let _guard = self.writes.lock();
        Ok(self.store.delete(address))
    }

    fn remove_if_stored_at(&self, address: &str, stored_at: i64) -> AmlResult<bool> {
        let _guard = self.writes.lock();
        match self.load(address)? {
            Some(entry) if entry.stored_at == stored_at => Ok(self.store.delete(address)),
            _ => Ok(false),
        }
    }

    fn clear(&self) -> AmlResult<()> {
        let _guard = self.writes.lock();
        if self.store.flush_all() {
            Ok(())
        } else {
            Err(AmlError::CacheUnavailable("could not flush store".to_string()))
        }
    }

    fn len(&self) -> AmlResult<usize> {
        Ok(self.store.keys("*").len())
    }

    fn keys(&self) -> AmlResult<Vec<String>> {
        Ok(self.store.keys("*"))
    }
}

/// TTL cache in front of a [`CacheStorage`].
///
/// Storage failures never escape: reads degrade to misses and writes are
/// dropped with a warning.
#[derive(Debug, Clone)]
pub struct ScreeningCache {
    storage: Arc<dyn CacheStorage>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ScreeningCache {
    pub fn new(storage: Arc<dyn CacheStorage>, clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(storage, clock, SCREENING_CACHE_TTL)
    }

    pub fn with_ttl(storage: Arc<dyn CacheStorage>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            storage,
            ttl,
            clock,
        }
    }

    /// In-memory cache on the system clock.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()), Arc::new(SystemClock))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_expired(&self, entry: &CacheEntry, now: i64) -> bool {
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        now.saturating_sub(entry.stored_at) >= ttl_ms
    }

    /// Live result for `address`, if any.
    pub fn get(&self, address: &str) -> Option<ScreeningResult> {
        let entry = match self.storage.load(address) {
            Ok(entry) => entry?,
            Err(e) => {
                log::warn!("Screening cache read failed for {}: {}", address, e);
                return None;
            }
        };

        if self.is_expired(&entry, self.clock.now_millis()) {
            log::debug!("Screening cache entry for {} expired", address);
            // A concurrent rewrite carries a newer stored_at and survives.
            if let Err(e) = self.storage.remove_if_stored_at(address, entry.stored_at) {
                log::warn!("Could not evict expired entry for {}: {}", address, e);
            }
            return None;
        }

        Some(entry.result)
    }

    /// Insert or overwrite the entry for `address`, stamped with the current time.
    pub fn set(&self, address: &str, result: ScreeningResult) {
        let entry = CacheEntry {
            result,
            stored_at: self.clock.now_millis(),
        };
        if let Err(e) = self.storage.store(address, entry, self.ttl) {
            log::warn!("Screening cache write failed for {}: {}", address, e);
        }
    }

    pub fn delete(&self, address: &str) -> bool {
        match self.storage.remove(address) {
            Ok(removed) => removed,
            Err(e) => {
                log::warn!("Screening cache delete failed for {}: {}", address, e);
                false
            }
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.storage.clear() {
            log::warn!("Screening cache clear failed: {}", e);
        }
    }

    /// Stored entries, expired ones included until evicted.
    pub fn size(&self) -> usize {
        self.storage.len().unwrap_or_else(|e| {
            log::warn!("Screening cache size unavailable: {}", e);
            0
        })
    }

    /// Stored addresses, expired ones included until evicted.
    pub fn keys(&self) -> Vec<String> {
        self.storage.keys().unwrap_or_else(|e| {
            log::warn!("Screening cache keys unavailable: {}", e);
            Vec::new()
        })
    }

    /// Physically remove expired entries, returning how many went.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let mut removed = 0;
        for address in self.keys() {
            let stale = match self.storage.load(&address) {
                Ok(Some(entry)) if self.is_expired(&entry, now) => Some(entry.stored_at),
                Ok(_) => None,
                Err(e) => {
                    log::warn!("Skipping unreadable cache entry {}: {}", address, e);
                    None
                }
            };
            let Some(stored_at) = stale else { continue };
            match self.storage.remove_if_stored_at(&address, stored_at) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => log::warn!("Could not evict expired entry for {}: {}", address, e),
            }
        }

        if removed > 0 {
            log::info!("Removed {} expired screening cache entries", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::risk::{RiskLevel, RiskRating, WalletType};
    use crate::store::MemoryStore;

    const ADDRESS: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";

    fn result(address: &str, timestamp: i64) -> ScreeningResult {
        ScreeningResult::new(
            address,
            RiskRating::new(12, RiskLevel::Low).unwrap(),
            vec!["Cold storage wallet".into()],
            timestamp,
            WalletType::Cold,
            "Mock AML Provider",
            91,
        )
    }

    fn memory_cache() -> (Arc<ManualClock>, ScreeningCache) {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = ScreeningCache::new(Arc::new(MemoryStorage::new()), clock.clone());
        (clock, cache)
    }

    #[test]
    fn set_then_get_within_ttl() {
        let (clock, cache) = memory_cache();
        cache.set(ADDRESS, result(ADDRESS, 1_000));
        clock.advance(SCREENING_CACHE_TTL - Duration::from_millis(1));
        assert_eq!(cache.get(ADDRESS), Some(result(ADDRESS, 1_000)));
    }

    #[test]
    fn entry_expires_exactly_at_ttl() {
        let (clock, cache) = memory_cache();
        cache.set(ADDRESS, result(ADDRESS, 1_000));
        clock.advance(SCREENING_CACHE_TTL);
        assert_eq!(cache.get(ADDRESS), None);
        // lazily evicted by the read
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn size_counts_expired_entries_until_evicted() {
        let (clock, cache) = memory_cache();
        cache.set(ADDRESS, result(ADDRESS, 1_000));
        cache.set("0xother", result("0xother", 1_000));
        clock.advance(SCREENING_CACHE_TTL + Duration::from_secs(1));

        assert_eq!(cache.size(), 2);
        assert_eq!(cache.keys().len(), 2);
        assert_eq!(cache.cleanup_expired(), 2);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn overwrite_refreshes_stored_at() {
        let (clock, cache) = memory_cache();
        cache.set(ADDRESS, result(ADDRESS, 1_000));
        clock.advance(Duration::from_secs(5 * 60 * 60));
        cache.set(ADDRESS, result(ADDRESS, 2_000));
        clock.advance(Duration::from_secs(2 * 60 * 60));
        assert_eq!(cache.get(ADDRESS).map(|r| r.timestamp()), Some(2_000));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn delete_and_clear() {
        let (_clock, cache) = memory_cache();
        cache.set(ADDRESS, result(ADDRESS, 1_000));
        assert!(cache.delete(ADDRESS));
        assert!(!cache.delete(ADDRESS));

        cache.set(ADDRESS, result(ADDRESS, 1_000));
        cache.set("0xother", result("0xother", 1_000));
        cache.clear();
        assert_eq!(cache.size(), 0);
        assert!(cache.keys().is_empty());
    }

    #[test]
    fn cleanup_keeps_live_entries() {
        let (clock, cache) = memory_cache();
        cache.set("0xold", result("0xold", 1_000));
        clock.advance(Duration::from_secs(4 * 60 * 60));
        cache.set(ADDRESS, result(ADDRESS, 2_000));
        clock.advance(Duration::from_secs(3 * 60 * 60));

        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.keys(), vec![ADDRESS.to_string()]);
    }

    #[test]
    fn key_value_storage_behaves_like_memory() {
        let clock = Arc::new(ManualClock::new(1_000));
        let backend = Arc::new(MemoryStore::with_clock(clock.clone()));
        let store = Arc::new(NamespacedStore::new(
            backend,
            "test:aml:",
            SCREENING_CACHE_TTL,
        ));
        let cache = ScreeningCache::new(Arc::new(KeyValueStorage::new(store)), clock.clone());

        cache.set(ADDRESS, result(ADDRESS, 1_000));
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.keys(), vec![ADDRESS.to_string()]);
        assert_eq!(cache.get(ADDRESS), Some(result(ADDRESS, 1_000)));

        clock.advance(SCREENING_CACHE_TTL);
        assert_eq!(cache.get(ADDRESS), None);
        assert!(!cache.delete(ADDRESS));
    }

    #[test]
    fn store_outage_degrades_to_misses() {
        let clock = Arc::new(ManualClock::new(1_000));
        let backend = Arc::new(MemoryStore::with_clock(clock.clone()));
        let store = Arc::new(NamespacedStore::new(
            backend.clone(),
            "test:aml:",
            SCREENING_CACHE_TTL,
        ));
        let cache = ScreeningCache::new(Arc::new(KeyValueStorage::new(store)), clock);

        cache.set(ADDRESS, result(ADDRESS, 1_000));
        backend.set_available(false);
        assert_eq!(cache.get(ADDRESS), None);
        cache.set("0xother", result("0xother", 1_000));
        assert_eq!(cache.size(), 0);
        cache.clear();

        backend.set_available(true);
        assert_eq!(cache.get(ADDRESS), Some(result(ADDRESS, 1_000)));
        assert_eq!(cache.get("0xother"), None);
    }

    #[test]
    fn store_keys_live_for_the_cache_ttl() {
        let clock = Arc::new(ManualClock::new(1_000));
        let backend = Arc::new(MemoryStore::with_clock(clock.clone()));
        // namespace default is shorter than the cache TTL
        let store = Arc::new(NamespacedStore::new(
            backend,
            "dev:aml:",
            Duration::from_secs(60 * 60),
        ));
        let cache = ScreeningCache::new(Arc::new(KeyValueStorage::new(store)), clock.clone());

        cache.set(ADDRESS, result(ADDRESS, 1_000));
        clock.advance(Duration::from_secs(2 * 60 * 60));
        assert_eq!(cache.get(ADDRESS), Some(result(ADDRESS, 1_000)));

        clock.advance(Duration::from_secs(4 * 60 * 60));
        assert_eq!(cache.get(ADDRESS), None);
    }

    type AfterLoad = Box<dyn FnOnce(&MemoryStorage) + Send>;

    /// Memory storage that runs a hook once, right after a load returns.
    struct InterleavedStorage {
        inner: MemoryStorage,
        after_load: Mutex<Option<AfterLoad>>,
    }

    impl InterleavedStorage {
        fn new() -> Self {
            Self {
                inner: MemoryStorage::new(),
                after_load: Mutex::new(None),
            }
        }

        fn after_next_load(&self, hook: AfterLoad) {
            *self.after_load.lock() = Some(hook);
        }
    }

    impl fmt::Debug for InterleavedStorage {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("InterleavedStorage").finish()
        }
    }

    impl CacheStorage for InterleavedStorage {
        fn load(&self, address: &str) -> AmlResult<Option<CacheEntry>> {
            let loaded = self.inner.load(address);
            let hook = self.after_load.lock().take();
            if let Some(hook) = hook {
                hook(&self.inner);
            }
            loaded
        }

        fn store(&self, address: &str, entry: CacheEntry, ttl: Duration) -> AmlResult<()> {
            self.inner.store(address, entry, ttl)
        }

        fn remove(&self, address: &str) -> AmlResult<bool> {
            self.inner.remove(address)
        }

        fn remove_if_stored_at(&self, address: &str, stored_at: i64) -> AmlResult<bool> {
            self.inner.remove_if_stored_at(address, stored_at)
        }

        fn clear(&self) -> AmlResult<()> {
            self.inner.clear()
        }

        fn len(&self) -> AmlResult<usize> {
            self.inner.len()
        }

        fn keys(&self) -> AmlResult<Vec<String>> {
            self.inner.keys()
        }
    }

    fn rewrite_between_load_and_evict(clock: &ManualClock, storage: &InterleavedStorage) {
        let fresh_at = clock.now_millis();
        storage.after_next_load(Box::new(move |inner| {
            let entry = CacheEntry {
                result: result(ADDRESS, fresh_at),
                stored_at: fresh_at,
            };
            inner.store(ADDRESS, entry, SCREENING_CACHE_TTL).unwrap();
        }));
    }

    #[test]
    fn expired_read_keeps_concurrent_rewrite() {
        let clock = Arc::new(ManualClock::new(1_000));
        let storage = Arc::new(InterleavedStorage::new());
        let cache = ScreeningCache::new(storage.clone(), clock.clone());

        cache.set(ADDRESS, result(ADDRESS, 1_000));
        clock.advance(SCREENING_CACHE_TTL);
        rewrite_between_load_and_evict(&clock, &storage);

        // this reader saw the stale entry; the rewrite must survive its eviction
        assert_eq!(cache.get(ADDRESS), None);
        let fresh_at = clock.now_millis();
        assert_eq!(cache.get(ADDRESS), Some(result(ADDRESS, fresh_at)));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn cleanup_keeps_concurrent_rewrite() {
        let clock = Arc::new(ManualClock::new(1_000));
        let storage = Arc::new(InterleavedStorage::new());
        let cache = ScreeningCache::new(storage.clone(), clock.clone());

        cache.set(ADDRESS, result(ADDRESS, 1_000));
        clock.advance(SCREENING_CACHE_TTL + Duration::from_secs(1));
        rewrite_between_load_and_evict(&clock, &storage);

        assert_eq!(cache.cleanup_expired(), 0);
        assert_eq!(cache.keys(), vec![ADDRESS.to_string()]);
        assert!(cache.get(ADDRESS).is_some());
    }

    #[test]
    fn conditional_remove_checks_stored_at() {
        let storage = MemoryStorage::new();
        let entry = CacheEntry {
            result: result(ADDRESS, 1_000),
            stored_at: 1_000,
        };
        storage.store(ADDRESS, entry, SCREENING_CACHE_TTL).unwrap();

        assert!(!storage.remove_if_stored_at(ADDRESS, 999).unwrap());
        assert_eq!(storage.len().unwrap(), 1);
        assert!(storage.remove_if_stored_at(ADDRESS, 1_000).unwrap());
        assert!(!storage.remove_if_stored_at(ADDRESS, 1_000).unwrap());
    }
}
