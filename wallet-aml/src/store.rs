//! Key-value store collaborator for server deployments.
//!
//! [`KeyValueStore`] is the raw, fallible backend (Redis-shaped). [`NamespacedStore`]
//! wraps a backend with a key prefix and default TTL and never fails: errors are
//! logged and reported as `None`, `false`, empty or zero.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::errors::{AmlError, AmlResult};

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key does not exist (or has expired).
    Missing,
    /// Key exists without an expiry.
    Persistent,
    Expires(Duration),
}

pub trait KeyValueStore: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> AmlResult<Option<String>>;

    /// Store a value; `None` keeps it until deleted.
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AmlResult<()>;

    fn delete(&self, key: &str) -> AmlResult<bool>;

    fn exists(&self, key: &str) -> AmlResult<bool>;

    /// Keys matching a glob pattern (`*` and `?`).
    fn keys(&self, pattern: &str) -> AmlResult<Vec<String>>;

    fn ttl(&self, key: &str) -> AmlResult<KeyTtl>;

    fn expire(&self, key: &str, ttl: Duration) -> AmlResult<bool>;

    fn ping(&self) -> AmlResult<()>;

    fn db_size(&self) -> AmlResult<usize>;

    fn used_memory_bytes(&self) -> AmlResult<usize>;

    fn mget(&self, keys: &[String]) -> AmlResult<Vec<Option<String>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<i64>,
}

impl StoredValue {
    fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }
}

/// In-process backend with per-key expiry.
///
/// Expired keys are removed when touched by `get`, `exists` or `ttl`; until
/// then they are still listed by `keys` and counted by `db_size`.
#[derive(Debug)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredValue>>,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: while unavailable every operation fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> AmlResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AmlError::CacheUnavailable(
                "memory store marked unavailable".to_string(),
            ))
        }
    }

    /// Live value for `key`, evicting it first if it has expired.
    fn live(&self, key: &str) -> Option<StoredValue> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(stored) if stored.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(stored) => Some(stored.clone()),
            None => None,
        }
    }

    fn deadline(&self, ttl: Duration) -> i64 {
        let millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        self.clock.now_millis().saturating_add(millis)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> AmlResult<Option<String>> {
        self.ensure_available()?;
        Ok(self.live(key).map(|stored| stored.value))
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AmlResult<()> {
        self.ensure_available()?;
        let expires_at = ttl.map(|ttl| self.deadline(ttl));
        self.entries.write().insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> AmlResult<bool> {
        self.ensure_available()?;
        Ok(self.entries.write().remove(key).is_some())
    }

    fn exists(&self, key: &str) -> AmlResult<bool> {
        self.ensure_available()?;
        Ok(self.live(key).is_some())
    }

    fn keys(&self, pattern: &str) -> AmlResult<Vec<String>> {
        self.ensure_available()?;
        let mut keys: Vec<String> = self
            .entries
            .read()
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn ttl(&self, key: &str) -> AmlResult<KeyTtl> {
        self.ensure_available()?;
        let now = self.clock.now_millis();
        Ok(match self.live(key) {
            None => KeyTtl::Missing,
            Some(StoredValue {
                expires_at: None, ..
            }) => KeyTtl::Persistent,
            Some(StoredValue {
                expires_at: Some(at),
                ..
            }) => KeyTtl::Expires(Duration::from_millis((at - now).max(0) as u64)),
        })
    }

    fn expire(&self, key: &str, ttl: Duration) -> AmlResult<bool> {
        self.ensure_available()?;
        let deadline = self.deadline(ttl);
        let mut entries = self.entries.write();
        match entries.get_mut(key) {
            Some(stored) => {
                stored.expires_at = Some(deadline);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn ping(&self) -> AmlResult<()> {
        self.ensure_available()
    }

    fn db_size(&self) -> AmlResult<usize> {
        self.ensure_available()?;
        Ok(self.entries.read().len())
    }

    fn used_memory_bytes(&self) -> AmlResult<usize> {
        self.ensure_available()?;
        Ok(self
            .entries
            .read()
            .iter()
            .map(|(key, stored)| key.len() + stored.value.len())
            .sum())
    }
}

/// Store statistics as reported by [`NamespacedStore::stats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_keys: usize,
    pub memory_usage: String,
    pub hit_rate: f64,
}

/// Prefix-scoped, non-failing view over a [`KeyValueStore`].
#[derive(Debug)]
pub struct NamespacedStore {
    backend: Arc<dyn KeyValueStore>,
    prefix: String,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl NamespacedStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, prefix: impl Into<String>, default_ttl: Duration) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn strip<'a>(&self, full_key: &'a str) -> &'a str {
        full_key.strip_prefix(self.prefix.as_str()).unwrap_or(full_key)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match self.backend.get(&self.full_key(key)) {
            Ok(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                log::error!("Store GET error for {}: {}", key, e);
                None
            }
        }
    }

    /// Store with the given TTL, or the namespace default.
    pub fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> bool {
        let expiry = ttl.unwrap_or(self.default_ttl);
        match self.backend.set(&self.full_key(key), value, Some(expiry)) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Store SET error for {}: {}", key, e);
                false
            }
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        match self.backend.delete(&self.full_key(key)) {
            Ok(removed) => removed,
            Err(e) => {
                log::error!("Store DEL error for {}: {}", key, e);
                false
            }
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        match self.backend.exists(&self.full_key(key)) {
            Ok(found) => found,
            Err(e) => {
                log::error!("Store EXISTS error for {}: {}", key, e);
                false
            }
        }
    }

    /// Keys in this namespace matching `pattern`, with the prefix removed.
    pub fn keys(&self, pattern: &str) -> Vec<String> {
        match self.backend.keys(&self.full_key(pattern)) {
            Ok(keys) => keys.iter().map(|key| self.strip(key).to_string()).collect(),
            Err(e) => {
                log::error!("Store KEYS error for {}: {}", pattern, e);
                Vec::new()
            }
        }
    }

    pub fn mget(&self, keys: &[String]) -> Vec<Option<String>> {
        let full_keys: Vec<String> = keys.iter().map(|key| self.full_key(key)).collect();
        match self.backend.mget(&full_keys) {
            Ok(values) => values,
            Err(e) => {
                log::error!("Store MGET error: {}", e);
                Vec::new()
            }
        }
    }

    pub fn mset(&self, pairs: &[(String, String)], ttl: Option<Duration>) -> bool {
        let expiry = ttl.unwrap_or(self.default_ttl);
        for (key, value) in pairs {
            if let Err(e) = self.backend.set(&self.full_key(key), value, Some(expiry)) {
                log::error!("Store MSET error for {}: {}", key, e);
                return false;
            }
        }
        true
    }

    /// Remove every key in this namespace.
    pub fn flush_all(&self) -> bool {
        let keys = match self.backend.keys(&self.full_key("*")) {
            Ok(keys) => keys,
            Err(e) => {
                log::error!("Store FLUSH error: {}", e);
                return false;
            }
        };

        for key in keys {
            if let Err(e) = self.backend.delete(&key) {
                log::error!("Store FLUSH error for {}: {}", key, e);
                return false;
            }
        }
        true
    }

    pub fn ping(&self) -> bool {
        match self.backend.ping() {
            Ok(()) => true,
            Err(e) => {
                log::error!("Store PING error: {}", e);
                false
            }
        }
    }

    pub fn stats(&self) -> StoreStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let hit_rate = if hits + misses == 0 {
            0.0
        } else {
            hits as f64 / (hits + misses) as f64
        };

        let sizes = self
            .backend
            .db_size()
            .and_then(|keys| Ok((keys, self.backend.used_memory_bytes()?)));
        match sizes {
            Ok((total_keys, bytes)) => StoreStats {
                total_keys,
                memory_usage: format_bytes(bytes),
                hit_rate,
            },
            Err(e) => {
                log::error!("Store STATS error: {}", e);
                StoreStats {
                    total_keys: 0,
                    memory_usage: "0B".to_string(),
                    hit_rate,
                }
            }
        }
    }

    /// Give persistent keys the default TTL and count keys that had expired.
    pub fn cleanup(&self) -> usize {
        let keys = match self.backend.keys(&self.full_key("*")) {
            Ok(keys) => keys,
            Err(e) => {
                log::error!("Store CLEANUP error: {}", e);
                return 0;
            }
        };

        let mut expired = 0;
        for key in keys {
            match self.backend.ttl(&key) {
                Ok(KeyTtl::Persistent) => {
                    if let Err(e) = self.backend.expire(&key, self.default_ttl) {
                        log::warn!("Store CLEANUP could not expire {}: {}", key, e);
                    }
                }
                Ok(KeyTtl::Missing) => expired += 1,
                Ok(KeyTtl::Expires(_)) => {}
                Err(e) => {
                    log::error!("Store CLEANUP error for {}: {}", key, e);
                    return expired;
                }
            }
        }
        expired
    }
}

fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["K", "M", "G", "T"];
    if bytes < 1024 {
        return format!("{}B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{:.2}{}", value, unit)
}

/// Glob match supporting `*` (any run) and `?` (any single character).
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn namespaced(clock: Arc<ManualClock>) -> (Arc<MemoryStore>, NamespacedStore) {
        let backend = Arc::new(MemoryStore::with_clock(clock));
        let store = NamespacedStore::new(backend.clone(), "test:aml:", Duration::from_secs(60));
        (backend, store)
    }

    #[test]
    fn glob_patterns() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("aml:*", "aml:0xabc"));
        assert!(!glob_match("aml:*", "dev:aml:0xabc"));
        assert!(glob_match("a?c", "abc"));
        assert!(glob_match("*:0x*f", "prod:aml:0x12f"));
        assert!(!glob_match("a?c", "abbc"));
    }

    #[test]
    fn memory_usage_formatting() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(2048), "2.00K");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00M");
    }

    #[test]
    fn namespaced_round_trip_and_prefixing() {
        let clock = Arc::new(ManualClock::new(0));
        let (backend, store) = namespaced(clock);

        assert!(store.set("0xabc", "value", None));
        assert_eq!(store.get("0xabc"), Some("value".to_string()));
        assert!(backend.exists("test:aml:0xabc").unwrap());
        assert_eq!(store.keys("*"), vec!["0xabc".to_string()]);
        assert!(store.exists("0xabc"));
        assert!(store.delete("0xabc"));
        assert!(!store.delete("0xabc"));
        assert_eq!(store.get("0xabc"), None);
    }

    #[test]
    fn default_ttl_applies() {
        let clock = Arc::new(ManualClock::new(0));
        let (_backend, store) = namespaced(clock.clone());

        store.set("short", "1", Some(Duration::from_secs(5)));
        store.set("long", "2", None);
        clock.advance(Duration::from_secs(10));
        assert_eq!(store.get("short"), None);
        assert_eq!(store.get("long"), Some("2".to_string()));
        clock.advance(Duration::from_secs(60));
        assert_eq!(store.get("long"), None);
    }

    #[test]
    fn mget_and_mset() {
        let clock = Arc::new(ManualClock::new(0));
        let (_backend, store) = namespaced(clock);
        let pairs = vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ];
        assert!(store.mset(&pairs, None));
        let values = store.mget(&["a".to_string(), "missing".to_string(), "b".to_string()]);
        assert_eq!(
            values,
            vec![Some("1".to_string()), None, Some("2".to_string())]
        );
    }

    #[test]
    fn failures_degrade_to_empty_answers() {
        let clock = Arc::new(ManualClock::new(0));
        let (backend, store) = namespaced(clock);
        store.set("a", "1", None);

        backend.set_available(false);
        assert!(!store.ping());
        assert_eq!(store.get("a"), None);
        assert!(!store.set("b", "2", None));
        assert!(!store.exists("a"));
        assert!(store.keys("*").is_empty());
        assert!(store.mget(&["a".to_string()]).is_empty());
        assert!(!store.flush_all());
        assert_eq!(store.cleanup(), 0);
        assert_eq!(store.stats().total_keys, 0);

        backend.set_available(true);
        assert!(store.ping());
        assert_eq!(store.get("a"), Some("1".to_string()));
    }

    #[test]
    fn cleanup_counts_expired_and_bounds_persistent_keys() {
        let clock = Arc::new(ManualClock::new(0));
        let (backend, store) = namespaced(clock.clone());
        backend.set("test:aml:forever", "x", None).unwrap();
        store.set("brief", "y", Some(Duration::from_secs(1)));
        backend.set("other:key", "z", None).unwrap();

        clock.advance(Duration::from_secs(2));
        assert_eq!(store.cleanup(), 1);
        assert!(matches!(
            backend.ttl("test:aml:forever").unwrap(),
            KeyTtl::Expires(_)
        ));
        assert_eq!(backend.ttl("other:key").unwrap(), KeyTtl::Persistent);
    }

    #[test]
    fn stats_track_hit_rate() {
        let clock = Arc::new(ManualClock::new(0));
        let (_backend, store) = namespaced(clock);
        store.set("a", "1", None);
        store.get("a");
        store.get("b");
        let stats = store.stats();
        assert_eq!(stats.total_keys, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
        assert!(stats.memory_usage.ends_with('B'));
    }

    #[test]
    fn flush_only_touches_namespace() {
        let clock = Arc::new(ManualClock::new(0));
        let (backend, store) = namespaced(clock);
        store.set("a", "1", None);
        backend.set("other:key", "z", None).unwrap();
        assert!(store.flush_all());
        assert!(store.keys("*").is_empty());
        assert!(backend.exists("other:key").unwrap());
    }
}
