//! Screening counters: requests, cache hits and misses, errors and provider latency.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct ScreeningMetrics {
    total_requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    errors: AtomicU64,
    provider_calls: AtomicU64,
    provider_time_ms: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub errors: u64,
    /// Mean provider response time over completed calls, in milliseconds.
    pub average_response_time: f64,
}

impl ScreeningMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one provider round trip, successful or not.
    pub fn record_provider_call(&self, elapsed: Duration) {
        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.provider_calls.fetch_add(1, Ordering::Relaxed);
        self.provider_time_ms.fetch_add(millis, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let calls = self.provider_calls.load(Ordering::Relaxed);
        let total_ms = self.provider_time_ms.load(Ordering::Relaxed);
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            average_response_time: if calls == 0 {
                0.0
            } else {
                total_ms as f64 / calls as f64
            },
        }
    }
}
