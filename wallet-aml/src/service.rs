//! Screening orchestration: validate, consult the cache, and on a miss classify,
//! score through the provider and write the result back.
//!
//! `screen` is read-then-write without per-address coordination: concurrent
//! misses for the same address may each call the provider, and the last write
//! wins.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::ScreeningCache;
use crate::classifier::AddressClassifier;
use crate::errors::{AmlError, AmlResult};
use crate::metrics::{MetricsSnapshot, ScreeningMetrics};
use crate::provider::RiskProvider;
use crate::risk::ScreeningResult;
use crate::validation::AddressValidator;

/// Deadline for a single provider call.
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct ScreeningService {
    validator: AddressValidator,
    classifier: AddressClassifier,
    provider: Arc<dyn RiskProvider>,
    cache: ScreeningCache,
    request_timeout: Duration,
    metrics: ScreeningMetrics,
}

impl ScreeningService {
    pub fn new(provider: Arc<dyn RiskProvider>, cache: ScreeningCache) -> Self {
        Self {
            validator: AddressValidator::new(),
            classifier: AddressClassifier::default(),
            provider,
            cache,
            request_timeout: DEFAULT_API_TIMEOUT,
            metrics: ScreeningMetrics::new(),
        }
    }

    pub fn with_classifier(mut self, classifier: AddressClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Screen an address, serving a live cached result when one exists.
    ///
    /// Provider failures are returned unchanged; they are never replaced by a
    /// default result. Dropping the returned future cancels the provider call.
    pub async fn screen(&self, address: &str) -> AmlResult<ScreeningResult> {
        self.metrics.record_request();
        if let Err(e) = self.validator.validate_address(address) {
            self.metrics.record_error();
            return Err(e);
        }

        if let Some(cached) = self.cache.get(address) {
            log::debug!("Screening cache hit for {}", address);
            self.metrics.record_cache_hit();
            return Ok(cached);
        }
        self.metrics.record_cache_miss();

        let wallet_type = self.classifier.classify(address);
        log::debug!(
            "Screening cache miss for {}; classified as {} wallet",
            address,
            wallet_type
        );

        let started = Instant::now();
        let outcome = tokio::time::timeout(
            self.request_timeout,
            self.provider.assess(address, wallet_type),
        )
        .await;
        self.metrics.record_provider_call(started.elapsed());

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                self.metrics.record_error();
                log::warn!("AML screening failed for {}: {}", address, e);
                return Err(e);
            }
            Err(_) => {
                self.metrics.record_error();
                log::warn!(
                    "AML screening for {} exceeded {:?}",
                    address,
                    self.request_timeout
                );
                return Err(AmlError::retryable(format!(
                    "{} did not respond within {} ms",
                    self.provider.name(),
                    self.request_timeout.as_millis()
                )));
            }
        };

        log::info!(
            "Screened {}: score {} ({})",
            address,
            result.risk_score(),
            result.risk_level()
        );
        self.cache.set(address, result.clone());
        Ok(result)
    }

    pub fn cache(&self) -> &ScreeningCache {
        &self.cache
    }

    pub fn cache_size(&self) -> usize {
        self.cache.size()
    }

    pub fn cached_addresses(&self) -> Vec<String> {
        self.cache.keys()
    }

    /// Live cached result, without touching the provider.
    pub fn cached_result(&self, address: &str) -> Option<ScreeningResult> {
        self.cache.get(address)
    }

    pub fn store_result(&self, address: &str, result: ScreeningResult) {
        self.cache.set(address, result);
    }

    pub fn invalidate(&self, address: &str) -> bool {
        self.cache.delete(address)
    }

    pub fn clear_all(&self) {
        log::info!("Clearing screening cache ({} entries)", self.cache.size());
        self.cache.clear();
    }

    pub fn cleanup_expired(&self) -> usize {
        self.cache.cleanup_expired()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
