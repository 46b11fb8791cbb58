use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStorage, KeyValueStorage, MemoryStorage, ScreeningCache};
use crate::clock::{Clock, SystemClock};
use crate::config::{CacheBackend, Environment, ProviderKind, ScreeningConfig, ScreeningSettings};
use crate::errors::{AmlError, AmlResult};
use crate::provider::{HttpRiskProvider, MockRiskProvider, ProviderSettings, RiskProvider};
use crate::scorer::{RandomSource, RiskScorer, ThreadRandom};
use crate::service::ScreeningService;
use crate::store::{MemoryStore, NamespacedStore, StoreStats};

const DEADLINE_GRACE: Duration = Duration::from_secs(1);

/// Everything a host needs to screen addresses, wired from one settings value.
#[derive(Debug)]
pub struct ScreeningContext {
    environment: Environment,
    service: ScreeningService,
    store: Option<Arc<NamespacedStore>>,
    clock: Arc<dyn Clock>,
}

impl ScreeningContext {
    /// Build a context from `AML_ENVIRONMENT` and the `AML_*` overrides.
    pub fn from_env() -> AmlResult<Self> {
        let config = ScreeningConfig::from_env()?;
        Self::initialize(&config.settings()?)
    }

    pub fn initialize(settings: &ScreeningSettings) -> AmlResult<Self> {
        Self::initialize_with(settings, Arc::new(SystemClock), Arc::new(ThreadRandom))
    }

    /// Same as [`initialize`](Self::initialize) with caller-provided time and randomness.
    pub fn initialize_with(
        settings: &ScreeningSettings,
        clock: Arc<dyn Clock>,
        random: Arc<dyn RandomSource>,
    ) -> AmlResult<Self> {
        let (storage, store): (Arc<dyn CacheStorage>, Option<Arc<NamespacedStore>>) =
            match settings.cache_backend {
                CacheBackend::Memory => {
                    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
                    (storage, None)
                }
                CacheBackend::Store => {
                    log::info!(
                        "Using in-process key-value store for {}:{} db {} (prefix {})",
                        settings.store.host,
                        settings.store.port,
                        settings.store.db,
                        settings.store.key_prefix
                    );
                    let backend = Arc::new(MemoryStore::with_clock(clock.clone()));
                    let store = Arc::new(NamespacedStore::new(
                        backend,
                        settings.store.key_prefix.clone(),
                        settings.store.ttl,
                    ));
                    let storage: Arc<dyn CacheStorage> =
                        Arc::new(KeyValueStorage::new(store.clone()));
                    (storage, Some(store))
                }
            };

        let cache = ScreeningCache::with_ttl(storage, clock.clone(), settings.cache_ttl);
        let (provider, deadline) = build_provider(settings, clock.clone(), random)?;
        log::info!(
            "Screening context ready ({:?}, provider: {})",
            settings.environment,
            provider.name()
        );

        let service = ScreeningService::new(provider, cache).with_timeout(deadline);
        Ok(Self {
            environment: settings.environment,
            service,
            store,
            clock,
        })
    }

    pub fn service(&self) -> &ScreeningService {
        &self.service
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Key-value store backing the cache, when the store backend is selected.
    pub fn store(&self) -> Option<&Arc<NamespacedStore>> {
        self.store.as_ref()
    }

    pub fn store_stats(&self) -> Option<StoreStats> {
        self.store.as_ref().map(|store| store.stats())
    }
}

/// Provider plus the deadline the service allows for one assessment.
///
/// `API_TIMEOUT_MS` bounds the mock call as a whole but each HTTP attempt
/// separately, so the HTTP deadline spans the full retry budget.
fn build_provider(
    settings: &ScreeningSettings,
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomSource>,
) -> AmlResult<(Arc<dyn RiskProvider>, Duration)> {
    match settings.provider {
        ProviderKind::Mock => {
            let scorer = RiskScorer::new(random.clone(), clock);
            let provider = MockRiskProvider::new(scorer)
                .with_latency(settings.mock_latency_ms.clone())
                .with_latency_random(random);
            let provider: Arc<dyn RiskProvider> = Arc::new(provider);
            Ok((provider, settings.api_timeout))
        }
        ProviderKind::Http => {
            let base_url = settings.provider_base_url.clone().ok_or_else(|| {
                AmlError::ValidationError("Provider base URL is required".to_string())
            })?;
            let api_key = settings.provider_api_key.clone().ok_or_else(|| {
                AmlError::ValidationError("Provider API key is required".to_string())
            })?;

            let provider_settings = ProviderSettings {
                name: settings.provider_name.clone(),
                base_url,
                api_key,
                rate_limit: settings.provider_rate_limit,
                timeout: settings.api_timeout,
                max_retries: settings.max_retries,
            };
            let deadline = provider_settings.retry_budget() + DEADLINE_GRACE;
            let provider: Arc<dyn RiskProvider> =
                Arc::new(HttpRiskProvider::new(provider_settings)?);
            Ok((provider, deadline))
        }
    }
}

/// Screening context shared between command handlers.
#[derive(Debug, Clone)]
pub struct SharedScreeningContext(pub Arc<ScreeningContext>);

impl SharedScreeningContext {
    pub fn new(inner: ScreeningContext) -> Self {
        Self(Arc::new(inner))
    }
}

impl Deref for SharedScreeningContext {
    type Target = ScreeningContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::scorer::SeededRandom;

    const DAI: &str = "0x6B175474E89094C44Da98b954EedeAC495271d0F";

    fn test_settings() -> ScreeningSettings {
        ScreeningConfig::new(Environment::Test).settings().unwrap()
    }

    #[tokio::test]
    async fn memory_backend_screens_and_caches() {
        let context = ScreeningContext::initialize_with(
            &test_settings(),
            Arc::new(ManualClock::new(1_700_000_000_000)),
            Arc::new(SeededRandom::new(11)),
        )
        .unwrap();

        assert_eq!(context.environment(), Environment::Test);
        assert!(context.store().is_none());
        assert_eq!(context.service().provider_name(), "Mock AML Provider");

        let result = context.service().screen(DAI).await.unwrap();
        assert_eq!(result.timestamp(), 1_700_000_000_000);
        assert_eq!(context.service().cache_size(), 1);
    }

    #[tokio::test]
    async fn store_backend_writes_namespaced_keys() {
        let mut config = ScreeningConfig::new(Environment::Test);
        config.set("CACHE_BACKEND", "store");
        let context = ScreeningContext::initialize_with(
            &config.settings().unwrap(),
            Arc::new(ManualClock::new(0)),
            Arc::new(SeededRandom::new(5)),
        )
        .unwrap();

        context.service().screen(DAI).await.unwrap();
        let store = context.store().unwrap();
        assert_eq!(store.prefix(), "test:aml:");
        assert_eq!(store.keys("*"), vec![DAI.to_string()]);
        assert_eq!(context.store_stats().unwrap().total_keys, 1);
    }

    #[tokio::test]
    async fn development_store_keeps_results_for_cache_ttl() {
        let mut config = ScreeningConfig::new(Environment::Development);
        config.set("CACHE_BACKEND", "store");
        config.set("MOCK_LATENCY_MIN_MS", "0");
        config.set("MOCK_LATENCY_MAX_MS", "0");
        let settings = config.settings().unwrap();
        assert!(settings.store.ttl < settings.cache_ttl);

        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let context = ScreeningContext::initialize_with(
            &settings,
            clock.clone(),
            Arc::new(SeededRandom::new(3)),
        )
        .unwrap();

        let first = context.service().screen(DAI).await.unwrap();
        clock.advance(Duration::from_secs(2 * 3600));
        assert_eq!(context.service().cached_result(DAI), Some(first.clone()));
        assert_eq!(context.service().screen(DAI).await.unwrap(), first);
        assert_eq!(context.service().metrics().cache_hits, 1);
    }

    #[tokio::test]
    async fn stalled_http_provider_is_retried_before_deadline() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let accepted = connections.clone();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                accepted.fetch_add(1, Ordering::SeqCst);
                held.push(socket);
            }
        });

        let mut settings = test_settings();
        settings.provider = ProviderKind::Http;
        settings.provider_base_url = Some(format!("http://{}", addr));
        settings.provider_api_key = Some("key".to_string());
        settings.provider_rate_limit = 0;
        settings.api_timeout = Duration::from_millis(300);
        settings.max_retries = 2;

        let context = ScreeningContext::initialize(&settings).unwrap();
        let err = context.service().screen(DAI).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(connections.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn http_provider_needs_base_url() {
        let mut settings = test_settings();
        settings.provider = ProviderKind::Http;
        settings.provider_api_key = Some("key".to_string());
        let err = ScreeningContext::initialize(&settings).unwrap_err();
        assert!(matches!(err, AmlError::ValidationError(_)));
    }
}
