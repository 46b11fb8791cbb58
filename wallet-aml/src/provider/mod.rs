//! Risk providers the screening service delegates to on a cache miss.

pub mod http;

use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::AmlResult;
use crate::risk::{ScreeningResult, WalletType};
use crate::scorer::{RandomSource, RiskScorer, ThreadRandom};

pub use http::{HttpRiskProvider, ProviderSettings};

/// Simulated network latency of the mock provider, in milliseconds.
pub const DEFAULT_MOCK_LATENCY_MS: RangeInclusive<u32> = 1000..=3000;

#[async_trait]
pub trait RiskProvider: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Produce a fresh screening result for an already classified address.
    ///
    /// Failures must surface as `AmlError::ScreeningFailed`, never as a
    /// default low-risk result.
    async fn assess(&self, address: &str, wallet_type: WalletType) -> AmlResult<ScreeningResult>;
}

/// Synthetic scoring behind an artificial delay.
#[derive(Debug, Clone)]
pub struct MockRiskProvider {
    scorer: RiskScorer,
    latency_ms: RangeInclusive<u32>,
    random: Arc<dyn RandomSource>,
}

impl MockRiskProvider {
    pub fn new(scorer: RiskScorer) -> Self {
        Self {
            scorer,
            latency_ms: DEFAULT_MOCK_LATENCY_MS,
            random: Arc::new(ThreadRandom),
        }
    }

    /// Override the simulated latency; `0..=0` disables the delay.
    pub fn with_latency(mut self, latency_ms: RangeInclusive<u32>) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_latency_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    pub fn scorer(&self) -> &RiskScorer {
        &self.scorer
    }
}

#[async_trait]
impl RiskProvider for MockRiskProvider {
    fn name(&self) -> &str {
        crate::scorer::MOCK_PROVIDER_NAME
    }

    async fn assess(&self, address: &str, wallet_type: WalletType) -> AmlResult<ScreeningResult> {
        let delay = self.random.uniform(self.latency_ms.clone());
        if delay > 0 {
            log::debug!("Mock provider delaying {}ms for {}", delay, address);
            tokio::time::sleep(Duration::from_millis(u64::from(delay))).await;
        }

        self.scorer.score(address, wallet_type)
    }
}
