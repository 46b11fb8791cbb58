/// HTTP client for a remote AML screening provider
///
/// Sends one JSON request per address and maps the provider's response onto a
/// [`ScreeningResult`]. Transport failures, timeouts, 429 and 5xx answers are
/// retried with exponential backoff; anything else fails immediately.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::RiskProvider;
use crate::errors::{AmlError, AmlResult};
use crate::risk::{RiskLevel, RiskRating, ScreeningResult, WalletType};

const SCREEN_PATH: &str = "/v1/screen";
const BACKOFF_BASE: Duration = Duration::from_millis(250);
const BACKOFF_CAP: Duration = Duration::from_secs(4);

/// Connection details for a remote provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    /// Requests per minute; zero disables pacing.
    pub rate_limit: u32,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl ProviderSettings {
    /// Worst case for one assessment: every attempt paced and timing out, plus backoff.
    pub fn retry_budget(&self) -> Duration {
        let attempts = self.max_retries.saturating_add(1);
        let pacing = match self.rate_limit {
            0 => Duration::ZERO,
            limit => Duration::from_secs(60) / limit,
        };
        let backoff: Duration = (0..self.max_retries).map(backoff_delay).sum();
        (self.timeout + pacing)
            .saturating_mul(attempts)
            .saturating_add(backoff)
    }
}

/// Request body sent to the provider
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AmlRequest<'a> {
    address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    blockchain: Option<&'a str>,
    include_history: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    risk_threshold: Option<u8>,
}

/// Provider answer for one address
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmlResponse {
    pub address: String,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub sanctions: bool,
    /// Politically exposed person
    #[serde(default)]
    pub pep: bool,
    pub timestamp: i64,
    pub provider: String,
    pub confidence: u8,
}

impl AmlResponse {
    /// Convert into a screening result for the requested address, rejecting
    /// inconsistent ratings. The echoed `address` is ignored.
    pub fn into_result(
        self,
        requested_address: &str,
        wallet_type: WalletType,
    ) -> AmlResult<ScreeningResult> {
        let rating = RiskRating::new(self.risk_score, self.risk_level)
            .map_err(|e| AmlError::fatal(format!("Provider returned an invalid rating: {}", e)))?;

        let mut flags = self.flags;
        if self.sanctions && !flags.iter().any(|f| f.to_lowercase().contains("sanction")) {
            flags.push("Sanctioned entity".to_string());
        }
        if self.pep {
            flags.push("Politically exposed person".to_string());
        }

        if !self.address.eq_ignore_ascii_case(requested_address) {
            log::warn!(
                "Provider answered for {} when asked about {}",
                self.address,
                requested_address
            );
        }

        Ok(ScreeningResult::new(
            requested_address,
            rating,
            flags,
            self.timestamp,
            wallet_type,
            self.provider,
            self.confidence,
        ))
    }
}

pub struct HttpRiskProvider {
    client: Client,
    settings: ProviderSettings,
    endpoint: String,
    last_request: Mutex<Option<Instant>>,
}

impl std::fmt::Debug for HttpRiskProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRiskProvider")
            .field("name", &self.settings.name)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl HttpRiskProvider {
    pub fn new(settings: ProviderSettings) -> AmlResult<Self> {
        if settings.base_url.trim().is_empty() {
            return Err(AmlError::ValidationError(
                "Provider base URL is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| {
                AmlError::ValidationError(format!("Failed to create HTTP client: {}", e))
            })?;

        let endpoint = format!("{}{}", settings.base_url.trim_end_matches('/'), SCREEN_PATH);
        Ok(Self {
            client,
            settings,
            endpoint,
            last_request: Mutex::new(None),
        })
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Space requests so the provider's per-minute limit is respected.
    async fn pace(&self) {
        if self.settings.rate_limit == 0 {
            return;
        }

        let interval = Duration::from_secs(60) / self.settings.rate_limit;
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn request_once(&self, address: &str) -> AmlResult<AmlResponse> {
        self.pace().await;

        let body = AmlRequest {
            address,
            blockchain: Some("ethereum"),
            include_history: false,
            risk_threshold: None,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-Key", &self.settings.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<AmlResponse>().await?)
    }
}

#[async_trait]
impl RiskProvider for HttpRiskProvider {
    fn name(&self) -> &str {
        &self.settings.name
    }

    async fn assess(&self, address: &str, wallet_type: WalletType) -> AmlResult<ScreeningResult> {
        let mut attempt = 0;
        loop {
            match self.request_once(address).await {
                Ok(response) => return response.into_result(address, wallet_type),
                Err(e) if e.is_retryable() && attempt < self.settings.max_retries => {
                    let delay = backoff_delay(attempt);
                    log::warn!(
                        "{} attempt {} for {} failed: {}; retrying in {:?}",
                        self.settings.name,
                        attempt + 1,
                        address,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    log::error!("{} screening failed for {}: {}", self.settings.name, address, e);
                    return Err(e);
                }
            }
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let multiplier = 1_u32 << attempt.min(8);
    BACKOFF_BASE
        .checked_mul(multiplier)
        .unwrap_or(BACKOFF_CAP)
        .min(BACKOFF_CAP)
}
