use crate::metrics::MetricsSnapshot;
use crate::policy::{Action, AmlStatus, Decision};
use crate::risk::ScreeningResult;
use crate::store::StoreStats;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenAddressRequest {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenAddressResponse {
    pub result: ScreeningResult,
    pub action: Action,
    pub status: AmlStatus,
}

/// Request shared by the commands that operate on one address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningLookupRequest {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedScreeningResponse {
    #[serde(default)]
    pub result: Option<ScreeningResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningHistoryEntry {
    pub id: String,
    pub result: ScreeningResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningHistoryResponse {
    pub entries: Vec<ScreeningHistoryEntry>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsResponse {
    pub size: usize,
    pub addresses: Vec<String>,
    pub ttl_secs: u64,
    pub metrics: MetricsSnapshot,
    #[serde(default)]
    pub store: Option<StoreStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateScreeningResponse {
    pub removed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearScreeningCacheResponse {
    pub cleared: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupScreeningCacheResponse {
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedActionResponse {
    pub action: Action,
    pub reason: String,
    pub status: AmlStatus,
    pub should_block: bool,
    pub should_flag: bool,
}

impl RecommendedActionResponse {
    pub fn from_decision(decision: Decision, should_block: bool, should_flag: bool) -> Self {
        Self {
            status: decision.action.status(),
            action: decision.action,
            reason: decision.reason,
            should_block,
            should_flag,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportScreeningReportResponse {
    pub address: String,
    pub report: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateAddressRequest {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateAddressResponse {
    pub is_valid: bool,
}
