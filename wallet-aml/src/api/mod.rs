//! Command handlers exposed to the wallet frontend.
//!
//! Each command takes the shared context plus a camelCase request and returns
//! `Result<Response, String>`, with errors rendered for display.

pub mod types;

use uuid::Uuid;

use crate::app_state::SharedScreeningContext;
use crate::errors::AmlError;
use crate::policy::{decide, should_block, should_flag};
use crate::report::generate_report;
use crate::validation::AddressValidator;

use self::types::{
    CacheStatsResponse, CachedScreeningResponse, CleanupScreeningCacheResponse,
    ClearScreeningCacheResponse, ExportScreeningReportResponse, InvalidateScreeningResponse,
    RecommendedActionResponse, ScreenAddressRequest, ScreenAddressResponse,
    ScreeningHistoryEntry, ScreeningHistoryResponse, ScreeningLookupRequest,
    ValidateAddressRequest, ValidateAddressResponse,
};

pub fn to_frontend_error(err: AmlError) -> String {
    err.to_string()
}

pub async fn screen_address(
    state: &SharedScreeningContext,
    request: ScreenAddressRequest,
) -> Result<ScreenAddressResponse, String> {
    let result = state
        .service()
        .screen(&request.address)
        .await
        .map_err(to_frontend_error)?;

    let action = decide(&result).action;
    Ok(ScreenAddressResponse {
        status: action.status(),
        action,
        result,
    })
}

pub fn get_cached_screening(
    state: &SharedScreeningContext,
    request: ScreeningLookupRequest,
) -> Result<CachedScreeningResponse, String> {
    Ok(CachedScreeningResponse {
        result: state.service().cached_result(&request.address),
    })
}

/// Live cached results, newest first.
pub fn get_screening_history(
    state: &SharedScreeningContext,
) -> Result<ScreeningHistoryResponse, String> {
    let service = state.service();
    let mut results: Vec<_> = service
        .cached_addresses()
        .iter()
        .filter_map(|address| service.cached_result(address))
        .collect();
    results.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));

    let entries: Vec<ScreeningHistoryEntry> = results
        .into_iter()
        .map(|result| ScreeningHistoryEntry {
            id: Uuid::new_v4().to_string(),
            result,
        })
        .collect();

    Ok(ScreeningHistoryResponse {
        total: entries.len(),
        entries,
    })
}

pub fn get_cache_stats(state: &SharedScreeningContext) -> Result<CacheStatsResponse, String> {
    let service = state.service();
    Ok(CacheStatsResponse {
        size: service.cache_size(),
        addresses: service.cached_addresses(),
        ttl_secs: service.cache().ttl().as_secs(),
        metrics: service.metrics(),
        store: state.store_stats(),
    })
}

pub fn invalidate_screening(
    state: &SharedScreeningContext,
    request: ScreeningLookupRequest,
) -> Result<InvalidateScreeningResponse, String> {
    Ok(InvalidateScreeningResponse {
        removed: state.service().invalidate(&request.address),
    })
}

pub fn clear_screening_cache(
    state: &SharedScreeningContext,
) -> Result<ClearScreeningCacheResponse, String> {
    let cleared = state.service().cache_size();
    state.service().clear_all();
    Ok(ClearScreeningCacheResponse { cleared })
}

pub fn cleanup_screening_cache(
    state: &SharedScreeningContext,
) -> Result<CleanupScreeningCacheResponse, String> {
    Ok(CleanupScreeningCacheResponse {
        removed: state.service().cleanup_expired(),
    })
}

/// Screen (cache first) and recommend an action for a counterparty.
pub async fn get_recommended_action(
    state: &SharedScreeningContext,
    request: ScreeningLookupRequest,
) -> Result<RecommendedActionResponse, String> {
    let result = state
        .service()
        .screen(&request.address)
        .await
        .map_err(to_frontend_error)?;

    Ok(RecommendedActionResponse::from_decision(
        decide(&result),
        should_block(&result),
        should_flag(&result),
    ))
}

pub async fn export_screening_report(
    state: &SharedScreeningContext,
    request: ScreeningLookupRequest,
) -> Result<ExportScreeningReportResponse, String> {
    let result = state
        .service()
        .screen(&request.address)
        .await
        .map_err(to_frontend_error)?;

    Ok(ExportScreeningReportResponse {
        address: result.address().to_string(),
        report: generate_report(&result),
    })
}

pub fn validate_address(
    _state: &SharedScreeningContext,
    request: ValidateAddressRequest,
) -> Result<ValidateAddressResponse, String> {
    let validator = AddressValidator::default();
    Ok(ValidateAddressResponse {
        is_valid: validator.is_valid_address(&request.address),
    })
}
