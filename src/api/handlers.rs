//! API Request Handlers

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use super::types::*;
use crate::core::heuristic;
use crate::core::mux::ProviderMux;
use crate::models::config::PulseConfig;
use crate::models::errors::{SnapshotError, SnapshotResult};
use crate::models::types::Stage;
use crate::providers::build_http_client;
use crate::utils::address::{is_valid_address, normalize_address};
use crate::utils::cache::SnapshotCache;
use crate::utils::constants::{APP_NAME, APP_VERSION, MAX_BATCH_SIZE, MAX_CONCURRENT_BATCHES};

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

/// Shared application state
pub struct AppState {
    pub cache: Arc<SnapshotCache>,
    pub providers: Vec<String>,
    pub start_time: Instant,
    pub batch_semaphore: Arc<Semaphore>,
}

impl AppState {
    pub fn new(cache: SnapshotCache) -> Self {
        let providers = cache
            .mux()
            .provider_names()
            .into_iter()
            .map(String::from)
            .collect();

        Self {
            cache: Arc::new(cache),
            providers,
            start_time: Instant::now(),
            batch_semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_BATCHES)),
        }
    }

    /// Wire HTTP client, providers, mux and cache from config
    pub fn from_config(config: &PulseConfig) -> SnapshotResult<Self> {
        let client = build_http_client()?;
        let mux = Arc::new(ProviderMux::from_config(config, client)?);
        Ok(Self::new(SnapshotCache::from_config(mux, config)))
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn reject(status: StatusCode, error: ApiError, start: Instant) -> (StatusCode, Json<ApiResponse<()>>) {
    (status, Json(ApiResponse::error(error, elapsed_ms(start))))
}

fn reject_snapshot_error(err: &SnapshotError, start: Instant) -> (StatusCode, Json<ApiResponse<()>>) {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    reject(status, ApiError::from(err), start)
}

// ============================================
// Health Check
// ============================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    let start = Instant::now();

    let data = HealthData {
        service: APP_NAME.to_string(),
        status: "healthy".to_string(),
        version: APP_VERSION.to_string(),
        uptime_seconds: state.uptime_seconds(),
        providers: state.providers.clone(),
    };

    Json(ApiResponse::success(data, elapsed_ms(start)))
}

// ============================================
// Snapshot
// ============================================

pub async fn get_snapshot(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(query): Query<SnapshotQuery>,
) -> ApiResult<SnapshotData> {
    let start = Instant::now();

    if !is_valid_address(&address) {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            ApiError::bad_request("Invalid token address format"),
            start,
        ));
    }

    let response = state.cache.get(&address).await.map_err(|e| {
        match &e {
            SnapshotError::NoDataAvailable { .. } => warn!("📭 No data for {}", address),
            _ => error!("❌ Snapshot failed for {}: {}", address, e),
        }
        reject_snapshot_error(&e, start)
    })?;

    let with_analysis = query.analysis.unwrap_or(true);
    let analysis = match response.analysis {
        Some(existing) => Some(existing),
        None if with_analysis => Some(heuristic::analyze(&response.snapshot)),
        None => None,
    };

    info!(
        "📈 Snapshot {}: ${} via {} ({})",
        response.snapshot.symbol,
        response.snapshot.price,
        response.provenance.provider,
        response.provenance.stage.as_str()
    );

    let data = SnapshotData {
        address: normalize_address(&address),
        snapshot: response.snapshot,
        provenance: response.provenance,
        analysis,
    };

    Ok(Json(ApiResponse::success(data, elapsed_ms(start))))
}

// ============================================
// Batch Snapshots
// ============================================

pub async fn batch_snapshots(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchSnapshotRequest>,
) -> ApiResult<BatchSnapshotData> {
    let start = Instant::now();

    // Validate request
    if req.addresses.is_empty() {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            ApiError::bad_request("addresses array cannot be empty"),
            start,
        ));
    }

    if req.addresses.len() > MAX_BATCH_SIZE {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            ApiError::bad_request(format!(
                "Maximum {} addresses per batch request",
                MAX_BATCH_SIZE
            )),
            start,
        ));
    }

    let _batch_permit = state.batch_semaphore.acquire().await.map_err(|_| {
        reject(
            StatusCode::SERVICE_UNAVAILABLE,
            ApiError::internal("Batch capacity unavailable"),
            start,
        )
    })?;

    let concurrency = req.concurrency.clamp(1, MAX_BATCH_SIZE);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut handles = Vec::with_capacity(req.addresses.len());

    // Process addresses concurrently; duplicates collapse in the cache
    for address in req.addresses.iter() {
        let sem = semaphore.clone();
        let cache = state.cache.clone();
        let addr = address.clone();

        let handle = tokio::spawn(async move {
            let item_start = Instant::now();
            let Ok(_permit) = sem.acquire_owned().await else {
                return batch_error(addr, ApiError::internal("Batch aborted"), item_start);
            };

            if !is_valid_address(&addr) {
                return batch_error(
                    addr,
                    ApiError::bad_request("Invalid address format"),
                    item_start,
                );
            }

            match cache.get(&addr).await {
                Ok(response) => BatchSnapshotResult {
                    address: normalize_address(&addr),
                    status: "success".to_string(),
                    snapshot: Some(response.snapshot),
                    provenance: Some(response.provenance),
                    error: None,
                    latency_ms: elapsed_ms(item_start),
                },
                Err(e) => batch_error(addr, ApiError::from(&e), item_start),
            }
        });

        handles.push((address.clone(), handle));
    }

    // Collect results in request order
    let mut results = Vec::with_capacity(handles.len());
    for (address, handle) in handles {
        match handle.await {
            Ok(result) => results.push(result),
            Err(e) => results.push(batch_error(
                address,
                ApiError::internal(format!("Lookup task failed: {}", e)),
                start,
            )),
        }
    }

    let stage_count = |stage: Stage| {
        results
            .iter()
            .filter(|r| r.provenance.as_ref().map(|p| p.stage == stage).unwrap_or(false))
            .count()
    };
    let total_from_cache = stage_count(Stage::Cache);
    let total_heuristic = stage_count(Stage::Heuristic);
    let total_succeeded = results.iter().filter(|r| r.status == "success").count();

    info!(
        "📦 Batch: {}/{} succeeded ({} cached, {} heuristic) in {:.1}ms",
        total_succeeded,
        req.addresses.len(),
        total_from_cache,
        total_heuristic,
        elapsed_ms(start)
    );

    let data = BatchSnapshotData {
        total_requested: req.addresses.len(),
        total_succeeded,
        total_from_cache,
        total_heuristic,
        total_failed: results.len() - total_succeeded,
        results,
        processing_time_ms: elapsed_ms(start),
    };

    Ok(Json(ApiResponse::success(data, elapsed_ms(start))))
}

fn batch_error(address: String, error: ApiError, start: Instant) -> BatchSnapshotResult {
    BatchSnapshotResult {
        address,
        status: "error".to_string(),
        snapshot: None,
        provenance: None,
        error: Some(error),
        latency_ms: elapsed_ms(start),
    }
}

// ============================================
// Cache Management
// ============================================

pub async fn clear_cache_entry(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Json<ApiResponse<CacheClearData>> {
    let start = Instant::now();
    state.cache.clear(Some(&address));

    let data = CacheClearData {
        address: Some(normalize_address(&address)),
        entries_remaining: state.cache.stats().entries,
    };
    Json(ApiResponse::success(data, elapsed_ms(start)))
}

pub async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<ApiResponse<CacheClearData>> {
    let start = Instant::now();
    state.cache.clear(None);

    let data = CacheClearData {
        address: None,
        entries_remaining: state.cache.stats().entries,
    };
    Json(ApiResponse::success(data, elapsed_ms(start)))
}

// ============================================
// Stats
// ============================================

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatsData>> {
    let start = Instant::now();
    let cache_stats = state.cache.stats();

    info!(
        "📊 Cache Stats: {} entries, {:.1}% hit rate ({} fresh / {} stale / {} misses)",
        cache_stats.entries,
        cache_stats.hit_rate,
        cache_stats.fresh_hits,
        cache_stats.stale_hits,
        cache_stats.misses
    );

    let data = StatsData {
        cache: cache_stats,
        providers: state.providers.clone(),
        uptime_seconds: state.uptime_seconds(),
        api_version: APP_VERSION.to_string(),
    };

    Json(ApiResponse::success(data, elapsed_ms(start)))
}
