//! API Request/Response Types

use serde::{Deserialize, Serialize};

use crate::models::errors::SnapshotError;
use crate::models::types::{HeuristicResult, Provenance, Snapshot};
use crate::utils::cache::CacheStats;

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub latency_ms: f64,
    pub timestamp: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, latency_ms: f64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(error: ApiError, latency_ms: f64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// API Error
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: "BAD_REQUEST".to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn rate_limited(retry_after: u64) -> Self {
        Self {
            code: "RATE_LIMITED".to_string(),
            message: format!("Rate limit exceeded. Retry after {} seconds", retry_after),
            details: Some(format!("retry_after: {}", retry_after)),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
            details: None,
        }
    }
}

impl From<&SnapshotError> for ApiError {
    fn from(err: &SnapshotError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            details: None,
        }
    }
}

// ============================================
// Snapshot
// ============================================

#[derive(Debug, Deserialize, Default)]
pub struct SnapshotQuery {
    /// Include heuristic analysis (default: true)
    #[serde(default)]
    pub analysis: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotData {
    pub address: String,
    pub snapshot: Snapshot,
    pub provenance: Provenance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<HeuristicResult>,
}

// ============================================
// Batch Snapshots
// ============================================

#[derive(Debug, Deserialize)]
pub struct BatchSnapshotRequest {
    pub addresses: Vec<String>,
    /// Max concurrent lookups (default: 8, max: 50)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    crate::utils::constants::DEFAULT_BATCH_CONCURRENCY
}

#[derive(Debug, Serialize)]
pub struct BatchSnapshotData {
    pub total_requested: usize,
    pub total_succeeded: usize,
    pub total_from_cache: usize,
    pub total_heuristic: usize,
    pub total_failed: usize,
    pub results: Vec<BatchSnapshotResult>,
    pub processing_time_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct BatchSnapshotResult {
    pub address: String,
    pub status: String, // "success" | "error"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub latency_ms: f64,
}

// ============================================
// Cache Management
// ============================================

#[derive(Debug, Serialize)]
pub struct CacheClearData {
    /// None when the whole cache was cleared
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub entries_remaining: usize,
}

// ============================================
// Stats
// ============================================

#[derive(Debug, Serialize)]
pub struct StatsData {
    pub cache: CacheStats,
    pub providers: Vec<String>,
    pub uptime_seconds: u64,
    pub api_version: String,
}

// ============================================
// Health Check
// ============================================

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub service: String,
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub providers: Vec<String>,
}
