//! Type definitions for Ruster Pulse
//! Canonical snapshot, provenance and heuristic result shapes

use serde::{Deserialize, Serialize};

use super::errors::{SnapshotError, SnapshotResult};

/// Normalized market state of one token at a point in time.
///
/// `low_24h <= price <= high_24h` is NOT enforced, providers violate it
/// transiently. Price, volume and liquidity must be finite and non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    pub volume_24h: f64,
    pub liquidity: f64,
    /// Capture time (epoch milliseconds)
    pub captured_at_ms: i64,
    /// Provider that produced this observation
    pub provider: String,
}

impl Snapshot {
    /// Check the numeric invariants.
    ///
    /// A zero price is rejected as well: nothing downstream can be derived from it.
    pub fn validate(&self) -> SnapshotResult<()> {
        let checks = [
            ("price", self.price),
            ("volume_24h", self.volume_24h),
            ("liquidity", self.liquidity),
        ];
        for (field, value) in checks {
            if !value.is_finite() || value < 0.0 {
                return Err(SnapshotError::mapping(
                    self.provider.as_str(),
                    format!("{} must be a non-negative finite number, got {}", field, value),
                ));
            }
        }
        if self.price == 0.0 {
            return Err(SnapshotError::mapping(
                self.provider.as_str(),
                "price is zero",
            ));
        }
        Ok(())
    }
}

/// Which stage of the pipeline produced a returned snapshot.
/// Exactly one applies to any response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Fresh from the first configured provider
    Primary,
    /// Fresh from a lower-priority provider
    Fallback,
    /// Served from the snapshot cache
    Cache,
    /// Derived locally by the heuristic engine from a stored snapshot
    Heuristic,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Primary => "PRIMARY",
            Stage::Fallback => "FALLBACK",
            Stage::Cache => "CACHE",
            Stage::Heuristic => "HEURISTIC",
        }
    }

    /// A live upstream observation, eligible for caching
    pub fn is_live(&self) -> bool {
        matches!(self, Stage::Primary | Stage::Fallback)
    }
}

/// One recovered provider failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub provider: String,
    pub code: String,
    pub message: String,
    pub latency_ms: u64,
}

impl AttemptRecord {
    pub fn from_error(provider: &str, err: &SnapshotError, latency_ms: u64) -> Self {
        Self {
            provider: provider.to_string(),
            code: err.code().to_string(),
            message: err.to_string(),
            latency_ms,
        }
    }
}

/// Metadata accompanying every returned snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub provider: String,
    pub stage: Stage,
    /// Latency of the call that produced the snapshot
    pub latency_ms: u64,
    /// Age of the stored entry when served from cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_ms: Option<u64>,
    /// Failures recovered on the way to this result
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<AttemptRecord>,
}

impl Provenance {
    pub fn new(provider: impl Into<String>, stage: Stage, latency_ms: u64) -> Self {
        Self {
            provider: provider.into(),
            stage,
            latency_ms,
            age_ms: None,
            attempts: Vec::new(),
        }
    }

    pub fn from_cache(&self) -> bool {
        self.stage == Stage::Cache
    }

    pub fn from_fallback(&self) -> bool {
        self.stage == Stage::Fallback
    }

    pub fn from_heuristic(&self) -> bool {
        self.stage == Stage::Heuristic
    }
}

/// Snapshot plus provenance, as handed to callers.
///
/// `analysis` is filled only when the heuristic engine produced the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub snapshot: Snapshot,
    pub provenance: Provenance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<HeuristicResult>,
}

/// Support or resistance level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub label: String,
    pub price: f64,
}

/// Deterministic local analysis of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicResult {
    pub address: String,
    pub reference_price: f64,
    /// Sorted ascending by price
    pub levels: Vec<PriceLevel>,
    pub stop_loss: f64,
    /// First entry is the nearest target
    pub take_profit: Vec<f64>,
    pub indicators: Vec<String>,
    /// Informational only, the one clock-dependent field
    pub generated_at_ms: i64,
}
