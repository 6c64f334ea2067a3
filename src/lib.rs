//! Ruster Pulse Library
//!
//! Fault-tolerant token market snapshots:
//! - Ordered provider fallback (dexpaprika, moralis, dexscreener), one
//!   upstream call at a time, each bounded by timeout and retry
//! - Stale-while-revalidate cache with single-flight fetches per address
//! - Offline heuristic levels (stop loss, take profit, support/resistance)
//!   when every provider is down

pub mod api;
pub mod core;
pub mod models;
pub mod providers;
pub mod utils;

pub use crate::core::heuristic::{analyze, analyze_at};
pub use crate::core::mux::{MuxPolicy, ProviderMux};
pub use models::config::{ProviderKind, PulseConfig};
pub use models::errors::{SnapshotError, SnapshotResult};
pub use models::types::{
    AttemptRecord, HeuristicResult, PriceLevel, Provenance, Snapshot, SnapshotResponse, Stage,
};
pub use providers::{build_http_client, build_providers, SnapshotProvider};
pub use utils::bounded::{bounded_request, RequestBudget};
pub use utils::cache::{CacheEntry, CacheStats, Freshness, SnapshotCache};
