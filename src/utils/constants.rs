//! Constants Module - Single Source of Truth
//!
//! Defaults, upstream endpoints and thresholds used across the crate.
//! Every duration here is only a default; `PulseConfig` decides at runtime.

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "RusterPulse";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for upstream HTTP requests
pub const USER_AGENT: &str = concat!("RusterPulse/", env!("CARGO_PKG_VERSION"));

// ============================================
// RETRIEVAL DEFAULTS
// ============================================

/// Per-provider attempt timeout (milliseconds)
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 3_000;

/// Retries per provider after the first attempt
pub const DEFAULT_PROVIDER_RETRIES: u32 = 1;

/// Upper bound on retries per provider
pub const MAX_PROVIDER_RETRIES: u32 = 1;

/// Backoff base: attempt n waits base * 2^n (milliseconds)
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 100;

/// End-to-end budget for one mux run (milliseconds)
pub const DEFAULT_REQUEST_BUDGET_MS: u64 = 8_000;

/// Entries younger than this are served without background work (seconds)
pub const DEFAULT_FRESH_TTL_SECS: u64 = 300;

/// Entries younger than this are served stale while refreshing (seconds)
pub const DEFAULT_STALE_TTL_SECS: u64 = 1_800;

/// Transport-level ceiling on every upstream HTTP call (seconds)
pub const HTTP_CLIENT_TIMEOUT_SECS: u64 = 10;

// ============================================
// PROVIDERS
// ============================================

pub const PROVIDER_DEXPAPRIKA: &str = "dexpaprika";
pub const PROVIDER_MORALIS: &str = "moralis";
pub const PROVIDER_DEXSCREENER: &str = "dexscreener";

/// Provenance name for locally derived results
pub const PROVIDER_HEURISTIC: &str = "heuristic";

pub const DEXPAPRIKA_BASE_URL: &str = "https://api.dexpaprika.com";
pub const MORALIS_BASE_URL: &str = "https://deep-index.moralis.io/api/v2.2";
pub const DEXSCREENER_BASE_URL: &str = "https://api.dexscreener.com/latest/dex";

pub const DEFAULT_DEXPAPRIKA_NETWORK: &str = "ethereum";
pub const DEFAULT_MORALIS_CHAIN: &str = "eth";

/// Placeholder symbol when upstream omits it
pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

/// Placeholder name when upstream omits it
pub const UNKNOWN_NAME: &str = "Unknown Token";

// ============================================
// HEURISTIC POLICY
// ============================================

/// Stop loss at 95% of price
pub const STOP_LOSS_RATIO: f64 = 0.95;

/// Take-profit ladder, nearest first
pub const TAKE_PROFIT_RATIOS: [f64; 3] = [1.05, 1.10, 1.20];

/// Support/resistance levels stay within this fraction of price
pub const MAX_LEVEL_DEVIATION: f64 = 0.035;

/// Liquidity below this is "thin" (USD)
pub const THIN_LIQUIDITY_USD: f64 = 50_000.0;

/// Liquidity below this is "moderate" (USD)
pub const MODERATE_LIQUIDITY_USD: f64 = 1_000_000.0;

// ============================================
// API LIMITS
// ============================================

/// Maximum addresses per batch request
pub const MAX_BATCH_SIZE: usize = 50;

/// Default concurrency for batch lookups
pub const DEFAULT_BATCH_CONCURRENCY: usize = 8;

/// Concurrent batch requests served at once
pub const MAX_CONCURRENT_BATCHES: usize = 16;

/// In-flight HTTP requests across the whole router
pub const MAX_CONCURRENT_REQUESTS: usize = 256;
