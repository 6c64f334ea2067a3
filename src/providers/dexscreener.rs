//! DexScreener API Client
//!
//! API: https://api.dexscreener.com/latest/dex/tokens/{tokenAddress}
//! Free, no API key required.
//!
//! Returns every pair the token trades in, on either side. Only pairs with
//! the token as base are priced in it; the deepest of those by USD
//! liquidity is taken as the market for the snapshot.
//! DexScreener lags the chain by 5-30 seconds, fine for display data.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::dexpaprika::range_from_change;
use super::{get_json, non_negative_or, number_like, required_price, text_or, SnapshotProvider};
use crate::models::errors::{SnapshotError, SnapshotResult};
use crate::models::types::Snapshot;
use crate::utils::address::normalize_address;
use crate::utils::constants::{
    DEXSCREENER_BASE_URL, PROVIDER_DEXSCREENER, UNKNOWN_NAME, UNKNOWN_SYMBOL,
};

/// DexScreener API response
#[derive(Debug, Default, Deserialize)]
pub struct DexScreenerResponse {
    #[serde(default)]
    pub pairs: Option<Vec<DexPair>>,
}

/// A trading pair from DexScreener
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexPair {
    #[serde(default)]
    pub chain_id: Option<String>,
    #[serde(default)]
    pub dex_id: Option<String>,
    #[serde(default)]
    pub pair_address: Option<String>,
    #[serde(default)]
    pub base_token: Option<DexToken>,
    /// Price in USD (string upstream)
    #[serde(default)]
    pub price_usd: Option<serde_json::Value>,
    #[serde(default)]
    pub liquidity: Option<DexLiquidity>,
    #[serde(default)]
    pub volume: Option<DexVolume>,
    #[serde(default)]
    pub price_change: Option<DexPriceChange>,
}

impl DexPair {
    /// Whether `key` (a normalized address) is the base token of this pair
    pub fn has_base(&self, key: &str) -> bool {
        self.base_token
            .as_ref()
            .and_then(|t| t.address.as_deref())
            .map(|a| normalize_address(a) == key)
            .unwrap_or(false)
    }

    /// USD liquidity, 0 when absent
    pub fn liquidity_usd(&self) -> f64 {
        non_negative_or(self.liquidity.as_ref().and_then(|l| l.usd), 0.0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DexToken {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DexLiquidity {
    #[serde(default)]
    pub usd: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DexVolume {
    #[serde(default)]
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DexPriceChange {
    #[serde(default)]
    pub h24: Option<f64>,
}

/// DexScreener API client
pub struct DexScreenerClient {
    client: reqwest::Client,
    base_url: String,
}

impl DexScreenerClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEXSCREENER_BASE_URL.to_string(),
        }
    }

    /// Override the base URL (tests, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch all pairs for a token address
    pub async fn get_token_pairs(&self, token_address: &str) -> SnapshotResult<DexScreenerResponse> {
        let url = format!("{}/tokens/{}", self.base_url, token_address);
        info!("🔍 DexScreener: Fetching pairs for {}", token_address);
        get_json(PROVIDER_DEXSCREENER, self.client.get(&url)).await
    }
}

#[async_trait]
impl SnapshotProvider for DexScreenerClient {
    fn name(&self) -> &'static str {
        PROVIDER_DEXSCREENER
    }

    async fn fetch_snapshot(&self, address: &str) -> SnapshotResult<Snapshot> {
        let raw = self.get_token_pairs(address).await?;
        map_dexscreener(&raw, address, chrono::Utc::now().timestamp_millis())
    }
}

/// Map the deepest pair quoting `address` as base into a canonical snapshot
pub fn map_dexscreener(
    raw: &DexScreenerResponse,
    address: &str,
    captured_at_ms: i64,
) -> SnapshotResult<Snapshot> {
    let pairs = raw.pairs.as_deref().unwrap_or_default();
    if pairs.is_empty() {
        return Err(SnapshotError::mapping(PROVIDER_DEXSCREENER, "no pairs for token"));
    }

    let key = normalize_address(address);
    let best = pairs
        .iter()
        .filter(|p| p.has_base(&key))
        .max_by(|a, b| {
            a.liquidity_usd()
                .partial_cmp(&b.liquidity_usd())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .ok_or_else(|| {
            SnapshotError::mapping(PROVIDER_DEXSCREENER, "no pair with token as base")
        })?;

    info!(
        "📊 DexScreener: {} pairs, best on {} with ${:.2} liquidity",
        pairs.len(),
        best.dex_id.as_deref().unwrap_or("unknown"),
        best.liquidity_usd()
    );

    let price = required_price(PROVIDER_DEXSCREENER, number_like(best.price_usd.as_ref()))?;
    let (low_24h, high_24h) =
        range_from_change(price, best.price_change.as_ref().and_then(|c| c.h24));
    let token = best.base_token.clone().unwrap_or_default();

    Ok(Snapshot {
        address: address.to_string(),
        symbol: text_or(token.symbol.as_deref(), UNKNOWN_SYMBOL),
        name: text_or(token.name.as_deref(), UNKNOWN_NAME),
        price,
        high_24h,
        low_24h,
        volume_24h: non_negative_or(best.volume.as_ref().and_then(|v| v.h24), 0.0),
        liquidity: best.liquidity_usd(),
        captured_at_ms,
        provider: PROVIDER_DEXSCREENER.to_string(),
    })
}
