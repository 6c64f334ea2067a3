//! DexPaprika API Client
//!
//! API: https://api.dexpaprika.com/networks/{network}/tokens/{tokenAddress}
//! Free, no API key required. Default primary provider.
//!
//! The token endpoint has no 24h high/low. When the 24h price change is
//! present, the range is bracketed by the current and the implied
//! previous price; otherwise both collapse to the current price.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::{get_json, non_negative_or, number_like, required_price, text_or, SnapshotProvider};
use crate::models::errors::SnapshotResult;
use crate::models::types::Snapshot;
use crate::utils::constants::{
    DEXPAPRIKA_BASE_URL, PROVIDER_DEXPAPRIKA, UNKNOWN_NAME, UNKNOWN_SYMBOL,
};

/// DexPaprika token details response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DexPaprikaToken {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default)]
    pub summary: Option<DexPaprikaSummary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DexPaprikaSummary {
    #[serde(default)]
    pub price_usd: Option<serde_json::Value>,
    #[serde(default)]
    pub liquidity_usd: Option<serde_json::Value>,
    #[serde(default, rename = "24h")]
    pub h24: Option<DexPaprikaWindow>,
}

/// Rolling window stats (`24h`, `6h`, ...)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DexPaprikaWindow {
    #[serde(default)]
    pub volume_usd: Option<serde_json::Value>,
    /// Percent change of price over the window
    #[serde(default)]
    pub last_price_usd_change: Option<serde_json::Value>,
}

/// DexPaprika API client
pub struct DexPaprikaClient {
    client: reqwest::Client,
    base_url: String,
    network: String,
}

impl DexPaprikaClient {
    pub fn new(client: reqwest::Client, network: &str) -> Self {
        Self {
            client,
            base_url: DEXPAPRIKA_BASE_URL.to_string(),
            network: network.to_string(),
        }
    }

    /// Override the base URL (self-hosted mirrors, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch raw token details
    pub async fn get_token(&self, token_address: &str) -> SnapshotResult<DexPaprikaToken> {
        let url = format!(
            "{}/networks/{}/tokens/{}",
            self.base_url, self.network, token_address
        );
        info!("🔍 DexPaprika: Fetching token {} on {}", token_address, self.network);
        get_json(PROVIDER_DEXPAPRIKA, self.client.get(&url)).await
    }
}

#[async_trait]
impl SnapshotProvider for DexPaprikaClient {
    fn name(&self) -> &'static str {
        PROVIDER_DEXPAPRIKA
    }

    async fn fetch_snapshot(&self, address: &str) -> SnapshotResult<Snapshot> {
        let raw = self.get_token(address).await?;
        map_dexpaprika(&raw, address, chrono::Utc::now().timestamp_millis())
    }
}

/// Map a DexPaprika token body into a canonical snapshot
pub fn map_dexpaprika(
    raw: &DexPaprikaToken,
    address: &str,
    captured_at_ms: i64,
) -> SnapshotResult<Snapshot> {
    let summary = raw.summary.clone().unwrap_or_default();
    let window = summary.h24.clone().unwrap_or_default();

    let price = required_price(PROVIDER_DEXPAPRIKA, number_like(summary.price_usd.as_ref()))?;
    let (low_24h, high_24h) =
        range_from_change(price, number_like(window.last_price_usd_change.as_ref()));

    Ok(Snapshot {
        address: address.to_string(),
        symbol: text_or(raw.symbol.as_deref(), UNKNOWN_SYMBOL),
        name: text_or(raw.name.as_deref(), UNKNOWN_NAME),
        price,
        high_24h,
        low_24h,
        volume_24h: non_negative_or(number_like(window.volume_usd.as_ref()), 0.0),
        liquidity: non_negative_or(number_like(summary.liquidity_usd.as_ref()), 0.0),
        captured_at_ms,
        provider: PROVIDER_DEXPAPRIKA.to_string(),
    })
}

/// Bracket the 24h range using a percent change; (low, high)
pub(crate) fn range_from_change(price: f64, change_pct: Option<f64>) -> (f64, f64) {
    let previous = change_pct
        .filter(|c| c.is_finite() && *c > -100.0)
        .map(|c| price / (1.0 + c / 100.0))
        .filter(|p| p.is_finite() && *p > 0.0);

    match previous {
        Some(prev) => (price.min(prev), price.max(prev)),
        None => (price, price),
    }
}
