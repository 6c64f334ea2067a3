//! Moralis Token Price API Client
//!
//! API: https://deep-index.moralis.io/api/v2.2/erc20/{tokenAddress}/price?chain={chain}
//! Requires `X-API-Key`. The key is never logged.
//!
//! Moralis mixes numbers and numeric strings in this payload, so every
//! numeric field is read through `number_like`. No 24h volume is returned.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::dexpaprika::range_from_change;
use super::{get_json, non_negative_or, number_like, required_price, text_or, SnapshotProvider};
use crate::models::errors::SnapshotResult;
use crate::models::types::Snapshot;
use crate::utils::constants::{MORALIS_BASE_URL, PROVIDER_MORALIS, UNKNOWN_NAME, UNKNOWN_SYMBOL};

/// Moralis ERC20 price response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoralisTokenPrice {
    #[serde(default)]
    pub token_name: Option<String>,
    #[serde(default)]
    pub token_symbol: Option<String>,
    #[serde(default)]
    pub usd_price: Option<serde_json::Value>,
    #[serde(default, rename = "24hrPercentChange")]
    pub percent_change_24h: Option<serde_json::Value>,
    #[serde(default)]
    pub pair_total_liquidity_usd: Option<serde_json::Value>,
    #[serde(default)]
    pub exchange_name: Option<String>,
}

/// Moralis API client
pub struct MoralisClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    chain: String,
}

impl MoralisClient {
    pub fn new(client: reqwest::Client, api_key: &str, chain: &str) -> Self {
        Self {
            client,
            base_url: MORALIS_BASE_URL.to_string(),
            api_key: api_key.to_string(),
            chain: chain.to_string(),
        }
    }

    /// Override the base URL (tests, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch raw price body
    pub async fn get_token_price(&self, token_address: &str) -> SnapshotResult<MoralisTokenPrice> {
        let url = format!("{}/erc20/{}/price", self.base_url, token_address);
        info!("🔍 Moralis: Fetching price for {} on {}", token_address, self.chain);

        let request = self
            .client
            .get(&url)
            .query(&[("chain", self.chain.as_str())])
            .header("X-API-Key", &self.api_key);
        get_json(PROVIDER_MORALIS, request).await
    }
}

#[async_trait]
impl SnapshotProvider for MoralisClient {
    fn name(&self) -> &'static str {
        PROVIDER_MORALIS
    }

    async fn fetch_snapshot(&self, address: &str) -> SnapshotResult<Snapshot> {
        let raw = self.get_token_price(address).await?;
        map_moralis(&raw, address, chrono::Utc::now().timestamp_millis())
    }
}

/// Map a Moralis price body into a canonical snapshot
pub fn map_moralis(
    raw: &MoralisTokenPrice,
    address: &str,
    captured_at_ms: i64,
) -> SnapshotResult<Snapshot> {
    let price = required_price(PROVIDER_MORALIS, number_like(raw.usd_price.as_ref()))?;
    let (low_24h, high_24h) =
        range_from_change(price, number_like(raw.percent_change_24h.as_ref()));

    Ok(Snapshot {
        address: address.to_string(),
        symbol: text_or(raw.token_symbol.as_deref(), UNKNOWN_SYMBOL),
        name: text_or(raw.token_name.as_deref(), UNKNOWN_NAME),
        price,
        high_24h,
        low_24h,
        volume_24h: 0.0,
        liquidity: non_negative_or(number_like(raw.pair_total_liquidity_usd.as_ref()), 0.0),
        captured_at_ms,
        provider: PROVIDER_MORALIS.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn test_string_numbers_map() {
        let raw: MoralisTokenPrice = serde_json::from_value(json!({
            "tokenName": "Pepe",
            "tokenSymbol": "PEPE",
            "usdPrice": 0.0000089,
            "24hrPercentChange": "-10.0",
            "pairTotalLiquidityUsd": "48213456.12",
            "exchangeName": "Uniswap v3"
        }))
        .unwrap();

        let snap = map_moralis(&raw, "0x6982508145454ce325ddbe47a25d4ec3d2311933", 5).unwrap();
        assert_eq!(snap.symbol, "PEPE");
        assert_eq!(snap.provider, "moralis");
        assert_relative_eq!(snap.liquidity, 48213456.12);
        assert_eq!(snap.volume_24h, 0.0);
        assert_relative_eq!(snap.low_24h, 0.0000089);
        assert!(snap.high_24h > snap.price);
    }

    #[test]
    fn test_price_as_string_accepted() {
        let raw: MoralisTokenPrice =
            serde_json::from_value(json!({ "usdPrice": "3.5" })).unwrap();
        assert_relative_eq!(map_moralis(&raw, "0xabc", 0).unwrap().price, 3.5);
    }

    #[test]
    fn test_missing_price_is_mapping_error() {
        let raw: MoralisTokenPrice =
            serde_json::from_value(json!({ "tokenSymbol": "X", "usdPrice": null })).unwrap();
        let err = map_moralis(&raw, "0xabc", 0).unwrap_err();
        assert!(err.is_mapping());
        assert!(err.to_string().contains("moralis"));
    }
}
