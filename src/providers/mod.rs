//! Providers Module - External Data Sources
//!
//! One adapter per upstream. Each adapter owns the HTTP call and a pure
//! mapping function from the raw body into a canonical [`Snapshot`].
//! Every transport, status and decode error leaves this module as
//! `ProviderFailure`; bad field values leave it as `MappingError`.

pub mod dexpaprika;
pub mod dexscreener;
pub mod moralis;

pub use dexpaprika::*;
pub use dexscreener::*;
pub use moralis::*;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, USER_AGENT};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::models::config::{ProviderKind, PulseConfig};
use crate::models::errors::{SnapshotError, SnapshotResult};
use crate::models::types::Snapshot;
use crate::utils::constants::{HTTP_CLIENT_TIMEOUT_SECS, USER_AGENT as USER_AGENT_CONST};

/// An upstream that can produce a canonical snapshot for an address
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Provider name used in logs and provenance
    fn name(&self) -> &'static str;

    /// Fetch and map one snapshot. Must be safe to call repeatedly.
    async fn fetch_snapshot(&self, address: &str) -> SnapshotResult<Snapshot>;
}

/// Build the shared HTTP client (user agent + gzip)
pub fn build_http_client() -> SnapshotResult<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(HTTP_CLIENT_TIMEOUT_SECS))
        .gzip(true)
        .build()
        .map_err(|e| SnapshotError::InvalidConfig(format!("Failed to build HTTP client: {}", e)))
}

/// Instantiate the enabled providers in configured priority order.
///
/// Providers missing credentials are skipped with a warning.
pub fn build_providers(
    config: &PulseConfig,
    client: reqwest::Client,
) -> Vec<Arc<dyn SnapshotProvider>> {
    let mut providers: Vec<Arc<dyn SnapshotProvider>> = Vec::new();

    for kind in &config.providers {
        match kind {
            ProviderKind::DexPaprika => providers.push(Arc::new(DexPaprikaClient::new(
                client.clone(),
                &config.dexpaprika_network,
            ))),
            ProviderKind::Moralis => match &config.moralis_api_key {
                Some(key) => providers.push(Arc::new(MoralisClient::new(
                    client.clone(),
                    key,
                    &config.moralis_chain,
                ))),
                None => {
                    warn!("⚠️ Skipping moralis: no API key configured");
                    continue;
                }
            },
            ProviderKind::DexScreener => {
                providers.push(Arc::new(DexScreenerClient::new(client.clone())))
            }
        }
        info!("✅ Provider enabled: {} (priority {})", kind.name(), providers.len());
    }

    providers
}

/// GET `url` and decode the JSON body, normalizing every failure
pub(crate) async fn get_json<T: DeserializeOwned>(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> SnapshotResult<T> {
    let response = request
        .send()
        .await
        .map_err(|e| SnapshotError::provider(provider, format!("Request failed: {}", e)))?;

    let status = response.status();
    if status.as_u16() == 429 {
        return Err(SnapshotError::provider(provider, "Rate limited (HTTP 429)"));
    }
    if !status.is_success() {
        return Err(SnapshotError::provider(provider, format!("HTTP error: {}", status)));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| SnapshotError::provider(provider, format!("Failed to parse response: {}", e)))
}

/// Accept JSON numbers and numeric strings ("1.23")
pub(crate) fn number_like(value: Option<&serde_json::Value>) -> Option<f64> {
    match value? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Optional numeric field: absent, negative or non-finite becomes `default`
pub(crate) fn non_negative_or(value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        _ => default,
    }
}

/// Required price: present, finite and strictly positive
pub(crate) fn required_price(provider: &str, value: Option<f64>) -> SnapshotResult<f64> {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        Some(v) => Err(SnapshotError::mapping(provider, format!("invalid price: {}", v))),
        None => Err(SnapshotError::mapping(provider, "price missing or non-numeric")),
    }
}

/// Non-empty string or the placeholder
pub(crate) fn text_or(value: Option<&str>, default: &str) -> String {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}
