//! Configuration module for Ruster Pulse
//!
//! Resolved once at process start and shared read-only afterwards.
//! Defaults come from utils/constants.rs, overrides from the environment.

use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use super::errors::{SnapshotError, SnapshotResult};
use crate::utils::constants::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_DEXPAPRIKA_NETWORK, DEFAULT_FRESH_TTL_SECS,
    DEFAULT_MORALIS_CHAIN, DEFAULT_PROVIDER_RETRIES, DEFAULT_PROVIDER_TIMEOUT_MS,
    DEFAULT_REQUEST_BUDGET_MS, DEFAULT_STALE_TTL_SECS, MAX_PROVIDER_RETRIES,
    PROVIDER_DEXPAPRIKA, PROVIDER_DEXSCREENER, PROVIDER_MORALIS,
};

/// Supported upstream providers (closed set).
///
/// Fallback order is configuration, so this is an enum rather than a plugin registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    DexPaprika,
    Moralis,
    DexScreener,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [Self::DexPaprika, Self::Moralis, Self::DexScreener];

    /// Provider name used in config, logs and provenance
    pub fn name(&self) -> &'static str {
        match self {
            Self::DexPaprika => PROVIDER_DEXPAPRIKA,
            Self::Moralis => PROVIDER_MORALIS,
            Self::DexScreener => PROVIDER_DEXSCREENER,
        }
    }
}

impl FromStr for ProviderKind {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            PROVIDER_DEXPAPRIKA => Ok(Self::DexPaprika),
            PROVIDER_MORALIS => Ok(Self::Moralis),
            PROVIDER_DEXSCREENER => Ok(Self::DexScreener),
            other => Err(SnapshotError::InvalidConfig(format!(
                "Unknown provider: {}",
                other
            ))),
        }
    }
}

/// Immutable retrieval configuration
#[derive(Clone)]
pub struct PulseConfig {
    /// Enabled providers in priority order (first = primary)
    pub providers: Vec<ProviderKind>,

    /// Timeout for a single provider attempt
    pub provider_timeout: Duration,

    /// Retries per provider after the first attempt (0 or 1)
    pub provider_retries: u32,

    /// Exponential backoff base between retries
    pub backoff_base: Duration,

    /// End-to-end budget for trying all providers
    pub request_budget: Duration,

    /// Served from cache without refresh below this age
    pub fresh_ttl: Duration,

    /// Served stale with background refresh below this age
    pub stale_ttl: Duration,

    /// DexPaprika network slug (e.g. "ethereum", "solana")
    pub dexpaprika_network: String,

    /// Moralis chain slug (e.g. "eth", "bsc")
    pub moralis_chain: String,

    /// Moralis API key. Never logged.
    pub moralis_api_key: Option<String>,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            providers: ProviderKind::ALL.to_vec(),
            provider_timeout: Duration::from_millis(DEFAULT_PROVIDER_TIMEOUT_MS),
            provider_retries: DEFAULT_PROVIDER_RETRIES,
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
            request_budget: Duration::from_millis(DEFAULT_REQUEST_BUDGET_MS),
            fresh_ttl: Duration::from_secs(DEFAULT_FRESH_TTL_SECS),
            stale_ttl: Duration::from_secs(DEFAULT_STALE_TTL_SECS),
            dexpaprika_network: DEFAULT_DEXPAPRIKA_NETWORK.to_string(),
            moralis_chain: DEFAULT_MORALIS_CHAIN.to_string(),
            moralis_api_key: None,
        }
    }
}

impl std::fmt::Debug for PulseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseConfig")
            .field("providers", &self.providers)
            .field("provider_timeout", &self.provider_timeout)
            .field("provider_retries", &self.provider_retries)
            .field("backoff_base", &self.backoff_base)
            .field("request_budget", &self.request_budget)
            .field("fresh_ttl", &self.fresh_ttl)
            .field("stale_ttl", &self.stale_ttl)
            .field("dexpaprika_network", &self.dexpaprika_network)
            .field("moralis_chain", &self.moralis_chain)
            .field("moralis_api_key", &self.moralis_api_key.as_ref().map(|_| "***HIDDEN***"))
            .finish()
    }
}

impl PulseConfig {
    /// Resolve configuration from the environment, then validate it
    pub fn from_env() -> SnapshotResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> SnapshotResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let providers = match lookup("PULSE_PROVIDERS") {
            Some(list) => parse_provider_list(&list)?,
            None => defaults.providers,
        };

        let config = Self {
            providers,
            provider_timeout: lookup_millis(&lookup, "PULSE_PROVIDER_TIMEOUT_MS")?
                .unwrap_or(defaults.provider_timeout),
            provider_retries: match lookup_number(&lookup, "PULSE_PROVIDER_RETRIES")? {
                Some(n) => u32::try_from(n).map_err(|_| {
                    SnapshotError::InvalidConfig(format!("PULSE_PROVIDER_RETRIES out of range: {}", n))
                })?,
                None => defaults.provider_retries,
            },
            backoff_base: lookup_millis(&lookup, "PULSE_BACKOFF_BASE_MS")?
                .unwrap_or(defaults.backoff_base),
            request_budget: lookup_millis(&lookup, "PULSE_REQUEST_BUDGET_MS")?
                .unwrap_or(defaults.request_budget),
            fresh_ttl: lookup_number(&lookup, "PULSE_FRESH_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.fresh_ttl),
            stale_ttl: lookup_number(&lookup, "PULSE_STALE_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.stale_ttl),
            dexpaprika_network: lookup("DEXPAPRIKA_NETWORK")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.dexpaprika_network),
            moralis_chain: lookup("MORALIS_CHAIN")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.moralis_chain),
            moralis_api_key: lookup("MORALIS_API_KEY")
                .filter(|k| !k.is_empty() && k != "YOUR_API_KEY"),
        };

        if config.moralis_api_key.is_some() {
            info!("🔑 MORALIS_API_KEY configured (key hidden)");
        } else if config.providers.contains(&ProviderKind::Moralis) {
            warn!("⚠️ MORALIS_API_KEY not set, moralis will be skipped");
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> SnapshotResult<()> {
        if self.providers.is_empty() {
            return Err(SnapshotError::InvalidConfig(
                "at least one provider must be configured".to_string(),
            ));
        }
        if self.fresh_ttl >= self.stale_ttl {
            return Err(SnapshotError::InvalidConfig(format!(
                "fresh_ttl ({:?}) must be shorter than stale_ttl ({:?})",
                self.fresh_ttl, self.stale_ttl
            )));
        }
        if self.provider_timeout.is_zero() {
            return Err(SnapshotError::InvalidConfig(
                "provider_timeout must be positive".to_string(),
            ));
        }
        if self.provider_timeout >= self.request_budget {
            return Err(SnapshotError::InvalidConfig(format!(
                "provider_timeout ({:?}) must be shorter than request_budget ({:?})",
                self.provider_timeout, self.request_budget
            )));
        }
        if self.provider_retries > MAX_PROVIDER_RETRIES {
            return Err(SnapshotError::InvalidConfig(format!(
                "provider_retries must be at most {}, got {}",
                MAX_PROVIDER_RETRIES, self.provider_retries
            )));
        }
        Ok(())
    }

    /// Provider names in priority order
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}

/// Parse "a,b,c" keeping first occurrence of duplicates
fn parse_provider_list(list: &str) -> SnapshotResult<Vec<ProviderKind>> {
    let mut providers = Vec::new();
    for name in list.split(',').filter(|s| !s.trim().is_empty()) {
        let kind: ProviderKind = name.parse()?;
        if !providers.contains(&kind) {
            providers.push(kind);
        }
    }
    Ok(providers)
}

fn lookup_number<F>(lookup: &F, key: &str) -> SnapshotResult<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| SnapshotError::InvalidConfig(format!("{} is not a number: {}", key, raw))),
        None => Ok(None),
    }
}

fn lookup_millis<F>(lookup: &F, key: &str) -> SnapshotResult<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(lookup_number(lookup, key)?.map(Duration::from_millis))
}
