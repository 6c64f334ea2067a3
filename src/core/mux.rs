//! Provider Mux
//!
//! Tries the configured providers strictly in order, each under a bounded
//! request, and returns the first valid snapshot. No racing: one upstream
//! call at a time bounds cost and avoids duplicate upstream charges.
//!
//! TryPrimary -> TrySecondary(s) -> Fallback -> Done
//!
//! Failures (timeout, provider failure, mapping error) are recorded as
//! provenance attempts and never surfaced individually. When every
//! candidate fails, the heuristic engine runs on the prior snapshot for the
//! address if the caller has one; otherwise the request fails with
//! `NoDataAvailable`.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use super::heuristic;
use crate::models::config::PulseConfig;
use crate::models::errors::{SnapshotError, SnapshotResult};
use crate::models::types::{AttemptRecord, Provenance, Snapshot, SnapshotResponse, Stage};
use crate::providers::SnapshotProvider;
use crate::utils::bounded::{bounded_request, RequestBudget};
use crate::utils::constants::PROVIDER_HEURISTIC;

/// Timing policy for one mux run
#[derive(Debug, Clone, Copy)]
pub struct MuxPolicy {
    /// Per-provider attempt timeout
    pub provider_timeout: Duration,
    /// Retries per provider
    pub provider_retries: u32,
    /// Backoff base between retries
    pub backoff_base: Duration,
    /// End-to-end budget across all providers
    pub request_budget: Duration,
}

impl From<&PulseConfig> for MuxPolicy {
    fn from(config: &PulseConfig) -> Self {
        Self {
            provider_timeout: config.provider_timeout,
            provider_retries: config.provider_retries,
            backoff_base: config.backoff_base,
            request_budget: config.request_budget,
        }
    }
}

/// Ordered fallback across providers
pub struct ProviderMux {
    providers: Vec<Arc<dyn SnapshotProvider>>,
    policy: MuxPolicy,
}

impl ProviderMux {
    /// Providers must already be in priority order (first = primary)
    pub fn new(providers: Vec<Arc<dyn SnapshotProvider>>, policy: MuxPolicy) -> Self {
        Self { providers, policy }
    }

    /// Build providers from config, in configured order.
    ///
    /// Fails when no configured provider can be built (e.g. moralis alone
    /// without an API key).
    pub fn from_config(config: &PulseConfig, client: reqwest::Client) -> SnapshotResult<Self> {
        let providers = crate::providers::build_providers(config, client);
        if providers.is_empty() {
            return Err(SnapshotError::InvalidConfig(format!(
                "no usable provider among [{}]",
                config.provider_names().join(", ")
            )));
        }
        Ok(Self::new(providers, MuxPolicy::from(config)))
    }

    /// Provider names in priority order
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn policy(&self) -> MuxPolicy {
        self.policy
    }

    /// Run the state machine for `address`.
    ///
    /// `prior` is the last stored snapshot for the address, used only if
    /// every provider fails.
    pub async fn fetch(
        &self,
        address: &str,
        prior: Option<&Snapshot>,
    ) -> SnapshotResult<SnapshotResponse> {
        let started = Instant::now();
        let deadline = started + self.policy.request_budget;
        let mut attempts: Vec<AttemptRecord> = Vec::new();

        for (index, provider) in self.providers.iter().enumerate() {
            let name = provider.name();
            if Instant::now() >= deadline {
                warn!(provider = name, address, "⏱️ Request budget exhausted, skipping");
                attempts.push(AttemptRecord::from_error(
                    name,
                    &SnapshotError::Timeout {
                        timeout_ms: self.policy.request_budget.as_millis() as u64,
                    },
                    0,
                ));
                continue;
            }

            let budget = RequestBudget::new(
                self.policy.provider_timeout,
                self.policy.provider_retries,
                self.policy.backoff_base,
            )
            .with_deadline(deadline);

            let attempt_started = Instant::now();
            let outcome = bounded_request(budget, || provider.fetch_snapshot(address))
                .await
                .and_then(|snapshot| snapshot.validate().map(|_| snapshot));
            let latency_ms = attempt_started.elapsed().as_millis() as u64;

            match outcome {
                Ok(snapshot) => {
                    let stage = if index == 0 { Stage::Primary } else { Stage::Fallback };
                    info!(
                        provider = name,
                        address,
                        latency_ms,
                        "✅ Snapshot from {} ({})",
                        name,
                        stage.as_str()
                    );
                    let mut provenance = Provenance::new(name, stage, latency_ms);
                    provenance.attempts = attempts;
                    return Ok(SnapshotResponse {
                        snapshot,
                        provenance,
                        analysis: None,
                    });
                }
                Err(e) => {
                    if e.is_mapping() {
                        error!(provider = name, address, code = e.code(), "❌ Mapping error: {}", e);
                    } else {
                        warn!(provider = name, address, code = e.code(), latency_ms, "⚠️ Provider failed: {}", e);
                    }
                    attempts.push(AttemptRecord::from_error(name, &e, latency_ms));
                }
            }
        }

        self.fallback(address, prior, attempts, started)
    }

    fn fallback(
        &self,
        address: &str,
        prior: Option<&Snapshot>,
        attempts: Vec<AttemptRecord>,
        started: Instant,
    ) -> SnapshotResult<SnapshotResponse> {
        let Some(prior) = prior.filter(|s| s.validate().is_ok()) else {
            warn!(address, failed = attempts.len(), "📭 All providers failed, no prior snapshot");
            return Err(SnapshotError::NoDataAvailable {
                address: address.to_string(),
            });
        };

        let analysis = heuristic::analyze(prior);
        let mut provenance = Provenance::new(
            PROVIDER_HEURISTIC,
            Stage::Heuristic,
            started.elapsed().as_millis() as u64,
        );
        provenance.age_ms = Some(
            (chrono::Utc::now().timestamp_millis() - prior.captured_at_ms).max(0) as u64,
        );
        provenance.attempts = attempts;

        info!(
            address,
            source_provider = prior.provider.as_str(),
            "🧮 All providers failed, serving heuristic from prior snapshot"
        );

        Ok(SnapshotResponse {
            snapshot: prior.clone(),
            provenance,
            analysis: Some(analysis),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    enum Behavior {
        Ok(f64),
        Fail,
        Slow(Duration),
        BadPrice,
    }

    struct Scripted {
        name: &'static str,
        behavior: Behavior,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(name: &'static str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                name,
                behavior,
                calls: AtomicU32::new(0),
            })
        }
    }

    fn snap(provider: &str, price: f64) -> Snapshot {
        Snapshot {
            address: "0xabc".to_string(),
            symbol: "ABC".to_string(),
            name: "Abc".to_string(),
            price,
            high_24h: price * 1.1,
            low_24h: price * 0.9,
            volume_24h: 1.0,
            liquidity: 1.0,
            captured_at_ms: 0,
            provider: provider.to_string(),
        }
    }

    #[async_trait]
    impl SnapshotProvider for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch_snapshot(&self, _address: &str) -> SnapshotResult<Snapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Ok(price) => Ok(snap(self.name, *price)),
                Behavior::Fail => Err(SnapshotError::provider(self.name, "HTTP error: 503")),
                Behavior::Slow(delay) => {
                    tokio::time::sleep(*delay).await;
                    Ok(snap(self.name, 1.0))
                }
                Behavior::BadPrice => Ok(snap(self.name, -1.0)),
            }
        }
    }

    fn dynv(list: Vec<Arc<Scripted>>) -> Vec<Arc<dyn SnapshotProvider>> {
        list.into_iter()
            .map(|p| p as Arc<dyn SnapshotProvider>)
            .collect()
    }

    fn policy(timeout_ms: u64, retries: u32) -> MuxPolicy {
        MuxPolicy {
            provider_timeout: Duration::from_millis(timeout_ms),
            provider_retries: retries,
            backoff_base: Duration::from_millis(5),
            request_budget: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_primary_success() {
        let primary = Scripted::new("primary", Behavior::Ok(2.0));
        let secondary = Scripted::new("secondary", Behavior::Ok(3.0));
        let mux = ProviderMux::new(dynv(vec![primary, secondary.clone()]), policy(500, 1));

        let res = mux.fetch("0xabc", None).await.unwrap();
        assert_eq!(res.provenance.stage, Stage::Primary);
        assert_eq!(res.provenance.provider, "primary");
        assert_eq!(res.snapshot.price, 2.0);
        assert!(res.analysis.is_none());
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_timeout_advances_to_fallback() {
        let primary = Scripted::new("primary", Behavior::Slow(Duration::from_millis(2000)));
        let secondary = Scripted::new("secondary", Behavior::Ok(3.0));
        let mux = ProviderMux::new(dynv(vec![primary, secondary]), policy(50, 0));

        let res = mux.fetch("0xabc", None).await.unwrap();
        assert!(res.provenance.from_fallback());
        assert!(!res.provenance.from_cache());
        assert_eq!(res.provenance.attempts.len(), 1);
        assert_eq!(res.provenance.attempts[0].code, "TIMEOUT");
    }

    #[tokio::test]
    async fn test_failure_retried_once_then_advances() {
        let primary = Scripted::new("primary", Behavior::Fail);
        let secondary = Scripted::new("secondary", Behavior::Ok(3.0));
        let mux = ProviderMux::new(dynv(vec![primary.clone(), secondary]), policy(500, 1));

        let res = mux.fetch("0xabc", None).await.unwrap();
        assert_eq!(primary.calls.load(Ordering::SeqCst), 2);
        assert_eq!(res.provenance.provider, "secondary");
        assert_eq!(res.provenance.attempts[0].code, "PROVIDER_FAILURE");
    }

    #[tokio::test]
    async fn test_invalid_snapshot_is_mapping_error_and_advances() {
        let primary = Scripted::new("primary", Behavior::BadPrice);
        let secondary = Scripted::new("secondary", Behavior::Ok(3.0));
        let mux = ProviderMux::new(dynv(vec![primary, secondary]), policy(500, 0));

        let res = mux.fetch("0xabc", None).await.unwrap();
        assert!(res.snapshot.price >= 0.0);
        assert_eq!(res.provenance.attempts[0].code, "MAPPING_ERROR");
    }

    #[tokio::test]
    async fn test_exhaustion_without_prior_is_no_data() {
        let mux = ProviderMux::new(
            dynv(vec![Scripted::new("a", Behavior::Fail), Scripted::new("b", Behavior::Fail)]),
            policy(100, 0),
        );
        let err = mux.fetch("0xabc", None).await.unwrap_err();
        assert_eq!(err, SnapshotError::NoDataAvailable { address: "0xabc".to_string() });
    }

    #[tokio::test]
    async fn test_exhaustion_with_prior_uses_heuristic() {
        let mux = ProviderMux::new(dynv(vec![Scripted::new("a", Behavior::Fail)]), policy(100, 0));
        let prior = snap("a", 1.0);

        let res = mux.fetch("0xabc", Some(&prior)).await.unwrap();
        assert!(res.provenance.from_heuristic());
        assert_eq!(res.provenance.provider, "heuristic");
        assert_eq!(res.snapshot, prior);
        let analysis = res.analysis.unwrap();
        assert!((analysis.stop_loss - 0.95).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_no_providers_goes_straight_to_fallback() {
        let mux = ProviderMux::new(vec![], policy(100, 0));
        assert!(mux.fetch("0xabc", None).await.is_err());
    }

    #[tokio::test]
    async fn test_budget_exhaustion_skips_remaining() {
        let slow = Scripted::new("slow", Behavior::Slow(Duration::from_millis(2000)));
        let never = Scripted::new("never", Behavior::Ok(1.0));
        let mux = ProviderMux::new(
            dynv(vec![slow, never.clone()]),
            MuxPolicy {
                provider_timeout: Duration::from_millis(100),
                provider_retries: 0,
                backoff_base: Duration::from_millis(5),
                request_budget: Duration::from_millis(100),
            },
        );

        let err = mux.fetch("0xabc", None).await.unwrap_err();
        assert!(matches!(err, SnapshotError::NoDataAvailable { .. }));
        assert_eq!(never.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retries_stay_inside_request_budget() {
        let a = Scripted::new("a", Behavior::Slow(Duration::from_secs(10)));
        let b = Scripted::new("b", Behavior::Slow(Duration::from_secs(10)));
        let mux = ProviderMux::new(
            dynv(vec![a, b]),
            MuxPolicy {
                provider_timeout: Duration::from_millis(100),
                provider_retries: 1,
                backoff_base: Duration::from_millis(5),
                request_budget: Duration::from_millis(150),
            },
        );

        let started = Instant::now();
        let err = mux.fetch("0xabc", None).await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, SnapshotError::NoDataAvailable { .. }));
        assert!(elapsed < Duration::from_millis(190), "budget overrun: {:?}", elapsed);
    }

    #[test]
    fn test_from_config_without_usable_provider_fails() {
        let config = PulseConfig {
            providers: vec![crate::models::config::ProviderKind::Moralis],
            moralis_api_key: None,
            ..PulseConfig::default()
        };
        let err = ProviderMux::from_config(&config, reqwest::Client::new()).err().unwrap();
        assert_eq!(err.code(), "CFG_INVALID_VALUE");
        assert!(err.to_string().contains("moralis"));
    }
}
