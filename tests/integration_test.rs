//! Integration tests for Ruster Pulse
//!
//! Scripted in-process providers only, no network.

use approx::assert_relative_eq;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use ruster_pulse::api::{create_router, handlers::AppState};
use ruster_pulse::utils::constants::{APP_NAME, APP_VERSION, MAX_LEVEL_DEVIATION};
use ruster_pulse::{
    analyze, bounded_request, MuxPolicy, ProviderMux, PulseConfig, RequestBudget, Snapshot,
    SnapshotCache, SnapshotError, SnapshotProvider, SnapshotResult, Stage,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;

const TOKEN: &str = "0x6982508145454ce325ddbe47a25d4ec3d2311933";

/// Provider with a fixed price, optional delay and a failure switch
struct FakeProvider {
    name: &'static str,
    price: f64,
    delay: Duration,
    down: AtomicBool,
    calls: AtomicU32,
}

impl FakeProvider {
    fn new(name: &'static str, price: f64, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name,
            price,
            delay,
            down: AtomicBool::new(false),
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl SnapshotProvider for FakeProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_snapshot(&self, address: &str) -> SnapshotResult<Snapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.down.load(Ordering::SeqCst) {
            return Err(SnapshotError::provider(self.name, "HTTP error: 503"));
        }
        Ok(Snapshot {
            address: address.to_string(),
            symbol: "PEPE".to_string(),
            name: "Pepe".to_string(),
            price: self.price,
            high_24h: self.price * 1.1,
            low_24h: self.price * 0.9,
            volume_24h: 1_000_000.0,
            liquidity: 5_000_000.0,
            captured_at_ms: chrono::Utc::now().timestamp_millis(),
            provider: self.name.to_string(),
        })
    }
}

fn policy(timeout_ms: u64) -> MuxPolicy {
    MuxPolicy {
        provider_timeout: Duration::from_millis(timeout_ms),
        provider_retries: 0,
        backoff_base: Duration::from_millis(10),
        request_budget: Duration::from_secs(5),
    }
}

fn mux_of(providers: &[Arc<FakeProvider>], timeout_ms: u64) -> Arc<ProviderMux> {
    let providers: Vec<Arc<dyn SnapshotProvider>> = providers
        .iter()
        .map(|p| p.clone() as Arc<dyn SnapshotProvider>)
        .collect();
    Arc::new(ProviderMux::new(providers, policy(timeout_ms)))
}

#[tokio::test]
async fn test_bounded_request_times_out_at_budget_not_operation() {
    let budget = RequestBudget::new(Duration::from_millis(100), 0, Duration::from_millis(10));
    let started = Instant::now();

    let result: SnapshotResult<()> = bounded_request(budget, || async {
        tokio::time::sleep(Duration::from_millis(2000)).await;
        Ok(())
    })
    .await;

    let elapsed = started.elapsed();
    assert!(matches!(result, Err(SnapshotError::Timeout { timeout_ms: 100 })));
    assert!(elapsed >= Duration::from_millis(90), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1000), "elapsed {:?}", elapsed);
}

#[tokio::test]
async fn test_slow_primary_marks_result_as_fallback() {
    let primary = FakeProvider::new("dexpaprika", 1.0, Duration::from_millis(500));
    let secondary = FakeProvider::new("moralis", 2.0, Duration::ZERO);
    let mux = mux_of(&[primary.clone(), secondary.clone()], 50);

    let res = mux.fetch(TOKEN, None).await.unwrap();
    assert!(res.provenance.from_fallback());
    assert!(!res.provenance.from_cache());
    assert_eq!(res.provenance.provider, "moralis");
    assert_eq!(res.provenance.attempts.len(), 1);
    assert_eq!(res.provenance.attempts[0].code, "TIMEOUT");
    assert_relative_eq!(res.snapshot.price, 2.0);
}

#[tokio::test]
async fn test_providers_are_tried_one_at_a_time() {
    let primary = FakeProvider::new("dexpaprika", 1.0, Duration::ZERO);
    let secondary = FakeProvider::new("moralis", 2.0, Duration::ZERO);
    let mux = mux_of(&[primary.clone(), secondary.clone()], 200);

    let res = mux.fetch(TOKEN, None).await.unwrap();
    assert_eq!(res.provenance.stage, Stage::Primary);
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 0);
}

#[tokio::test]
async fn test_all_down_without_history_is_no_data() {
    let a = FakeProvider::new("dexpaprika", 1.0, Duration::ZERO);
    let b = FakeProvider::new("moralis", 1.0, Duration::ZERO);
    a.set_down(true);
    b.set_down(true);

    let cache = SnapshotCache::new(
        mux_of(&[a, b], 100),
        Duration::from_secs(300),
        Duration::from_secs(1800),
    );

    let err = cache.get(TOKEN).await.unwrap_err();
    assert!(matches!(err, SnapshotError::NoDataAvailable { .. }));
    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn test_immediate_second_get_is_served_from_cache() {
    let provider = FakeProvider::new("dexpaprika", 1.0, Duration::ZERO);
    let cache = SnapshotCache::new(
        mux_of(&[provider.clone()], 100),
        Duration::from_secs(300),
        Duration::from_secs(1800),
    );

    cache.get(TOKEN).await.unwrap();
    let again = cache.get(TOKEN).await.unwrap();

    assert_eq!(provider.calls(), 1);
    assert!(again.provenance.from_cache());
    assert!(again.provenance.age_ms.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cold_gets_hit_upstream_once() {
    let provider = FakeProvider::new("dexpaprika", 1.0, Duration::from_millis(150));
    let cache = SnapshotCache::new(
        mux_of(&[provider.clone()], 1000),
        Duration::from_secs(300),
        Duration::from_secs(1800),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get(TOKEN).await })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
    assert_eq!(provider.calls(), 1);
    assert!(!cache.is_in_flight(TOKEN));
}

#[tokio::test]
async fn test_outage_after_expiry_serves_heuristic_from_last_snapshot() {
    let provider = FakeProvider::new("dexpaprika", 1.0, Duration::ZERO);
    let cache = SnapshotCache::new(
        mux_of(&[provider.clone()], 100),
        Duration::from_millis(10),
        Duration::from_millis(20),
    );

    cache.get(TOKEN).await.unwrap();
    provider.set_down(true);
    tokio::time::sleep(Duration::from_millis(40)).await;

    let res = cache.get(TOKEN).await.unwrap();
    assert_eq!(res.provenance.stage, Stage::Heuristic);
    assert_eq!(res.provenance.provider, "heuristic");

    let analysis = res.analysis.unwrap();
    assert_relative_eq!(analysis.stop_loss, 0.95);
    assert_relative_eq!(analysis.take_profit[0], 1.05);
}

#[test]
fn test_heuristic_reference_scenario() {
    let snapshot = Snapshot {
        address: TOKEN.to_string(),
        symbol: "PEPE".to_string(),
        name: "Pepe".to_string(),
        price: 1.0,
        high_24h: 1.1,
        low_24h: 0.9,
        volume_24h: 0.0,
        liquidity: 0.0,
        captured_at_ms: 0,
        provider: "dexpaprika".to_string(),
    };

    let result = analyze(&snapshot);
    assert_relative_eq!(result.stop_loss, 0.95);
    assert_relative_eq!(result.take_profit[0], 1.05);
    for level in &result.levels {
        let off = (level.price - 1.0).abs() / 1.0;
        assert!(off <= MAX_LEVEL_DEVIATION, "{} at {} off by {}", level.label, level.price, off);
    }
}

#[test]
fn test_config_rejects_inverted_ttls() {
    let err = PulseConfig::from_lookup(|key| match key {
        "PULSE_FRESH_TTL_SECS" => Some("600".to_string()),
        "PULSE_STALE_TTL_SECS" => Some("60".to_string()),
        _ => None,
    })
    .unwrap_err();
    assert_eq!(err.code(), "CFG_INVALID_VALUE");
}

// ============================================
// HTTP surface
// ============================================

fn app_with(provider: Arc<FakeProvider>) -> axum::Router {
    let cache = SnapshotCache::new(
        mux_of(&[provider], 200),
        Duration::from_secs(300),
        Duration::from_secs(1800),
    );
    create_router(Arc::new(AppState::new(cache)))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_http_snapshot_includes_provenance_and_analysis() {
    let provider = FakeProvider::new("dexpaprika", 1.0, Duration::ZERO);
    let app = app_with(provider);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/v1/snapshot/{}", TOKEN))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["provenance"]["stage"], "primary");
    assert_eq!(body["data"]["analysis"]["levels"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_http_health_reports_service_and_version() {
    let provider = FakeProvider::new("dexpaprika", 1.0, Duration::ZERO);
    let app = app_with(provider);

    let response = app
        .oneshot(Request::builder().uri("/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["service"], APP_NAME);
    assert_eq!(body["data"]["version"], APP_VERSION);
    assert_eq!(body["data"]["status"], "healthy");
}

#[tokio::test]
async fn test_http_invalid_address_is_bad_request() {
    let provider = FakeProvider::new("dexpaprika", 1.0, Duration::ZERO);
    let app = app_with(provider.clone());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/snapshot/not-an-address")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_http_no_data_is_not_found() {
    let provider = FakeProvider::new("dexpaprika", 1.0, Duration::ZERO);
    provider.set_down(true);
    let app = app_with(provider);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/v1/snapshot/{}", TOKEN))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NO_DATA_AVAILABLE");
}

#[tokio::test]
async fn test_http_batch_collapses_duplicates_and_reports_errors() {
    let provider = FakeProvider::new("dexpaprika", 1.0, Duration::from_millis(50));
    let app = app_with(provider.clone());

    let payload = serde_json::json!({
        "addresses": [TOKEN, TOKEN.to_uppercase().replacen("0X", "0x", 1), "bogus"]
    });
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/v1/snapshots/batch")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["total_requested"], 3);
    assert_eq!(body["data"]["total_succeeded"], 2);
    assert_eq!(body["data"]["total_failed"], 1);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_http_clear_cache_forces_refetch() {
    let provider = FakeProvider::new("dexpaprika", 1.0, Duration::ZERO);
    let app = app_with(provider.clone());

    let get = || {
        Request::builder()
            .uri(format!("/v1/snapshot/{}", TOKEN))
            .body(Body::empty())
            .unwrap()
    };

    app.clone().oneshot(get()).await.unwrap();
    app.clone().oneshot(get()).await.unwrap();
    assert_eq!(provider.calls(), 1);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri(format!("/v1/cache/{}", TOKEN))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    app.oneshot(get()).await.unwrap();
    assert_eq!(provider.calls(), 2);
}
