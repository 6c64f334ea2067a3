//! Ruster Pulse - token market snapshot lookup
//!
//! Resolves each address through the provider fallback chain and prints
//! the snapshot, its provenance and a heuristic analysis as JSON.
//!
//! Usage:
//!   ruster_pulse <address>...
//!
//! Environment: see `PulseConfig` (PULSE_*, DEXPAPRIKA_NETWORK, MORALIS_*),
//! RUST_LOG for log level (default: info). Logs go to stderr.

use eyre::{eyre, Result};
use futures_util::future::join_all;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use ruster_pulse::core::heuristic;
use ruster_pulse::{build_http_client, ProviderMux, PulseConfig, SnapshotCache};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let addresses: Vec<String> = std::env::args().skip(1).collect();
    if addresses.is_empty() {
        eprintln!("Usage: ruster_pulse <address>...");
        return Err(eyre!("no token address given"));
    }

    // Load configuration
    let config = PulseConfig::from_env().map_err(|e| eyre!("invalid configuration: {}", e))?;
    info!("⚙️ Providers: {}", config.provider_names().join(" -> "));

    let client = build_http_client().map_err(|e| eyre!("{}", e))?;
    let mux = Arc::new(ProviderMux::from_config(&config, client).map_err(|e| eyre!("{}", e))?);
    let cache = SnapshotCache::from_config(mux, &config);

    let lookups = addresses.iter().map(|address| {
        let cache = cache.clone();
        async move { (address, cache.get(address).await) }
    });

    let mut failures = 0usize;
    for (address, result) in join_all(lookups).await {
        match result {
            Ok(response) => {
                let analysis = response
                    .analysis
                    .unwrap_or_else(|| heuristic::analyze(&response.snapshot));
                let out = json!({
                    "address": address,
                    "snapshot": response.snapshot,
                    "provenance": response.provenance,
                    "analysis": analysis,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            }
            Err(e) => {
                failures += 1;
                error!("❌ {}: {}", address, e);
                let out = json!({
                    "address": address,
                    "error": { "code": e.code(), "message": e.to_string() },
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            }
        }
    }

    let stats = cache.stats();
    info!(
        "📊 Done: {} ok, {} failed, {} cache misses",
        addresses.len() - failures,
        failures,
        stats.misses
    );

    if failures > 0 {
        return Err(eyre!("{} of {} lookups failed", failures, addresses.len()));
    }
    Ok(())
}
