//! Ruster Pulse API Server
//!
//! REST API for token market snapshots with provider fallback
//!
//! Usage:
//!   cargo run --bin ruster_pulse_api
//!
//! Environment:
//!   PORT / PULSE_PORT - Server port (default: 8080)
//!   PULSE_HOST        - Server host (default: 0.0.0.0)
//!   RUST_LOG          - Log level (default: info)
//!   PULSE_*, DEXPAPRIKA_NETWORK, MORALIS_* - see PulseConfig

use ruster_pulse::api::{create_router, handlers::AppState, start_cleanup_task};
use ruster_pulse::utils::constants::{APP_NAME, APP_VERSION};
use ruster_pulse::PulseConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    print_banner();

    // Configuration is resolved once and never changes afterwards
    let config = PulseConfig::from_env().map_err(|e| eyre::eyre!("invalid configuration: {}", e))?;
    info!("⚙️ {:?}", config);

    let state = Arc::new(AppState::from_config(&config).map_err(|e| eyre::eyre!("{}", e))?);
    let cache = state.cache.clone();

    // Start background cleanup task for rate limiter
    start_cleanup_task();
    info!("🧹 Background cleanup task started");

    // Create router
    let app = create_router(state);

    // PORT for hosted environments, PULSE_PORT for local dev
    let host = std::env::var("PULSE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("PULSE_PORT"))
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("🚀 {} API v{} starting on http://{}", APP_NAME, APP_VERSION, addr);
    info!("");
    info!("Endpoints:");
    info!("  GET    /v1/snapshot/:address  - Market snapshot + heuristic levels");
    info!("  POST   /v1/snapshots/batch    - Batch lookup (up to 50 addresses)");
    info!("  DELETE /v1/cache/:address     - Invalidate one cached snapshot");
    info!("  DELETE /v1/cache              - Clear the snapshot cache");
    info!("  GET    /v1/stats              - Cache statistics");
    info!("  GET    /v1/health             - Health check");
    info!("");
    info!("Press Ctrl+C for graceful shutdown");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("");
    info!("🛑 Shutdown signal received");
    let stats = cache.stats();
    info!("   Cached entries: {}", stats.entries);
    info!("   Hit rate: {:.1}%", stats.hit_rate);
    info!("   Refresh failures: {}", stats.refresh_failures);
    info!("👋 {} API shutdown complete", APP_NAME);

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    ╔══════════════════════════════════════════════╗
    ║                                              ║
    ║          R U S T E R   P U L S E             ║
    ║                                              ║
    ║       Token Market Snapshot API v0.1.0       ║
    ║   Provider fallback · SWR cache · heuristic  ║
    ║                                              ║
    ╚══════════════════════════════════════════════╝
    "#
    );
}
