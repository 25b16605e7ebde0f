//! Upstat - uptime-monitoring aggregation and a cached public API.
//!
//! # API Endpoints
//!
//! - `GET /` - Self-describing API documentation
//! - `GET /api/monitors` - Aggregated monitor list with daily timelines
//! - `GET /api/stats` - Summary statistics over the monitor set
//! - `GET /api/incidents` - Recent down events across all monitors

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use upstat::config::Config;
use upstat::gateway::{Gateway, router};
use upstat::service::MonitorService;
use upstat::upstream::UptimeRobotClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with environment filter
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("upstat=info".parse()?))
        .init();

    // Load configuration from environment
    let config = Config::from_env();

    if config.upstream_api_keys.is_empty() {
        warn!("No upstream credential configured; data requests will fail until UPTIMEROBOT_API_KEY is set");
    }

    info!(
        port = config.port,
        credentials = config.upstream_api_keys.len(),
        rate_limit = config.gateway.rate_limit,
        cache_ttl_seconds = config.gateway.cache_ttl_seconds,
        require_api_key = config.gateway.require_api_key,
        "Starting Upstat gateway"
    );

    let client = match &config.upstream_url {
        Some(url) => UptimeRobotClient::with_base_url(url),
        None => UptimeRobotClient::new(),
    };
    let service = MonitorService::new(client, config.upstream_api_keys.clone());
    let gateway = Arc::new(Gateway::new(config.gateway.clone(), service));

    let app = router(gateway).layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Upstat is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
