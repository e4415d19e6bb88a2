//! local-pricing HTTP Server
//!
//! Axum-based server exposing the checkout hooks of the local pricing
//! add-on, the AJAX price fragment, and the checkout script.

mod handlers;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::{get, post}, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use local_pricing::{
    exchange::OpenExchangeRates,
    geo::{DisabledGeoIp, MaxMindCountryReader},
    hooks::AJAX_ACTION,
    CheckoutHost, GeoIpLookup, LocalPricingHooks, MemorySessionStore, PricingConfig,
    SessionStore, StaticLevelCatalog,
};

use crate::handlers::{
    after_checkout, check_discount_code, checkout_preheader, enqueue_scripts, health_check,
    level_cost_text, local_cost_text, plugin_row_meta, privacy_policy, registration_checks,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = PricingConfig::from_env()?;

    // GeoIP
    let geoip: Arc<dyn GeoIpLookup> = match &config.geoip_db {
        Some(path) => match MaxMindCountryReader::open(path) {
            Ok(reader) => {
                tracing::info!("✓ GeoIP database loaded from {}", path.display());
                Arc::new(reader)
            }
            Err(e) => {
                tracing::warn!("⚠ GeoIP database unavailable: {} - local pricing disabled", e);
                Arc::new(DisabledGeoIp)
            }
        },
        None => {
            tracing::warn!("⚠ LOCAL_PRICING_GEOIP_DB not set - local pricing disabled");
            Arc::new(DisabledGeoIp)
        }
    };

    // Exchange rates
    let app_id_configured = config.app_id.is_some();
    if !app_id_configured {
        tracing::warn!("⚠ LOCAL_PRICING_APP_ID not set - rate lookups will fail");
    }
    let rates = Arc::new(OpenExchangeRates::with_endpoint(
        config.rates_url.clone(),
        config.app_id.clone().unwrap_or_default(),
    ));
    tracing::info!("Exchange rates from {} (cached {}s)", rates.endpoint(), config.rate_ttl_secs);

    // Levels
    let catalog = match &config.levels_file {
        Some(path) => StaticLevelCatalog::from_json_file(&config.site_currency, path)?,
        None => {
            tracing::warn!("⚠ LOCAL_PRICING_LEVELS_FILE not set - no levels to price");
            StaticLevelCatalog::new(&config.site_currency)
        }
    };
    tracing::info!(
        "Site currency {} with {} level(s), {} regional code(s)",
        config.site_currency,
        catalog.level_count(),
        config.discounts.len()
    );
    let host: Arc<dyn CheckoutHost> = Arc::new(catalog);

    let hooks = LocalPricingHooks::from_config(&config, host, geoip, rates);

    let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    spawn_session_sweeper(sessions.clone(), Duration::from_secs(config.session_ttl_secs));

    let state = AppState {
        hooks: Arc::new(hooks),
        sessions,
        app_id_configured,
        ajax_url: format!("/ajax/{AJAX_ACTION}"),
    };

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 local-pricing server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                          - Health check");
    tracing::info!("  POST /hooks/checkout-preheader        - Resolve visitor country");
    tracing::info!("  POST /hooks/level-cost-text           - Append local price");
    tracing::info!("  POST /hooks/check-discount-code       - Gate regional codes");
    tracing::info!("  POST /hooks/registration-checks       - Gate regional codes on submit");
    tracing::info!("  GET  /ajax/{}", AJAX_ACTION);
    tracing::info!("");

    axum::serve(listener, app(state).into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

/// Periodically drop checkout sessions idle for longer than `max_idle`
fn spawn_session_sweeper(sessions: Arc<dyn SessionStore>, max_idle: Duration) {
    let period = max_idle.min(Duration::from_secs(60));

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match sessions.purge_idle(max_idle) {
                Ok(0) => {}
                Ok(purged) => tracing::debug!("Purged {} idle checkout session(s)", purged),
                Err(e) => tracing::warn!("Session sweep failed: {}", e),
            }
        }
    });
}

fn app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let ajax_path = format!("/ajax/{AJAX_ACTION}");

    Router::new()
        // Health
        .route("/health", get(health_check))

        // Checkout hooks
        .route("/hooks/checkout-preheader", post(checkout_preheader))
        .route("/hooks/level-cost-text", post(level_cost_text))
        .route("/hooks/check-discount-code", post(check_discount_code))
        .route("/hooks/registration-checks", post(registration_checks))
        .route("/hooks/after-checkout", post(after_checkout))
        .route("/hooks/enqueue-scripts", get(enqueue_scripts))

        // Admin hooks
        .route("/hooks/privacy-policy", get(privacy_policy))
        .route("/hooks/plugin-row-meta", post(plugin_row_meta))

        // AJAX price fragment, open to guests
        .route(&ajax_path, get(local_cost_text).post(local_cost_text))

        // Checkout script
        .nest_service("/js", ServeDir::new("static/js"))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
