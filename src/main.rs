// =============================================================================
// STOCK PRICING SERVICE - Main Entry Point
// =============================================================================
// This is the main entry point for the stock-based pricing service.
//
// WHAT THIS SERVICE DOES:
// - Adjusts a product's price by its current stock level (LOW / MEDIUM /
//   HIGH / NORMAL tiers with configurable percentages)
// - Applies the adjustment only where a storefront or cart price is shown,
//   and always from the stored regular price so adjustments never compound
// - Stores the pricing settings record in PostgreSQL, cached in Redis
// - Exposes Prometheus metrics for observability
// =============================================================================

// -----------------------------------------------------------------------------
// MODULE DECLARATIONS
// -----------------------------------------------------------------------------
mod config;     // Environment configuration (config.rs)
mod db;         // Catalog and settings storage (db.rs)
mod dispatch;   // Per-site adjustment policy (dispatch.rs)
mod error;      // Error types (error.rs)
mod handlers;   // HTTP request handlers (handlers.rs)
mod messaging;  // Customer notices (messaging.rs)
mod metrics;    // Prometheus metrics setup (metrics.rs)
mod models;     // Data structures (models.rs)
mod pricing;    // Tier resolver and price adjuster (pricing.rs)
mod settings;   // PricingConfig ingestion (settings.rs)

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::metrics::setup_metrics;

// -----------------------------------------------------------------------------
// APPLICATION STATE
// -----------------------------------------------------------------------------
// Shared, read-only state available to all request handlers. There is no
// cached PricingConfig here: each request loads it once and passes it down.
#[derive(Clone)]
pub struct AppState {
    /// Catalog and settings storage
    pub db: Database,

    /// Redis connection for the settings cache
    pub redis: redis::aio::ConnectionManager,

    /// Prometheus metrics handle
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,

    /// Name of the persisted settings record
    pub settings_key: String,

    /// Token required for settings changes (None: read-only)
    pub admin_token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -------------------------------------------------------------------------
    // STEP 1: Load environment variables
    // -------------------------------------------------------------------------
    dotenvy::dotenv().ok();

    // -------------------------------------------------------------------------
    // STEP 2: Initialize logging/tracing
    // -------------------------------------------------------------------------
    // Example: RUST_LOG=info,stock_pricing_service=debug
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,stock_pricing_service=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Stock Pricing Service...");

    // -------------------------------------------------------------------------
    // STEP 3: Load configuration
    // -------------------------------------------------------------------------
    let config = Config::from_env()?;
    info!(
        port = config.port,
        settings_key = %config.settings_key,
        settings_writable = config.admin_token.is_some(),
        "Configuration loaded"
    );

    // -------------------------------------------------------------------------
    // STEP 4: Set up Prometheus metrics
    // -------------------------------------------------------------------------
    let metrics_handle = setup_metrics()?;
    info!("Prometheus metrics initialized");

    // -------------------------------------------------------------------------
    // STEP 5: Connect to PostgreSQL database
    // -------------------------------------------------------------------------
    let db = Database::connect(&config.database_url).await?;
    info!("Connected to PostgreSQL");

    db.run_migrations().await?;
    info!("Database migrations completed");

    // -------------------------------------------------------------------------
    // STEP 6: Connect to Redis
    // -------------------------------------------------------------------------
    let redis_client = redis::Client::open(config.redis_url.as_str())?;
    let redis_conn = redis::aio::ConnectionManager::new(redis_client).await?;
    info!("Connected to Redis");

    // -------------------------------------------------------------------------
    // STEP 7: Create application state
    // -------------------------------------------------------------------------
    let state = Arc::new(AppState {
        db,
        redis: redis_conn,
        metrics_handle,
        settings_key: config.settings_key.clone(),
        admin_token: config.admin_token.clone(),
    });

    // -------------------------------------------------------------------------
    // STEP 8: Define routes
    // -------------------------------------------------------------------------
    let app = Router::new()
        // ----- Health & Readiness Endpoints -----
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))

        // ----- Metrics Endpoint -----
        .route("/metrics", get(handlers::metrics_handler))

        // ----- Settings -----
        .route(
            "/api/v1/settings",
            get(handlers::get_settings)
                .put(handlers::update_settings)
                .delete(handlers::delete_settings),
        )

        // ----- Catalog -----
        .route(
            "/api/v1/products",
            get(handlers::list_products).post(handlers::upsert_product),
        )
        .route("/api/v1/products/:sku", get(handlers::get_product))
        .route("/api/v1/products/:sku/stock", post(handlers::adjust_stock))

        // ----- Pricing -----
        .route("/api/v1/products/:sku/price", get(handlers::get_price))
        .route("/api/v1/products/:sku/notice", get(handlers::get_notice))
        .route("/api/v1/cart/quote", post(handlers::quote_cart))

        // ----- Middleware Layers -----
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // -------------------------------------------------------------------------
    // STEP 9: Start the HTTP server
    // -------------------------------------------------------------------------
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(address = %addr, "Stock Pricing Service is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
