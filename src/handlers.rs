// =============================================================================
// HANDLERS MODULE
// =============================================================================
// This module contains all HTTP request handlers (controller layer).
//
// LEARNING NOTES:
// - Handlers are async functions that receive requests and return responses
// - Axum uses "extractors" to parse request data (path params, JSON body, etc.)
// - Every pricing request loads the settings once and passes the resulting
//   PricingConfig by reference to the dispatch layer
// =============================================================================

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use subtle::ConstantTimeEq;

use crate::dispatch::{self, PriceQuote, PriceSite};
use crate::error::{AppError, AppResult};
use crate::messaging;
use crate::metrics;
use crate::models::*;
use crate::pricing;
use crate::settings::PricingConfig;
use crate::AppState;

/// Header carrying the admin token for settings changes
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// How long a loaded settings record stays in Redis
const SETTINGS_CACHE_TTL_SECS: u64 = 300;

// =============================================================================
// HEALTH CHECK ENDPOINTS
// =============================================================================

/// Liveness probe
///
/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "stock-pricing-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness probe: database and Redis must both answer
///
/// GET /ready
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReadinessResponse>, StatusCode> {
    let db_healthy = state.db.health_check().await;

    let redis_healthy = redis::cmd("PING")
        .query_async::<_, String>(&mut state.redis.clone())
        .await
        .is_ok();

    let all_healthy = db_healthy && redis_healthy;
    let status = if all_healthy { "ready" } else { "not_ready" };

    let response = ReadinessResponse {
        status: status.to_string(),
        checks: ReadinessChecks {
            database: db_healthy,
            redis: redis_healthy,
        },
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

/// Prometheus metrics endpoint
///
/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}

// =============================================================================
// SETTINGS LOADING
// =============================================================================
// Redis first, database second, defaults last. Cache problems are logged
// and skipped; pricing must not fail because the cache is down.

fn settings_cache_key(name: &str) -> String {
    format!("pricing:settings:{}", name)
}

/// Load the PricingConfig for this request
pub async fn load_pricing_config(state: &AppState) -> AppResult<PricingConfig> {
    let start = Instant::now();
    let cache_key = settings_cache_key(&state.settings_key);

    let cached: Option<String> = redis::cmd("GET")
        .arg(&cache_key)
        .query_async(&mut state.redis.clone())
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Settings cache read failed");
            None
        });
    metrics::record_redis_operation("get", start.elapsed().as_secs_f64());

    if let Some(cached_json) = cached {
        if let Ok(record) = serde_json::from_str::<Map<String, Value>>(&cached_json) {
            return Ok(PricingConfig::from_settings(&record));
        }
    }

    let start = Instant::now();
    let record = state.db.load_settings(&state.settings_key).await?;
    metrics::record_db_query("select", start.elapsed().as_secs_f64());

    let config = match record {
        Some(record) => PricingConfig::from_settings(&record),
        None => PricingConfig::default(),
    };

    let record_json = serde_json::to_string(&config.to_settings()).unwrap_or_default();
    let cache_result: Result<(), _> = redis::cmd("SETEX")
        .arg(&cache_key)
        .arg(SETTINGS_CACHE_TTL_SECS)
        .arg(&record_json)
        .query_async(&mut state.redis.clone())
        .await;
    if let Err(e) = cache_result {
        tracing::warn!(error = %e, "Settings cache write failed");
    }

    Ok(config)
}

async fn invalidate_settings_cache(state: &AppState) {
    let result: Result<(), _> = redis::cmd("DEL")
        .arg(settings_cache_key(&state.settings_key))
        .query_async(&mut state.redis.clone())
        .await;
    if let Err(e) = result {
        tracing::warn!(error = %e, "Settings cache invalidation failed");
    }
}

/// Settings changes need the configured admin token. With no token
/// configured, every change is refused.
fn authorize_settings_change(expected: Option<&str>, headers: &HeaderMap) -> AppResult<()> {
    let Some(expected) = expected else {
        return Err(AppError::Unauthorized(
            "settings changes are disabled on this instance".to_string(),
        ));
    };

    let provided = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(token) if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) => Ok(()),
        _ => Err(AppError::Unauthorized("missing or invalid admin token".to_string())),
    }
}

/// Count a refused settings change and hand the error back
fn reject_settings_change(method: &str, start: Instant, error: AppError) -> AppError {
    metrics::record_settings_update("rejected");
    metrics::record_http_request(method, "/api/v1/settings", 401, start.elapsed().as_secs_f64());
    error
}

// =============================================================================
// SETTINGS ENDPOINTS
// =============================================================================

/// Current effective settings (defaults merged, bounds applied)
///
/// GET /api/v1/settings
pub async fn get_settings(State(state): State<Arc<AppState>>) -> AppResult<Json<PricingConfig>> {
    let start = Instant::now();
    let config = load_pricing_config(&state).await?;

    metrics::record_http_request("GET", "/api/v1/settings", 200, start.elapsed().as_secs_f64());
    Ok(Json(config))
}

/// Replace the settings record. Values are coerced and clamped, never
/// rejected; only the authorization check can refuse the update.
///
/// PUT /api/v1/settings
///
/// # Request Body
/// ```json
/// { "enable_plugin": "1", "low_stock_threshold": "5", "low_stock_price_increase": "40" }
/// ```
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(raw): Json<Map<String, Value>>,
) -> AppResult<Json<PricingConfig>> {
    let start = Instant::now();

    if let Err(e) = authorize_settings_change(state.admin_token.as_deref(), &headers) {
        return Err(reject_settings_change("PUT", start, e));
    }

    let config = PricingConfig::from_settings(&raw);
    state
        .db
        .save_settings(&state.settings_key, &config.to_settings())
        .await?;
    invalidate_settings_cache(&state).await;

    tracing::info!(
        enabled = config.enabled,
        low_threshold = config.low_stock_threshold,
        medium_threshold = config.medium_stock_threshold,
        high_threshold = config.high_stock_threshold,
        "Pricing settings saved"
    );
    if config.high_stock_threshold <= config.medium_stock_threshold {
        tracing::warn!(
            medium_threshold = config.medium_stock_threshold,
            high_threshold = config.high_stock_threshold,
            "High stock threshold is not above the medium one; HIGH only applies past the medium threshold"
        );
    }

    metrics::record_settings_update("saved");
    metrics::record_http_request("PUT", "/api/v1/settings", 200, start.elapsed().as_secs_f64());

    Ok(Json(config))
}

/// Remove the settings record (uninstall). Defaults apply afterwards.
///
/// DELETE /api/v1/settings
pub async fn delete_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<StatusCode> {
    let start = Instant::now();

    if let Err(e) = authorize_settings_change(state.admin_token.as_deref(), &headers) {
        return Err(reject_settings_change("DELETE", start, e));
    }

    let existed = state.db.delete_settings(&state.settings_key).await?;
    invalidate_settings_cache(&state).await;

    tracing::info!(settings_key = %state.settings_key, existed, "Pricing settings deleted");
    metrics::record_settings_update("deleted");
    metrics::record_http_request("DELETE", "/api/v1/settings", 204, start.elapsed().as_secs_f64());

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// CATALOG ENDPOINTS
// =============================================================================

/// Query parameters for list endpoint
#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_page")]
    pub page: i32,

    #[serde(default = "default_per_page")]
    pub per_page: i32,
}

/// Highest page number accepted by the list endpoint
pub const MAX_PAGE: i32 = 100_000;

impl ListParams {
    /// Page in [1, MAX_PAGE], per_page in [1, 100]
    pub fn bounded(&self) -> (i32, i32) {
        (self.page.clamp(1, MAX_PAGE), self.per_page.clamp(1, 100))
    }
}

fn default_page() -> i32 {
    1
}
fn default_per_page() -> i32 {
    20
}

/// List catalog products with pagination
///
/// GET /api/v1/products?page=1&per_page=20
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<ProductListResponse>> {
    let start = Instant::now();

    let (page, per_page) = params.bounded();

    let (items, total) = state.db.list_products(page, per_page).await?;

    let duration = start.elapsed().as_secs_f64();
    metrics::record_http_request("GET", "/api/v1/products", 200, duration);
    metrics::record_db_query("select", duration);

    for item in &items {
        if let Some(quantity) = item.stock_quantity {
            metrics::set_stock_level(&item.sku, quantity);
        }
    }

    Ok(Json(ProductListResponse {
        items,
        total,
        page,
        per_page,
    }))
}

async fn find_product(state: &AppState, sku: &str) -> AppResult<Product> {
    let start = Instant::now();
    let product = state
        .db
        .get_by_sku(sku)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("SKU not found: {}", sku)))?;
    metrics::record_db_query("select", start.elapsed().as_secs_f64());
    Ok(product)
}

/// Get a single product by SKU
///
/// GET /api/v1/products/:sku
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(sku): Path<String>,
) -> AppResult<Json<Product>> {
    let start = Instant::now();
    let product = find_product(&state, &sku).await?;

    metrics::record_http_request("GET", "/api/v1/products/:sku", 200, start.elapsed().as_secs_f64());
    Ok(Json(product))
}

/// Create or replace a product
///
/// POST /api/v1/products
pub async fn upsert_product(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpsertProductRequest>,
) -> AppResult<Json<Product>> {
    let start = Instant::now();

    if request.sku.trim().is_empty() {
        return Err(AppError::BadRequest("sku must not be empty".to_string()));
    }
    let negative_price = [request.regular_price, request.price]
        .iter()
        .flatten()
        .any(|p| *p < 0.0 || !p.is_finite());
    if negative_price {
        return Err(AppError::BadRequest(
            "prices must be finite and non-negative".to_string(),
        ));
    }

    let product = state.db.upsert_product(&request).await?;

    tracing::info!(
        sku = %product.sku,
        product_type = %product.product_type,
        stock = ?product.stock_quantity,
        "Product saved"
    );

    let duration = start.elapsed().as_secs_f64();
    metrics::record_http_request("POST", "/api/v1/products", 200, duration);
    metrics::record_db_query("insert", duration);

    Ok(Json(product))
}

/// Manually adjust stock quantity
///
/// POST /api/v1/products/:sku/stock
///
/// # Request Body
/// ```json
/// { "delta": -2, "reason": "Damaged in transit" }
/// ```
pub async fn adjust_stock(
    State(state): State<Arc<AppState>>,
    Path(sku): Path<String>,
    Json(request): Json<AdjustStockRequest>,
) -> AppResult<Json<Product>> {
    let start = Instant::now();

    tracing::info!(
        sku = %sku,
        delta = request.delta,
        reason = %request.reason,
        "Adjusting stock"
    );

    let product = state
        .db
        .adjust_stock(&sku, &request)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("SKU not found or stock not managed: {}", sku))
        })?;

    if let Some(quantity) = product.stock_quantity {
        metrics::set_stock_level(&product.sku, quantity);
    }

    let duration = start.elapsed().as_secs_f64();
    metrics::record_http_request("POST", "/api/v1/products/:sku/stock", 200, duration);
    metrics::record_db_query("update", duration);

    Ok(Json(product))
}

// =============================================================================
// PRICING ENDPOINTS
// =============================================================================

/// Query parameters for the price endpoint
#[derive(Debug, Deserialize)]
pub struct PriceParams {
    #[serde(default)]
    pub site: PriceSite,
}

/// Price a product at a given computation site
///
/// GET /api/v1/products/:sku/price?site=cart_item_price
///
/// Sites outside the storefront and cart (admin, order_create, email, ...)
/// always return the original price.
pub async fn get_price(
    State(state): State<Arc<AppState>>,
    Path(sku): Path<String>,
    Query(params): Query<PriceParams>,
) -> AppResult<Json<PriceQuote>> {
    let start = Instant::now();

    let config = load_pricing_config(&state).await?;
    let product = find_product(&state, &sku).await?;

    let quote = dispatch::quote(params.site, &product, &config);
    metrics::record_quote(&quote);

    tracing::debug!(
        sku = %sku,
        site = params.site.as_str(),
        base_price = ?quote.base_price,
        price = ?quote.price,
        skipped = ?quote.skipped,
        "Price quoted"
    );

    metrics::record_http_request("GET", "/api/v1/products/:sku/price", 200, start.elapsed().as_secs_f64());
    Ok(Json(quote))
}

/// Customer notice and adjustment explanation for a product
///
/// GET /api/v1/products/:sku/notice
pub async fn get_notice(
    State(state): State<Arc<AppState>>,
    Path(sku): Path<String>,
) -> AppResult<Json<ProductNoticeResponse>> {
    let start = Instant::now();

    let config = load_pricing_config(&state).await?;
    let product = find_product(&state, &sku).await?;

    let response = ProductNoticeResponse {
        notice: messaging::customer_notice(&product, &config),
        adjustment: messaging::adjustment_info(&product, &config),
        sku: product.sku,
    };

    metrics::record_http_request("GET", "/api/v1/products/:sku/notice", 200, start.elapsed().as_secs_f64());
    Ok(Json(response))
}

/// Price every line of a cart
///
/// POST /api/v1/cart/quote
///
/// Each line is quoted twice from the same stored base: once for the cart
/// line display and once for the totals pass. Neither quote sees the other's
/// output, so totals never stack on top of the displayed price.
pub async fn quote_cart(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CartQuoteRequest>,
) -> AppResult<Json<CartQuoteResponse>> {
    let start = Instant::now();

    validate_cart_items(&request.items)?;

    let config = load_pricing_config(&state).await?;

    let mut lines = Vec::with_capacity(request.items.len());
    for item in &request.items {
        let product = find_product(&state, &item.sku).await?;
        lines.push(price_cart_line(&product, item.quantity, &config));
    }

    let total: f64 = lines.iter().map(|line| line.line_total).sum();

    tracing::info!(
        lines = lines.len(),
        adjusted = lines.iter().filter(|l| l.adjusted_price.is_some()).count(),
        total = total,
        "Cart quoted"
    );

    metrics::record_http_request("POST", "/api/v1/cart/quote", 200, start.elapsed().as_secs_f64());

    Ok(Json(CartQuoteResponse {
        lines,
        total,
        formatted_total: pricing::format_price(total),
    }))
}

/// Every cart line must order at least one unit
fn validate_cart_items(items: &[CartItemRequest]) -> AppResult<()> {
    match items.iter().find(|item| item.quantity == 0) {
        Some(item) => Err(AppError::BadRequest(format!(
            "quantity must be at least 1 for {}",
            item.sku
        ))),
        None => Ok(()),
    }
}

/// Quote one cart line for display and for the totals pass
pub fn price_cart_line(product: &Product, quantity: u32, config: &PricingConfig) -> CartLine {
    let display = dispatch::quote(PriceSite::CartItemPrice, product, config);
    let totals = dispatch::quote(PriceSite::CartTotals, product, config);
    metrics::record_quote(&display);
    metrics::record_quote(&totals);

    let unit_price = totals.price;
    let line_total = unit_price.unwrap_or(0.0) * quantity as f64;

    // Order line metadata, only for lines whose price actually changed
    let (original_price, adjusted_price) = match (totals.base_price, totals.price) {
        (Some(base), Some(price)) if totals.is_adjusted() && price != base => {
            (Some(base), Some(price))
        }
        _ => (None, None),
    };

    CartLine {
        sku: product.sku.clone(),
        quantity,
        display,
        unit_price,
        line_total,
        original_price,
        adjusted_price,
        notice: messaging::customer_notice(product, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::simple_product;
    use axum::http::HeaderValue;

    #[test]
    fn test_cart_line_carries_original_and_adjusted_price() {
        let config = PricingConfig::default();
        let line = price_cart_line(&simple_product(Some(4), 50.0), 3, &config);

        assert_eq!(line.original_price, Some(50.0));
        let adjusted = line.adjusted_price.expect("adjusted");
        assert!((adjusted - 70.0).abs() < 1e-9);
        assert!((line.line_total - 210.0).abs() < 1e-9);
        assert_eq!(line.display.price, line.unit_price);
        assert!(line.notice.is_some());
    }

    #[test]
    fn test_cart_line_without_adjustment_has_no_order_metadata() {
        let config = PricingConfig::default();
        let line = price_cart_line(&simple_product(Some(50), 50.0), 2, &config);

        assert_eq!(line.original_price, None);
        assert_eq!(line.adjusted_price, None);
        assert_eq!(line.unit_price, Some(50.0));
        assert_eq!(line.line_total, 100.0);
        assert_eq!(line.notice, None);
    }

    #[test]
    fn test_requoting_a_cart_line_is_stable() {
        let config = PricingConfig::default();
        let product = simple_product(Some(150), 19.99);

        let first = price_cart_line(&product, 1, &config);
        let second = price_cart_line(&product, 1, &config);
        assert_eq!(first.unit_price, second.unit_price);
        assert_eq!(first.line_total, second.line_total);
    }

    #[test]
    fn test_price_site_query_parses_snake_case() {
        let params: PriceParams =
            serde_json::from_value(serde_json::json!({ "site": "order_create" })).expect("parse");
        assert_eq!(params.site, PriceSite::OrderCreate);

        let params: PriceParams = serde_json::from_value(serde_json::json!({})).expect("parse");
        assert_eq!(params.site, PriceSite::ProductPage);
    }

    fn cart_item(sku: &str, quantity: u32) -> CartItemRequest {
        CartItemRequest {
            sku: sku.to_string(),
            quantity,
        }
    }

    fn headers_with_token(token: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_TOKEN_HEADER, HeaderValue::from_static(token));
        headers
    }

    #[test]
    fn test_settings_change_refused_without_configured_token() {
        let result = authorize_settings_change(None, &headers_with_token("anything"));
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_settings_change_refused_without_header() {
        let result = authorize_settings_change(Some("s3cret"), &HeaderMap::new());
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_settings_change_refused_with_wrong_token() {
        let result = authorize_settings_change(Some("s3cret"), &headers_with_token("s3cre"));
        assert!(matches!(result, Err(AppError::Unauthorized(_))));

        let result = authorize_settings_change(Some("s3cret"), &headers_with_token("s3cret2"));
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_settings_change_allowed_with_matching_token() {
        let result = authorize_settings_change(Some("s3cret"), &headers_with_token("s3cret"));
        assert!(result.is_ok());
    }

    #[test]
    fn test_rejected_settings_delete_is_counted_as_401() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        ::metrics::with_local_recorder(&recorder, || {
            let error = AppError::Unauthorized("missing or invalid admin token".to_string());
            let returned = reject_settings_change("DELETE", Instant::now(), error);
            assert!(matches!(returned, AppError::Unauthorized(_)));
        });

        let rendered = handle.render();
        let counted = rendered.lines().any(|line| {
            line.starts_with(metrics::HTTP_REQUESTS_TOTAL)
                && line.contains("method=\"DELETE\"")
                && line.contains("endpoint=\"/api/v1/settings\"")
                && line.contains("status=\"401\"")
        });
        assert!(counted, "no 401 DELETE sample in:\n{rendered}");
        assert!(rendered.contains("status=\"rejected\""));
    }

    #[test]
    fn test_cart_items_with_zero_quantity_are_rejected() {
        let items = vec![cart_item("SKU-A", 2), cart_item("SKU-B", 0)];
        match validate_cart_items(&items) {
            Err(AppError::BadRequest(message)) => assert!(message.contains("SKU-B")),
            other => panic!("expected BadRequest, got {:?}", other),
        }

        assert!(validate_cart_items(&[cart_item("SKU-A", 1)]).is_ok());
        assert!(validate_cart_items(&[]).is_ok());
    }

    #[test]
    fn test_list_params_are_bounded() {
        let params = ListParams {
            page: i32::MAX,
            per_page: 20,
        };
        let (page, per_page) = params.bounded();
        assert_eq!(page, MAX_PAGE);
        assert_eq!(per_page, 20);
        assert!(crate::db::page_offset(page, per_page) > 0);

        let params = ListParams {
            page: -5,
            per_page: 10_000,
        };
        assert_eq!(params.bounded(), (1, 100));
    }
}
