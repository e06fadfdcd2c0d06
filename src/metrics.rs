// =============================================================================
// METRICS MODULE
// =============================================================================
// This module sets up Prometheus metrics for observability.
//
// LEARNING NOTES:
// - Prometheus uses a "pull" model - it scrapes /metrics endpoint
// - Counters only go up, gauges go up and down, histograms bucket values
// - Labels add dimensions (tier, site, skip reason)
// =============================================================================

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::dispatch::PriceQuote;

// =============================================================================
// METRIC NAMES (Constants)
// =============================================================================

/// HTTP request counter
/// Labels: method, endpoint, status
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";

/// HTTP request duration histogram
/// Labels: method, endpoint
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

/// Prices that received a stock adjustment
/// Labels: tier, site
pub const PRICING_ADJUSTMENTS_TOTAL: &str = "pricing_adjustments_total";

/// Prices passed through unchanged
/// Labels: reason
pub const PRICING_PASSTHROUGH_TOTAL: &str = "pricing_passthrough_total";

/// Stock level gauge for catalog products
/// Labels: sku
pub const CATALOG_STOCK_LEVEL: &str = "catalog_stock_level";

/// Settings updates by outcome
/// Labels: status (saved/rejected/deleted)
pub const SETTINGS_UPDATES_TOTAL: &str = "pricing_settings_updates_total";

/// Database query duration histogram
/// Labels: operation (select/insert/update/delete)
pub const DB_QUERY_DURATION_SECONDS: &str = "db_query_duration_seconds";

/// Redis operation duration histogram
/// Labels: operation (get/set/delete)
pub const REDIS_OPERATION_DURATION_SECONDS: &str = "redis_operation_duration_seconds";

// =============================================================================
// SETUP FUNCTION
// =============================================================================
/// Initialize and globally install the Prometheus recorder
pub fn setup_metrics() -> Result<PrometheusHandle> {
    let latency_buckets = &[
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUEST_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full(DB_QUERY_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full(REDIS_OPERATION_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .install_recorder()?;

    describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests received");
    describe_histogram!(HTTP_REQUEST_DURATION_SECONDS, "HTTP request latency in seconds");
    describe_counter!(
        PRICING_ADJUSTMENTS_TOTAL,
        "Prices adjusted by stock tier, per computation site"
    );
    describe_counter!(
        PRICING_PASSTHROUGH_TOTAL,
        "Prices returned unchanged, by reason"
    );
    describe_gauge!(CATALOG_STOCK_LEVEL, "Current stock level for each SKU");
    describe_counter!(SETTINGS_UPDATES_TOTAL, "Pricing settings changes by outcome");
    describe_histogram!(DB_QUERY_DURATION_SECONDS, "Database query latency in seconds");
    describe_histogram!(
        REDIS_OPERATION_DURATION_SECONDS,
        "Redis operation latency in seconds"
    );

    Ok(handle)
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Record an HTTP request
pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration_secs: f64) {
    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .record(duration_secs);
}

/// Count a quote as either adjusted (by tier and site) or passed through
pub fn record_quote(quote: &PriceQuote) {
    match (&quote.adjustment, &quote.skipped) {
        (Some(adjustment), _) => counter!(
            PRICING_ADJUSTMENTS_TOTAL,
            "tier" => adjustment.tier.as_str(),
            "site" => quote.site.as_str()
        )
        .increment(1),
        (None, Some(reason)) => {
            counter!(PRICING_PASSTHROUGH_TOTAL, "reason" => reason.as_str()).increment(1)
        }
        (None, None) => {}
    }
}

/// Update stock level gauge for a SKU
pub fn set_stock_level(sku: &str, level: i32) {
    gauge!(CATALOG_STOCK_LEVEL, "sku" => sku.to_string()).set(level as f64);
}

/// Record a settings change attempt
pub fn record_settings_update(status: &'static str) {
    counter!(SETTINGS_UPDATES_TOTAL, "status" => status).increment(1);
}

/// Record database query duration
pub fn record_db_query(operation: &str, duration_secs: f64) {
    histogram!(DB_QUERY_DURATION_SECONDS, "operation" => operation.to_string())
        .record(duration_secs);
}

/// Record Redis operation duration
pub fn record_redis_operation(operation: &str, duration_secs: f64) {
    histogram!(REDIS_OPERATION_DURATION_SECONDS, "operation" => operation.to_string())
        .record(duration_secs);
}
