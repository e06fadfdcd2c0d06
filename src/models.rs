// =============================================================================
// MODELS MODULE
// =============================================================================
// This module defines the data structures used throughout the service.
//
// LEARNING NOTES:
// - Rust uses structs to define data structures
// - Derive macros automatically implement common traits
// - Serde handles JSON serialization/deserialization
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::dispatch::PriceQuote;
use crate::messaging::AdjustmentInfo;

// =============================================================================
// PRODUCT
// =============================================================================
// A catalog product as far as pricing cares: its type, whether stock is
// tracked, the current quantity and the stored prices.
//
// DERIVE MACROS EXPLAINED:
// - FromRow: Allows SQLx to map database rows to this struct
// - Serialize/Deserialize: JSON in and out of the API
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    /// Unique identifier for the catalog record
    pub id: Uuid,

    /// Stock Keeping Unit - unique product identifier
    pub sku: String,

    /// Human-readable product name
    pub name: String,

    /// One of "simple", "variable", "grouped", "external"
    pub product_type: String,

    /// Whether the catalog tracks a finite quantity for this product
    pub manage_stock: bool,

    /// Current quantity; NULL when stock is not tracked
    pub stock_quantity: Option<i32>,

    /// Stored regular price. This is the stable adjustment base and is
    /// never overwritten with an adjusted value.
    pub regular_price: Option<f64>,

    /// Stored active price (may be a sale price)
    pub price: Option<f64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product kinds known to the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Simple,
    Variable,
    Grouped,
    External,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Simple => "simple",
            ProductType::Variable => "variable",
            ProductType::Grouped => "grouped",
            ProductType::External => "external",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "simple" => Some(ProductType::Simple),
            "variable" => Some(ProductType::Variable),
            "grouped" => Some(ProductType::Grouped),
            "external" => Some(ProductType::External),
            _ => None,
        }
    }
}

/// Stock as the pricing code sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "quantity")]
pub enum StockLevel {
    Managed(u32),
    /// Untracked, unlimited or unknown. Never qualifies for adjustment.
    Unmanaged,
}

// -----------------------------------------------------------------------------
// COMPUTED PROPERTIES (impl block)
// -----------------------------------------------------------------------------
impl Product {
    pub fn kind(&self) -> Option<ProductType> {
        ProductType::parse(&self.product_type)
    }

    /// Only simple products with stock tracking take part in pricing
    pub fn is_eligible(&self) -> bool {
        self.kind() == Some(ProductType::Simple) && self.manage_stock
    }

    /// Managed quantity, or `Unmanaged` when tracking is off, the quantity
    /// is missing, or it is negative (backorders)
    pub fn stock_level(&self) -> StockLevel {
        match (self.manage_stock, self.stock_quantity) {
            (true, Some(q)) if q >= 0 => StockLevel::Managed(q as u32),
            _ => StockLevel::Unmanaged,
        }
    }

    /// The single canonical adjustment base: the stored regular price when
    /// it is positive, otherwise the stored active price.
    pub fn base_price(&self) -> Option<f64> {
        match self.regular_price {
            Some(regular) if regular > 0.0 => Some(regular),
            _ => self.price.filter(|p| *p >= 0.0),
        }
    }
}

// =============================================================================
// API REQUEST/RESPONSE STRUCTURES
// =============================================================================

// -----------------------------------------------------------------------------
// PRODUCT UPSERT REQUEST
// -----------------------------------------------------------------------------
/// Request body for creating or replacing a catalog product
///
/// # Example JSON
/// ```json
/// {
///   "sku": "SKU-LAMP-001",
///   "name": "Desk Lamp",
///   "product_type": "simple",
///   "manage_stock": true,
///   "stock_quantity": 12,
///   "regular_price": 49.90
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertProductRequest {
    pub sku: String,
    pub name: String,
    pub product_type: ProductType,
    #[serde(default)]
    pub manage_stock: bool,
    #[serde(default)]
    pub stock_quantity: Option<i32>,
    #[serde(default)]
    pub regular_price: Option<f64>,
    /// Active price; defaults to the regular price
    #[serde(default)]
    pub price: Option<f64>,
}

// -----------------------------------------------------------------------------
// STOCK ADJUSTMENT REQUEST
// -----------------------------------------------------------------------------
/// Request body for manual stock adjustments
/// Used for inventory corrections, receiving shipments, etc.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustStockRequest {
    /// Amount to adjust (positive to add, negative to remove)
    pub delta: i32,

    /// Reason for adjustment (for audit trail)
    pub reason: String,
}

// -----------------------------------------------------------------------------
// PRODUCT LIST RESPONSE
// -----------------------------------------------------------------------------
/// Response for listing products with pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct ProductListResponse {
    pub items: Vec<Product>,
    pub total: i64,
    pub page: i32,
    pub per_page: i32,
}

// -----------------------------------------------------------------------------
// PRODUCT NOTICE RESPONSE
// -----------------------------------------------------------------------------
/// Customer-facing notice plus the explanation of the current adjustment
#[derive(Debug, Clone, Serialize)]
pub struct ProductNoticeResponse {
    pub sku: String,
    pub notice: Option<String>,
    pub adjustment: AdjustmentInfo,
}

// -----------------------------------------------------------------------------
// CART QUOTE
// -----------------------------------------------------------------------------
/// A single cart line in a quote request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemRequest {
    pub sku: String,
    pub quantity: u32,
}

/// Request body for pricing a whole cart
///
/// # Example JSON
/// ```json
/// { "items": [ { "sku": "SKU-LAMP-001", "quantity": 2 } ] }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartQuoteRequest {
    pub items: Vec<CartItemRequest>,
}

/// One priced cart line
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub sku: String,
    pub quantity: u32,

    /// What the cart shows next to the item
    pub display: PriceQuote,

    /// Unit price used by the totals pass
    pub unit_price: Option<f64>,
    pub line_total: f64,

    /// Set only when the line was adjusted; carried onto the order line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjusted_price: Option<f64>,

    /// Customer notice shown under the line, when one applies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartQuoteResponse {
    pub lines: Vec<CartLine>,
    pub total: f64,
    pub formatted_total: String,
}

// =============================================================================
// HEALTH CHECK RESPONSES
// =============================================================================

/// Simple health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Detailed readiness check response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

/// Individual dependency health checks
#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    pub database: bool,
    pub redis: bool,
}

// =============================================================================
// ERROR RESPONSES
// =============================================================================

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type/code
    pub error: String,

    /// Human-readable error message
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// TEST FIXTURES
// =============================================================================
#[cfg(test)]
pub mod fixtures {
    use super::*;

    /// A simple, stock-managed product priced at `regular_price`
    pub fn simple_product(stock: Option<i32>, regular_price: f64) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            sku: "SKU-TEST-001".to_string(),
            name: "Test Product".to_string(),
            product_type: "simple".to_string(),
            manage_stock: true,
            stock_quantity: stock,
            regular_price: Some(regular_price),
            price: Some(regular_price),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::simple_product;
    use super::*;

    #[test]
    fn test_stock_level() {
        assert_eq!(simple_product(Some(7), 10.0).stock_level(), StockLevel::Managed(7));
        assert_eq!(simple_product(None, 10.0).stock_level(), StockLevel::Unmanaged);
        assert_eq!(simple_product(Some(-2), 10.0).stock_level(), StockLevel::Unmanaged);

        let mut untracked = simple_product(Some(7), 10.0);
        untracked.manage_stock = false;
        assert_eq!(untracked.stock_level(), StockLevel::Unmanaged);
        assert!(!untracked.is_eligible());
    }

    #[test]
    fn test_only_simple_products_are_eligible() {
        let mut product = simple_product(Some(3), 10.0);
        assert!(product.is_eligible());

        product.product_type = "variable".to_string();
        assert!(!product.is_eligible());

        product.product_type = "bundle".to_string();
        assert!(!product.is_eligible());
    }

    #[test]
    fn test_base_price_prefers_regular_price() {
        let mut product = simple_product(Some(3), 100.0);
        product.price = Some(80.0);
        assert_eq!(product.base_price(), Some(100.0));

        product.regular_price = Some(0.0);
        assert_eq!(product.base_price(), Some(80.0));

        product.regular_price = None;
        product.price = None;
        assert_eq!(product.base_price(), None);
    }
}
