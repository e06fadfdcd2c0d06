// =============================================================================
// DISPATCH MODULE
// =============================================================================
// Decides, per price computation site, whether the stock adjustment applies,
// and threads the product's canonical base price into the adjuster.
//
// LEARNING NOTES:
// - Every place a price is shown or charged is a named PriceSite
// - Only storefront display and the cart get adjusted prices. Back office,
//   async requests, order writes and emails always see the original price
// - quote() never fails: whenever something is off it returns the base
//   price unchanged together with the reason
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::models::{Product, StockLevel};
use crate::pricing::{self, AdjustmentResult};
use crate::settings::PricingConfig;

// =============================================================================
// PRICE SITES
// =============================================================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSite {
    // ----- adjusted -----
    /// Product detail page price
    #[default]
    ProductPage,
    /// Rendered price snippet (listings, widgets)
    PriceHtml,
    /// Cart product price display
    CartProductPrice,
    /// Cart line-item price display
    CartItemPrice,
    /// Cart totals recompute pass
    CartTotals,

    // ----- pass-through -----
    Admin,
    AsyncRequest,
    OrderCreate,
    OrderUpdate,
    OrderSave,
    RestOrderInsert,
    ShipmentCreated,
    Email,
}

impl PriceSite {
    /// All sites, adjusted ones first
    pub const ALL: [PriceSite; 13] = [
        PriceSite::ProductPage,
        PriceSite::PriceHtml,
        PriceSite::CartProductPrice,
        PriceSite::CartItemPrice,
        PriceSite::CartTotals,
        PriceSite::Admin,
        PriceSite::AsyncRequest,
        PriceSite::OrderCreate,
        PriceSite::OrderUpdate,
        PriceSite::OrderSave,
        PriceSite::RestOrderInsert,
        PriceSite::ShipmentCreated,
        PriceSite::Email,
    ];

    /// The policy table
    pub fn applies_adjustment(&self) -> bool {
        matches!(
            self,
            PriceSite::ProductPage
                | PriceSite::PriceHtml
                | PriceSite::CartProductPrice
                | PriceSite::CartItemPrice
                | PriceSite::CartTotals
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceSite::ProductPage => "product_page",
            PriceSite::PriceHtml => "price_html",
            PriceSite::CartProductPrice => "cart_product_price",
            PriceSite::CartItemPrice => "cart_item_price",
            PriceSite::CartTotals => "cart_totals",
            PriceSite::Admin => "admin",
            PriceSite::AsyncRequest => "async_request",
            PriceSite::OrderCreate => "order_create",
            PriceSite::OrderUpdate => "order_update",
            PriceSite::OrderSave => "order_save",
            PriceSite::RestOrderInsert => "rest_order_insert",
            PriceSite::ShipmentCreated => "shipment_created",
            PriceSite::Email => "email",
        }
    }
}

// =============================================================================
// QUOTE
// =============================================================================
/// Why a quote carries the base price unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    SuppressedSite,
    IneligibleProduct,
    UnmanagedStock,
    MissingPrice,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Disabled => "disabled",
            SkipReason::SuppressedSite => "suppressed_site",
            SkipReason::IneligibleProduct => "ineligible_product",
            SkipReason::UnmanagedStock => "unmanaged_stock",
            SkipReason::MissingPrice => "missing_price",
        }
    }
}

/// The price a site should show or charge
#[derive(Debug, Clone, Serialize)]
pub struct PriceQuote {
    pub site: PriceSite,
    pub base_price: Option<f64>,
    /// Adjusted price, or `base_price` when skipped
    pub price: Option<f64>,
    /// Two-decimal display text
    pub formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<AdjustmentResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
}

impl PriceQuote {
    fn passthrough(site: PriceSite, base_price: Option<f64>, reason: SkipReason) -> Self {
        Self {
            site,
            base_price,
            price: base_price,
            formatted: base_price.map(pricing::format_price),
            adjustment: None,
            skipped: Some(reason),
        }
    }

    pub fn is_adjusted(&self) -> bool {
        self.adjustment.is_some()
    }
}

/// Price `product` for `site`.
///
/// The base price always comes from [`Product::base_price`], the stored
/// regular price, so repeated quotes for any mix of sites never stack.
pub fn quote(site: PriceSite, product: &Product, config: &PricingConfig) -> PriceQuote {
    let base_price = product.base_price();

    if !config.enabled {
        return PriceQuote::passthrough(site, base_price, SkipReason::Disabled);
    }
    if !site.applies_adjustment() {
        return PriceQuote::passthrough(site, base_price, SkipReason::SuppressedSite);
    }
    if !product.is_eligible() {
        return PriceQuote::passthrough(site, base_price, SkipReason::IneligibleProduct);
    }
    let StockLevel::Managed(stock) = product.stock_level() else {
        return PriceQuote::passthrough(site, base_price, SkipReason::UnmanagedStock);
    };
    let Some(base) = base_price else {
        return PriceQuote::passthrough(site, None, SkipReason::MissingPrice);
    };

    let result = pricing::adjust(base, stock, config);

    PriceQuote {
        site,
        base_price: Some(base),
        price: Some(result.adjusted_price),
        formatted: Some(pricing::format_price(result.adjusted_price)),
        adjustment: Some(result),
        skipped: None,
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::simple_product;
    use crate::pricing::Tier;

    fn assert_price(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("price present");
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_default_site_is_product_page() {
        assert_eq!(PriceSite::default(), PriceSite::ProductPage);
        assert!(PriceSite::default().applies_adjustment());
    }

    #[test]
    fn test_policy_table() {
        let adjusted: Vec<_> = PriceSite::ALL
            .iter()
            .filter(|site| site.applies_adjustment())
            .copied()
            .collect();

        assert_eq!(
            adjusted,
            vec![
                PriceSite::ProductPage,
                PriceSite::PriceHtml,
                PriceSite::CartProductPrice,
                PriceSite::CartItemPrice,
                PriceSite::CartTotals,
            ]
        );
    }

    #[test]
    fn test_storefront_sites_adjust() {
        let config = PricingConfig::default();
        let product = simple_product(Some(5), 100.0);

        let q = quote(PriceSite::ProductPage, &product, &config);
        assert_price(q.price, 140.0);
        assert_eq!(q.formatted.as_deref(), Some("140.00"));
        assert_eq!(q.adjustment.map(|a| a.tier), Some(Tier::Low));
        assert!(q.skipped.is_none());
    }

    #[test]
    fn test_back_office_and_order_sites_pass_through() {
        let config = PricingConfig::default();
        let product = simple_product(Some(5), 100.0);

        for site in PriceSite::ALL.iter().filter(|s| !s.applies_adjustment()) {
            let q = quote(*site, &product, &config);
            assert_eq!(q.price, Some(100.0), "site {}", site.as_str());
            assert_eq!(q.skipped, Some(SkipReason::SuppressedSite));
        }
    }

    #[test]
    fn test_disabled_config_passes_through() {
        let config = PricingConfig {
            enabled: false,
            ..PricingConfig::default()
        };
        let q = quote(PriceSite::CartTotals, &simple_product(Some(1), 20.0), &config);
        assert_eq!(q.price, Some(20.0));
        assert_eq!(q.skipped, Some(SkipReason::Disabled));
    }

    #[test]
    fn test_ineligible_and_unmanaged_products_pass_through() {
        let config = PricingConfig::default();

        let mut variable = simple_product(Some(1), 20.0);
        variable.product_type = "variable".to_string();
        let q = quote(PriceSite::ProductPage, &variable, &config);
        assert_eq!(q.skipped, Some(SkipReason::IneligibleProduct));
        assert_eq!(q.price, Some(20.0));

        let unmanaged = simple_product(None, 20.0);
        let q = quote(PriceSite::ProductPage, &unmanaged, &config);
        assert_eq!(q.skipped, Some(SkipReason::UnmanagedStock));
        assert_eq!(q.price, Some(20.0));
    }

    #[test]
    fn test_missing_price_passes_through() {
        let mut product = simple_product(Some(1), 0.0);
        product.regular_price = None;
        product.price = None;

        let q = quote(PriceSite::ProductPage, &product, &PricingConfig::default());
        assert_eq!(q.price, None);
        assert_eq!(q.skipped, Some(SkipReason::MissingPrice));
    }

    #[test]
    fn test_sale_price_is_not_the_base_when_regular_price_exists() {
        let mut product = simple_product(Some(10), 100.0);
        product.price = Some(70.0);

        let q = quote(PriceSite::ProductPage, &product, &PricingConfig::default());
        assert_eq!(q.base_price, Some(100.0));
        assert_price(q.price, 120.0);
    }

    #[test]
    fn test_every_site_in_sequence_uses_the_same_base() {
        // Render, re-render in cart, recompute totals, then write the order:
        // the adjusted sites all agree and the order sees the original.
        let config = PricingConfig::default();
        let product = simple_product(Some(150), 100.0);

        let sequence = [
            PriceSite::ProductPage,
            PriceSite::PriceHtml,
            PriceSite::CartProductPrice,
            PriceSite::CartItemPrice,
            PriceSite::CartTotals,
            PriceSite::CartTotals,
        ];
        for site in sequence {
            assert_price(quote(site, &product, &config).price, 85.0);
        }
        assert_eq!(
            quote(PriceSite::OrderCreate, &product, &config).price,
            Some(100.0)
        );
    }
}
