// =============================================================================
// MESSAGING MODULE
// =============================================================================
// Customer-facing text about stock-based pricing: the configurable notice
// shown near the price and the per-product explanation of the adjustment.
// =============================================================================

use serde::Serialize;

use crate::models::{Product, StockLevel};
use crate::pricing::{resolve_tier, Tier};
use crate::settings::PricingConfig;

/// Explanation of the adjustment currently applied to a product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjustmentInfo {
    pub has_adjustment: bool,
    /// Signed percentage, same convention as `AdjustmentResult`
    pub adjustment_percentage: f64,
    pub message: String,
}

impl AdjustmentInfo {
    fn none() -> Self {
        Self {
            has_adjustment: false,
            adjustment_percentage: 0.0,
            message: String::new(),
        }
    }
}

/// Stock of a product that takes part in pricing, if any
fn priced_stock(product: &Product, config: &PricingConfig) -> Option<u32> {
    if !config.enabled || !product.is_eligible() {
        return None;
    }
    match product.stock_level() {
        StockLevel::Managed(stock) => Some(stock),
        StockLevel::Unmanaged => None,
    }
}

/// The configured notice, when messaging is on and the product sits in the
/// LOW, MEDIUM or HIGH band. Returned verbatim.
pub fn customer_notice(product: &Product, config: &PricingConfig) -> Option<String> {
    if !config.customer_message_enabled {
        return None;
    }
    let stock = priced_stock(product, config)?;

    match resolve_tier(stock, config).0 {
        Tier::Normal => None,
        _ => Some(config.customer_message.clone()),
    }
}

/// Describe the adjustment for `product`. Percentages print as whole numbers.
pub fn adjustment_info(product: &Product, config: &PricingConfig) -> AdjustmentInfo {
    let Some(stock) = priced_stock(product, config) else {
        return AdjustmentInfo::none();
    };

    let (tier, fraction) = resolve_tier(stock, config);
    let percentage = fraction * 100.0;
    let whole = percentage.abs().trunc() as i64;

    let message = match tier {
        Tier::Low => format!("Price increased by {whole}% due to low stock"),
        Tier::Medium => format!("Price increased by {whole}% due to limited stock"),
        Tier::High => format!("Price decreased by {whole}% due to high stock"),
        Tier::Normal => String::new(),
    };

    AdjustmentInfo {
        has_adjustment: percentage != 0.0,
        adjustment_percentage: percentage,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::simple_product;

    #[test]
    fn test_notice_shown_for_banded_stock() {
        let config = PricingConfig::default();
        for stock in [0, 5, 12, 20, 100, 400] {
            assert_eq!(
                customer_notice(&simple_product(Some(stock), 10.0), &config).as_deref(),
                Some(config.customer_message.as_str()),
                "stock {stock}"
            );
        }
    }

    #[test]
    fn test_no_notice_for_normal_stock_or_when_disabled() {
        let config = PricingConfig::default();
        assert_eq!(customer_notice(&simple_product(Some(50), 10.0), &config), None);

        let muted = PricingConfig {
            customer_message_enabled: false,
            ..PricingConfig::default()
        };
        assert_eq!(customer_notice(&simple_product(Some(1), 10.0), &muted), None);

        let off = PricingConfig {
            enabled: false,
            ..PricingConfig::default()
        };
        assert_eq!(customer_notice(&simple_product(Some(1), 10.0), &off), None);
    }

    #[test]
    fn test_no_notice_for_unmanaged_stock() {
        let config = PricingConfig::default();
        assert_eq!(customer_notice(&simple_product(None, 10.0), &config), None);
    }

    #[test]
    fn test_adjustment_info_messages() {
        let config = PricingConfig::default();

        let low = adjustment_info(&simple_product(Some(2), 10.0), &config);
        assert!(low.has_adjustment);
        assert_eq!(low.message, "Price increased by 40% due to low stock");

        let medium = adjustment_info(&simple_product(Some(15), 10.0), &config);
        assert_eq!(medium.message, "Price increased by 20% due to limited stock");

        let high = adjustment_info(&simple_product(Some(250), 10.0), &config);
        assert_eq!(high.message, "Price decreased by 15% due to high stock");
        assert!(high.adjustment_percentage < 0.0);

        let normal = adjustment_info(&simple_product(Some(50), 10.0), &config);
        assert_eq!(normal, AdjustmentInfo::none());
    }

    #[test]
    fn test_zero_percent_band_has_no_adjustment() {
        let config = PricingConfig {
            medium_stock_increase_pct: 0.0,
            ..PricingConfig::default()
        };
        let info = adjustment_info(&simple_product(Some(15), 10.0), &config);
        assert!(!info.has_adjustment);
    }
}
