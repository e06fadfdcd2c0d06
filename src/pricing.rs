// =============================================================================
// PRICING MODULE
// =============================================================================
// The tier resolver and the price adjuster. Both are pure functions: no I/O,
// no shared state, no failure modes.
//
// LEARNING NOTES:
// - Tiers are checked in a fixed order and the first match wins
// - The adjuster never re-validates product eligibility; callers do that
// - Callers must always pass the stable, unadjusted base price. Feeding an
//   adjusted price back in stacks the percentage (see the tests below)
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::settings::PricingConfig;

// =============================================================================
// TIER
// =============================================================================
/// Pricing band a stock quantity falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Low,
    Medium,
    High,
    Normal,
}

impl Tier {
    /// Label used in logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Low => "low",
            Tier::Medium => "medium",
            Tier::High => "high",
            Tier::Normal => "normal",
        }
    }
}

// =============================================================================
// ADJUSTMENT RESULT
// =============================================================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentResult {
    /// Never negative
    pub adjusted_price: f64,
    pub tier: Tier,
    /// Signed: positive is an increase, negative a decrease, zero for NORMAL
    pub adjustment_pct: f64,
}

// =============================================================================
// TIER RESOLVER
// =============================================================================
/// Determine the tier and the signed adjustment fraction for a stock level.
///
/// Evaluated in order, first match wins:
/// 1. `stock <= low_stock_threshold`    -> LOW,    `+low / 100`
/// 2. `stock <= medium_stock_threshold` -> MEDIUM, `+medium / 100`
/// 3. `stock >= high_stock_threshold`   -> HIGH,   `-high / 100`
/// 4. otherwise                         -> NORMAL, `0`
///
/// A low threshold at or above the medium one shadows MEDIUM, and a high
/// threshold below the medium one makes HIGH unreachable for anything the
/// first two checks catch. Both are configuration hazards and are left as is.
pub fn resolve_tier(stock_quantity: u32, config: &PricingConfig) -> (Tier, f64) {
    if stock_quantity <= config.low_stock_threshold {
        (Tier::Low, config.low_stock_increase_pct / 100.0)
    } else if stock_quantity <= config.medium_stock_threshold {
        (Tier::Medium, config.medium_stock_increase_pct / 100.0)
    } else if stock_quantity >= config.high_stock_threshold {
        (Tier::High, -config.high_stock_decrease_pct / 100.0)
    } else {
        (Tier::Normal, 0.0)
    }
}

// =============================================================================
// PRICE ADJUSTER
// =============================================================================
/// Apply the stock tier to `base_price`.
///
/// Assumes the caller already checked that pricing is enabled and the
/// product is eligible with managed stock. The result is floored at zero.
pub fn adjust(base_price: f64, stock_quantity: u32, config: &PricingConfig) -> AdjustmentResult {
    let (tier, fraction) = resolve_tier(stock_quantity, config);

    let adjusted = base_price * (1.0 + fraction);
    // f64::max drops a NaN operand, so this also never yields NaN
    let adjusted_price = adjusted.max(0.0);

    AdjustmentResult {
        adjusted_price,
        tier,
        adjustment_pct: fraction * 100.0,
    }
}

// -----------------------------------------------------------------------------
// DISPLAY HELPERS
// -----------------------------------------------------------------------------

/// Round to two decimals for display. Never used as an adjustment base.
pub fn round_to_cents(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

/// Storefront price text, e.g. `140.00`
pub fn format_price(price: f64) -> String {
    format!("{:.2}", round_to_cents(price))
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn assert_price(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_boundary_scenarios_with_defaults() {
        let config = PricingConfig::default();

        let cases = [
            (5, Tier::Low, 140.0),
            (6, Tier::Medium, 120.0),
            (20, Tier::Medium, 120.0),
            (21, Tier::Normal, 100.0),
            (99, Tier::Normal, 100.0),
            (100, Tier::High, 85.0),
            (5000, Tier::High, 85.0),
        ];

        for (stock, tier, expected) in cases {
            let result = adjust(100.0, stock, &config);
            assert_eq!(result.tier, tier, "stock {stock}");
            assert_price(result.adjusted_price, expected);
        }
    }

    #[test]
    fn test_zero_base_price_floors_at_zero() {
        let result = adjust(0.0, 0, &PricingConfig::default());
        assert_eq!(result.tier, Tier::Low);
        assert_price(result.adjustment_pct, 40.0);
        assert_eq!(result.adjusted_price, 0.0);
        assert!(!result.adjusted_price.is_nan());
    }

    #[test]
    fn test_full_decrease_never_goes_negative() {
        let config = PricingConfig {
            high_stock_decrease_pct: 250.0,
            ..PricingConfig::default()
        };
        let result = adjust(80.0, 500, &config);
        assert_eq!(result.tier, Tier::High);
        assert_eq!(result.adjusted_price, 0.0);
    }

    #[test]
    fn test_adjustment_pct_sign_matches_tier() {
        let config = PricingConfig::default();
        assert_price(adjust(10.0, 1, &config).adjustment_pct, 40.0);
        assert_price(adjust(10.0, 10, &config).adjustment_pct, 20.0);
        assert_price(adjust(10.0, 150, &config).adjustment_pct, -15.0);
        assert_eq!(adjust(10.0, 50, &config).adjustment_pct, 0.0);
    }

    #[test]
    fn test_every_quantity_gets_exactly_one_tier_with_precedence() {
        let config = PricingConfig::default();
        for stock in 0..=200u32 {
            let (tier, _) = resolve_tier(stock, &config);
            let expected = if stock <= 5 {
                Tier::Low
            } else if stock <= 20 {
                Tier::Medium
            } else if stock >= 100 {
                Tier::High
            } else {
                Tier::Normal
            };
            assert_eq!(tier, expected, "stock {stock}");
        }
    }

    #[test]
    fn test_low_threshold_shadows_medium() {
        let config = PricingConfig {
            low_stock_threshold: 30,
            medium_stock_threshold: 20,
            ..PricingConfig::default()
        };
        assert_eq!(resolve_tier(25, &config).0, Tier::Low);
        assert_eq!(resolve_tier(31, &config).0, Tier::Normal);
    }

    #[test]
    fn test_high_threshold_below_medium_is_not_reordered() {
        let config = PricingConfig {
            medium_stock_threshold: 50,
            high_stock_threshold: 40,
            ..PricingConfig::default()
        };
        // 45 >= high threshold but MEDIUM is checked first
        assert_eq!(resolve_tier(45, &config).0, Tier::Medium);
        assert_eq!(resolve_tier(51, &config).0, Tier::High);
    }

    #[test]
    fn test_repeated_calls_with_same_base_do_not_compound() {
        let config = PricingConfig::default();
        let base_price = 59.99;
        let first = adjust(base_price, 3, &config);

        for _ in 0..10 {
            let again = adjust(base_price, 3, &config);
            assert_eq!(again, first);
        }
    }

    #[test]
    fn test_feeding_adjusted_price_back_stacks_the_adjustment() {
        let config = PricingConfig::default();
        let first = adjust(100.0, 5, &config);
        let stacked = adjust(first.adjusted_price, 5, &config);

        assert_price(first.adjusted_price, 140.0);
        assert_price(stacked.adjusted_price, 196.0);
        assert_ne!(stacked.adjusted_price, first.adjusted_price);
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(140.0), "140.00");
        assert_eq!(format_price(83.9915), "83.99");
        assert_eq!(format_price(0.0), "0.00");
    }
}
