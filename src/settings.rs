// =============================================================================
// SETTINGS MODULE
// =============================================================================
// This module defines the pricing configuration and the single path through
// which raw settings become a PricingConfig.
//
// LEARNING NOTES:
// - Settings arrive as a loose key/value map (an admin form, a stored record)
// - Nothing here ever fails: bad values are coerced, out-of-range values are
//   clamped, missing keys fall back to defaults
// - Once built, a PricingConfig is immutable and passed around by reference
// =============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// SETTING KEYS
// =============================================================================
// These are the names used in the persisted settings record.

pub const KEY_ENABLE_PLUGIN: &str = "enable_plugin";
pub const KEY_LOW_STOCK_THRESHOLD: &str = "low_stock_threshold";
pub const KEY_LOW_STOCK_PRICE_INCREASE: &str = "low_stock_price_increase";
pub const KEY_MEDIUM_STOCK_THRESHOLD: &str = "medium_stock_threshold";
pub const KEY_MEDIUM_STOCK_PRICE_INCREASE: &str = "medium_stock_price_increase";
pub const KEY_HIGH_STOCK_THRESHOLD: &str = "high_stock_threshold";
pub const KEY_HIGH_STOCK_PRICE_DECREASE: &str = "high_stock_price_decrease";
pub const KEY_CUSTOMER_MESSAGE_ENABLED: &str = "customer_message_enabled";
pub const KEY_CUSTOMER_MESSAGE: &str = "customer_message";

/// Message shown near the price when none is configured
pub const DEFAULT_CUSTOMER_MESSAGE: &str = "High demand - price adjusted based on availability";

// -----------------------------------------------------------------------------
// BOUNDS
// -----------------------------------------------------------------------------
pub const MAX_THRESHOLD: u32 = 10_000;
pub const MAX_INCREASE_PCT: f64 = 1_000.0;
pub const MAX_DECREASE_PCT: f64 = 100.0;

// =============================================================================
// PRICING CONFIG
// =============================================================================
/// Tier thresholds and percentages, plus the customer message settings.
///
/// All numeric fields are within bounds by construction when built through
/// [`PricingConfig::from_settings`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub enabled: bool,

    /// Stock at or below this is LOW
    pub low_stock_threshold: u32,
    pub low_stock_increase_pct: f64,

    /// Stock at or below this (and above LOW) is MEDIUM
    pub medium_stock_threshold: u32,
    pub medium_stock_increase_pct: f64,

    /// Stock at or above this (when not LOW/MEDIUM) is HIGH
    pub high_stock_threshold: u32,
    pub high_stock_decrease_pct: f64,

    pub customer_message_enabled: bool,
    pub customer_message: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            low_stock_threshold: 5,
            low_stock_increase_pct: 40.0,
            medium_stock_threshold: 20,
            medium_stock_increase_pct: 20.0,
            high_stock_threshold: 100,
            high_stock_decrease_pct: 15.0,
            customer_message_enabled: true,
            customer_message: DEFAULT_CUSTOMER_MESSAGE.to_string(),
        }
    }
}

impl PricingConfig {
    // -------------------------------------------------------------------------
    // INGESTION
    // -------------------------------------------------------------------------
    /// Build a config from a raw settings map.
    ///
    /// Used both for admin updates and for records loaded from the store, so
    /// a stored record is re-clamped every time it is read.
    ///
    /// # Example
    /// ```
    /// let raw = serde_json::json!({ "low_stock_price_increase": 5000 });
    /// let config = PricingConfig::from_settings(raw.as_object().unwrap());
    /// assert_eq!(config.low_stock_increase_pct, 1000.0);
    /// ```
    pub fn from_settings(raw: &Map<String, Value>) -> Self {
        let defaults = Self::default();

        let threshold = |key: &str, default: u32| -> u32 {
            match raw.get(key) {
                Some(value) => coerce_int(value).clamp(0, MAX_THRESHOLD as i64) as u32,
                None => default,
            }
        };
        let percentage = |key: &str, default: f64, max: f64| -> f64 {
            match raw.get(key) {
                Some(value) => coerce_number(value).clamp(0.0, max),
                None => default,
            }
        };
        let flag = |key: &str, default: bool| -> bool {
            raw.get(key).map(is_truthy).unwrap_or(default)
        };

        let customer_message = raw
            .get(KEY_CUSTOMER_MESSAGE)
            .and_then(Value::as_str)
            .map(sanitize_text)
            .filter(|message| !message.is_empty())
            .unwrap_or(defaults.customer_message);

        Self {
            enabled: flag(KEY_ENABLE_PLUGIN, defaults.enabled),
            low_stock_threshold: threshold(KEY_LOW_STOCK_THRESHOLD, defaults.low_stock_threshold),
            low_stock_increase_pct: percentage(
                KEY_LOW_STOCK_PRICE_INCREASE,
                defaults.low_stock_increase_pct,
                MAX_INCREASE_PCT,
            ),
            medium_stock_threshold: threshold(
                KEY_MEDIUM_STOCK_THRESHOLD,
                defaults.medium_stock_threshold,
            ),
            medium_stock_increase_pct: percentage(
                KEY_MEDIUM_STOCK_PRICE_INCREASE,
                defaults.medium_stock_increase_pct,
                MAX_INCREASE_PCT,
            ),
            high_stock_threshold: threshold(KEY_HIGH_STOCK_THRESHOLD, defaults.high_stock_threshold),
            high_stock_decrease_pct: percentage(
                KEY_HIGH_STOCK_PRICE_DECREASE,
                defaults.high_stock_decrease_pct,
                MAX_DECREASE_PCT,
            ),
            customer_message_enabled: flag(
                KEY_CUSTOMER_MESSAGE_ENABLED,
                defaults.customer_message_enabled,
            ),
            customer_message,
        }
    }

    /// Serialize into the persisted record shape, using the keys above
    pub fn to_settings(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(KEY_ENABLE_PLUGIN.into(), Value::from(self.enabled as u8));
        map.insert(KEY_LOW_STOCK_THRESHOLD.into(), Value::from(self.low_stock_threshold));
        map.insert(KEY_LOW_STOCK_PRICE_INCREASE.into(), Value::from(self.low_stock_increase_pct));
        map.insert(KEY_MEDIUM_STOCK_THRESHOLD.into(), Value::from(self.medium_stock_threshold));
        map.insert(
            KEY_MEDIUM_STOCK_PRICE_INCREASE.into(),
            Value::from(self.medium_stock_increase_pct),
        );
        map.insert(KEY_HIGH_STOCK_THRESHOLD.into(), Value::from(self.high_stock_threshold));
        map.insert(
            KEY_HIGH_STOCK_PRICE_DECREASE.into(),
            Value::from(self.high_stock_decrease_pct),
        );
        map.insert(
            KEY_CUSTOMER_MESSAGE_ENABLED.into(),
            Value::from(self.customer_message_enabled as u8),
        );
        map.insert(KEY_CUSTOMER_MESSAGE.into(), Value::from(self.customer_message.clone()));
        map
    }
}

// =============================================================================
// COERCION HELPERS
// =============================================================================
// Form submissions send everything as strings, stored records send numbers.
// Both must be accepted.

/// Integer view of a loose value. Strings use their leading integer prefix
/// ("12abc" -> 12), anything unparseable is 0.
fn coerce_int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => leading_number(s).map(|f| f.trunc() as i64).unwrap_or(0),
        Value::Bool(b) => *b as i64,
        _ => 0,
    }
}

/// Like `coerce_int` but keeps fractional percentages ("12.5" -> 12.5)
fn coerce_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).unwrap_or(0.0),
        Value::String(s) => leading_number(s).unwrap_or(0.0),
        Value::Bool(b) => *b as u8 as f64,
        _ => 0.0,
    }
}

/// Parse the longest numeric prefix of a trimmed string
fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;

    for (i, c) in s.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }

    if !seen_digit {
        return None;
    }
    s[..end].trim_end_matches('.').parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Checkbox semantics: present and non-empty means on, except "0"/false
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Plain-text sanitizing: drop `<...>` markup tags, collapse whitespace,
/// trim. A `<` with no closing `>` after it is ordinary text.
fn sanitize_text(input: &str) -> String {
    let mut text = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find('<') {
        text.push_str(&rest[..open]);
        match rest[open..].find('>') {
            Some(close) => rest = &rest[open + close + 1..],
            None => {
                text.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    text.push_str(rest);

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
