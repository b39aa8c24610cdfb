use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Precedence tier a quote was resolved from.
///
/// Ordering follows precedence: `Primary < Secondary < Static`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteSource {
    Primary,
    Secondary,
    Static,
}

impl std::fmt::Display for QuoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "PRIMARY"),
            Self::Secondary => write!(f, "SECONDARY"),
            Self::Static => write!(f, "STATIC"),
        }
    }
}

/// One daily bar of a recent price history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBar {
    pub date: NaiveDate,
    pub close: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,
}

/// Market data quote
///
/// Absent numeric fields mean the provider did not report them. They are never
/// coerced to zero, since zero is a valid price or variation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Normalized (upper-cased) ticker
    pub symbol: String,

    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Last traded / current price
    pub price: Option<Decimal>,

    /// Absolute change against the previous close
    pub change_absolute: Option<Decimal>,

    /// Percent change against the previous close (1.5 means +1.5%)
    pub change_percent: Option<Decimal>,

    /// Previous session close
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_close: Option<Decimal>,

    /// Session volume
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,

    /// Quote currency
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    /// Moment the adapter call succeeded
    pub retrieved_at: DateTime<Utc>,

    /// Tier that resolved this quote
    pub source: QuoteSource,

    /// Last few daily bars, oldest first, when the provider reports them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<PriceBar>,
}

impl Quote {
    /// Create a quote with only the identity fields set.
    pub fn new(symbol: impl Into<String>, source: QuoteSource, retrieved_at: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            name: None,
            price: None,
            change_absolute: None,
            change_percent: None,
            previous_close: None,
            volume: None,
            currency: None,
            retrieved_at,
            source,
            history: Vec::new(),
        }
    }

    /// Fill missing change fields from `price` and `previous_close`.
    ///
    /// Fields the provider reported are left untouched. The percentage is only
    /// derived when the previous close is non-zero. Values that overflow stay
    /// absent.
    pub fn derive_change(&mut self) {
        let (Some(price), Some(previous)) = (self.price, self.previous_close) else {
            return;
        };

        let Some(change) = price.checked_sub(previous) else {
            return;
        };
        if self.change_absolute.is_none() {
            self.change_absolute = Some(change);
        }
        if self.change_percent.is_none() {
            self.change_percent = change
                .checked_div(previous)
                .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
                .map(|percent| percent.round_dp(4));
        }
    }
}

/// Result of looking up a single symbol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum QuoteLookup {
    /// A quote was found.
    Resolved(Quote),
    /// No source had data for this symbol.
    Unresolved,
}

impl QuoteLookup {
    pub fn quote(&self) -> Option<&Quote> {
        match self {
            Self::Resolved(quote) => Some(quote),
            Self::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Per-symbol results of a batch request, keyed by normalized symbol.
pub type QuoteBatch = BTreeMap<String, QuoteLookup>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_new_has_no_prices() {
        let quote = Quote::new("VALE3", QuoteSource::Primary, Utc::now());
        assert_eq!(quote.symbol, "VALE3");
        assert!(quote.price.is_none());
        assert!(quote.change_percent.is_none());
    }

    #[test]
    fn test_derive_change_from_previous_close() {
        let mut quote = Quote::new("PETR4", QuoteSource::Secondary, Utc::now());
        quote.price = Some(dec!(40.40));
        quote.previous_close = Some(dec!(40.00));
        quote.derive_change();

        assert_eq!(quote.change_absolute, Some(dec!(0.40)));
        assert_eq!(quote.change_percent, Some(dec!(1.0000)));
    }

    #[test]
    fn test_derive_change_keeps_reported_values() {
        let mut quote = Quote::new("PETR4", QuoteSource::Primary, Utc::now());
        quote.price = Some(dec!(40.40));
        quote.previous_close = Some(dec!(40.00));
        quote.change_percent = Some(dec!(1.1));
        quote.derive_change();

        assert_eq!(quote.change_percent, Some(dec!(1.1)));
        assert_eq!(quote.change_absolute, Some(dec!(0.40)));
    }

    #[test]
    fn test_derive_change_zero_previous_close() {
        let mut quote = Quote::new("NEW11", QuoteSource::Primary, Utc::now());
        quote.price = Some(dec!(10));
        quote.previous_close = Some(Decimal::ZERO);
        quote.derive_change();

        assert_eq!(quote.change_absolute, Some(dec!(10)));
        assert!(quote.change_percent.is_none());
    }

    #[test]
    fn test_zero_price_is_not_absent() {
        let mut quote = Quote::new("ZERO3", QuoteSource::Primary, Utc::now());
        quote.price = Some(Decimal::ZERO);
        let json = serde_json::to_value(&quote).unwrap();
        assert!(!json["price"].is_null());
        assert!(json["changePercent"].is_null());
        assert!(json.get("retrievedAt").is_some());
        assert!(json.get("history").is_none());
    }

    #[test]
    fn test_derive_change_overflow_stays_absent() {
        let mut quote = Quote::new("HUGE3", QuoteSource::Primary, Utc::now());
        quote.price = Some(Decimal::MAX);
        quote.previous_close = Some(dec!(0.0000001));
        quote.derive_change();

        assert!(quote.change_percent.is_none());

        quote.previous_close = Some(Decimal::MIN);
        quote.change_absolute = None;
        quote.derive_change();
        assert!(quote.change_absolute.is_none());
    }

    #[test]
    fn test_lookup_serialization() {
        let unresolved = serde_json::to_value(QuoteLookup::Unresolved).unwrap();
        assert_eq!(unresolved, serde_json::json!({ "status": "unresolved" }));

        let quote = Quote::new("VALE3", QuoteSource::Static, Utc::now());
        let resolved = serde_json::to_value(QuoteLookup::Resolved(quote)).unwrap();
        assert_eq!(resolved["status"], "resolved");
        assert_eq!(resolved["symbol"], "VALE3");
        assert_eq!(resolved["source"], "STATIC");
    }
}
