//! brapi.dev API response models.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Response from `/quote/{tickers}`
#[derive(Debug, Deserialize)]
pub struct QuoteResponse {
    #[serde(default)]
    pub results: Vec<QuoteResult>,
}

/// One ticker inside a quote response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResult {
    pub symbol: String,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub currency: Option<String>,
    pub regular_market_price: Option<Decimal>,
    pub regular_market_change: Option<Decimal>,
    pub regular_market_change_percent: Option<Decimal>,
    pub regular_market_previous_close: Option<Decimal>,
    pub regular_market_volume: Option<Decimal>,
    /// Present when a `range` was requested
    #[serde(default)]
    pub historical_data_price: Vec<HistoricalPrice>,
    // Note: regularMarketTime, logourl, fiftyTwoWeek* exist but are not mapped
}

/// Daily bar inside `historicalDataPrice`
#[derive(Debug, Deserialize)]
pub struct HistoricalPrice {
    /// Unix timestamp in seconds
    pub date: i64,
    pub close: Option<Decimal>,
    pub volume: Option<Decimal>,
}

/// Response from `/quote/list`
#[derive(Debug, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub stocks: Vec<ListItem>,
}

/// Ranked list entry
#[derive(Debug, Deserialize)]
pub struct ListItem {
    pub stock: String,
    pub name: Option<String>,
    pub close: Option<Decimal>,
    /// Percent change for the session
    pub change: Option<Decimal>,
    pub volume: Option<Decimal>,
    // Note: market_cap, logo, sector, type exist but are not mapped
}

/// Error body returned with non-2xx answers
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub message: Option<String>,
}
