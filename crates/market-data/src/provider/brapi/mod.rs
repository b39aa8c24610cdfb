//! brapi.dev market data provider implementation.
//!
//! This module provides B3 (Brazilian exchange) market data from brapi.dev:
//! - Batch quotes via the /quote/{tickers} endpoint
//! - Ranked top movers via the /quote/list endpoint
//!
//! Requests are authenticated with an API token passed as the `token` query
//! parameter. API documentation: https://brapi.dev/docs

mod models;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use urlencoding::encode;

use crate::errors::MarketDataError;
use crate::models::{normalize_symbol, PriceBar, Quote, QuoteSource};
use crate::provider::{
    BatchFetch, FetchOutcome, FetchStatus, ProviderCapabilities, QuoteProvider,
    DEFAULT_PROVIDER_TIMEOUT,
};

use models::{ErrorResponse, HistoricalPrice, ListItem, ListResponse, QuoteResponse, QuoteResult};

pub const DEFAULT_BASE_URL: &str = "https://brapi.dev/api";
const PROVIDER_ID: &str = "BRAPI";

/// Wiring for the brapi adapter.
#[derive(Clone, Debug)]
pub struct BrapiConfig {
    pub base_url: String,
    pub token: String,
    pub timeout: Duration,
    /// Tickers per upstream call; larger batches are split.
    pub max_batch_size: usize,
    /// Entries requested from the ranked list endpoint.
    pub movers_limit: usize,
    /// Daily history range attached to quotes (e.g. "5d"); `None` skips it.
    pub history_range: Option<String>,
}

impl BrapiConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            timeout: DEFAULT_PROVIDER_TIMEOUT,
            max_batch_size: 10,
            movers_limit: 10,
            history_range: Some("5d".to_string()),
        }
    }
}

// ============================================================================
// BrapiProvider
// ============================================================================

/// brapi.dev quote provider, the primary source for B3 tickers.
pub struct BrapiProvider {
    client: Client,
    config: BrapiConfig,
    source: QuoteSource,
}

impl BrapiProvider {
    /// Create a new brapi provider. Fails when the token is missing.
    pub fn new(config: BrapiConfig) -> Result<Self, MarketDataError> {
        if config.token.trim().is_empty() {
            return Err(MarketDataError::Config(
                "brapi requires an API token".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MarketDataError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            source: QuoteSource::Primary,
        })
    }

    /// Override the precedence tier stamped on quotes.
    pub fn with_source(mut self, source: QuoteSource) -> Self {
        self.source = source;
        self
    }

    /// Make a GET request to the brapi API.
    async fn fetch(&self, path: &str, params: &[(&str, &str)]) -> Result<String, MarketDataError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);

        debug!("brapi request: {} with {} params", path, params.len());

        let response = self
            .client
            .get(&url)
            .query(&[("token", self.config.token.as_str())])
            .query(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MarketDataError::Timeout {
                        provider: PROVIDER_ID.to_string(),
                    }
                } else {
                    MarketDataError::Unavailable {
                        provider: PROVIDER_ID.to_string(),
                        message: format!("Request failed: {}", e),
                    }
                }
            })?;

        let status = response.status();

        // 402 and 403 are brapi's plan quota signals
        if matches!(
            status,
            StatusCode::TOO_MANY_REQUESTS | StatusCode::PAYMENT_REQUIRED | StatusCode::FORBIDDEN
        ) {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: "Invalid or missing API token".to_string(),
            });
        }

        if status.is_server_error() {
            return Err(MarketDataError::Unavailable {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        if status == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| "not found".to_string());
            return Err(MarketDataError::SymbolNotFound(message));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message,
            });
        }

        response.text().await.map_err(|e| MarketDataError::Unavailable {
            provider: PROVIDER_ID.to_string(),
            message: format!("Failed to read response: {}", e),
        })
    }

    /// Fetch one chunk of tickers from `/quote/{tickers}`.
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Vec<Quote>, MarketDataError> {
        let tickers = symbols
            .iter()
            .map(|s| encode(s).into_owned())
            .collect::<Vec<_>>()
            .join(",");

        let params: Vec<(&str, &str)> = match self.config.history_range.as_deref() {
            Some(range) => vec![("range", range), ("interval", "1d")],
            None => Vec::new(),
        };
        let text = self.fetch(&format!("/quote/{}", tickers), &params).await?;

        let response: QuoteResponse =
            serde_json::from_str(&text).map_err(|e| MarketDataError::ParseError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse quote response: {}", e),
            })?;

        let retrieved_at = Utc::now();
        Ok(response
            .results
            .into_iter()
            .filter_map(|r| self.map_quote(r, retrieved_at))
            .collect())
    }

    fn map_quote(&self, result: QuoteResult, retrieved_at: chrono::DateTime<Utc>) -> Option<Quote> {
        let symbol = normalize_symbol(&result.symbol)?;

        let mut quote = Quote::new(symbol, self.source, retrieved_at);
        quote.name = result.long_name.or(result.short_name);
        quote.price = result.regular_market_price;
        quote.change_absolute = result.regular_market_change;
        quote.change_percent = result.regular_market_change_percent;
        quote.previous_close = result.regular_market_previous_close;
        quote.volume = result.regular_market_volume;
        quote.currency = result.currency;
        quote.derive_change();
        quote.history = to_history(result.historical_data_price);
        Some(quote)
    }

    fn map_list_item(&self, item: ListItem, retrieved_at: chrono::DateTime<Utc>) -> Option<Quote> {
        let symbol = normalize_symbol(&item.stock)?;

        let mut quote = Quote::new(symbol, self.source, retrieved_at);
        quote.name = item.name;
        quote.price = item.close;
        quote.change_percent = item.change;
        quote.volume = item.volume;
        Some(quote)
    }

    /// Fetch the ranked list sorted by session change.
    async fn fetch_movers(&self) -> Result<Vec<Quote>, MarketDataError> {
        let limit = self.config.movers_limit.to_string();
        let params = [
            ("sortBy", "change"),
            ("sortOrder", "desc"),
            ("limit", limit.as_str()),
        ];

        let text = self.fetch("/quote/list", &params).await?;

        let response: ListResponse =
            serde_json::from_str(&text).map_err(|e| MarketDataError::ParseError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse list response: {}", e),
            })?;

        let retrieved_at = Utc::now();
        Ok(response
            .stocks
            .into_iter()
            .filter_map(|item| self.map_list_item(item, retrieved_at))
            .collect())
    }
}

/// Daily bars sorted oldest first; entries with an invalid date are dropped.
fn to_history(prices: Vec<HistoricalPrice>) -> Vec<PriceBar> {
    let mut history: Vec<PriceBar> = prices
        .into_iter()
        .filter_map(|price| {
            let date = Utc.timestamp_opt(price.date, 0).single()?.date_naive();
            Some(PriceBar {
                date,
                close: price.close,
                volume: price.volume,
            })
        })
        .collect();
    history.sort_by_key(|bar| bar.date);
    history
}

// ============================================================================
// QuoteProvider Implementation
// ============================================================================

#[async_trait]
impl QuoteProvider for BrapiProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn source(&self) -> QuoteSource {
        self.source
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_batch_quotes: true,
            supports_top_movers: true,
            supports_fixed_income: false,
            max_batch_size: self.config.max_batch_size.max(1),
        }
    }

    async fn fetch_batch(&self, symbols: &[String]) -> BatchFetch {
        let mut quotes = Vec::with_capacity(symbols.len());

        for chunk in symbols.chunks(self.config.max_batch_size.max(1)) {
            match self.fetch_quotes(chunk).await {
                Ok(mut resolved) => quotes.append(&mut resolved),
                Err(MarketDataError::SymbolNotFound(message)) => {
                    debug!("brapi: no data for {:?}: {}", chunk, message);
                }
                Err(e) => {
                    warn!("brapi: batch fetch failed for {:?}: {}", chunk, e);
                    // Keep what earlier chunks resolved; the status drives degradation.
                    let mut outcome = BatchFetch::from_quotes(symbols, quotes);
                    outcome.status = e.fetch_status();
                    return outcome;
                }
            }
        }

        BatchFetch::from_quotes(symbols, quotes)
    }

    async fn fetch_top_movers(&self) -> FetchOutcome<Vec<Quote>> {
        match self.fetch_movers().await {
            Ok(quotes) if quotes.is_empty() => {
                FetchOutcome::failed(FetchStatus::Error("empty movers list".to_string()))
            }
            Ok(quotes) => FetchOutcome::ok(quotes),
            Err(e) => {
                warn!("brapi: top movers fetch failed: {}", e);
                FetchOutcome::failed(e.fetch_status())
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
