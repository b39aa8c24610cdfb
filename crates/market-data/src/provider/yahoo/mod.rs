//! Yahoo Finance market data provider.
//!
//! Secondary source for B3 tickers through the Yahoo Finance chart API.
//! Plain B3 tickers (e.g. VALE3) are looked up with an exchange suffix
//! (`VALE3.SA`); index symbols starting with `^` are passed through.
//!
//! Yahoo has no batch endpoint, so a batch is served one symbol at a time.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};
use yahoo_finance_api as yahoo;

use crate::errors::MarketDataError;
use crate::models::{PriceBar, Quote, QuoteSource};
use crate::provider::{
    with_timeout, BatchFetch, ProviderCapabilities, QuoteProvider, DEFAULT_PROVIDER_TIMEOUT,
};

const PROVIDER_ID: &str = "YAHOO";

/// Wiring for the Yahoo adapter.
#[derive(Clone, Debug)]
pub struct YahooConfig {
    /// Suffix appended to plain tickers (".SA" for B3).
    pub symbol_suffix: String,
    /// Chart range requested per symbol; its daily bars become the quote history.
    pub history_range: String,
    pub timeout: Duration,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            symbol_suffix: ".SA".to_string(),
            history_range: "5d".to_string(),
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }
}

/// Yahoo Finance quote provider.
pub struct YahooProvider {
    connector: yahoo::YahooConnector,
    config: YahooConfig,
}

impl YahooProvider {
    /// Create a new Yahoo Finance provider.
    pub fn new(config: YahooConfig) -> Result<Self, MarketDataError> {
        let connector = yahoo::YahooConnector::new().map_err(|e| {
            MarketDataError::Config(format!("Failed to initialize Yahoo connector: {}", e))
        })?;
        Ok(Self { connector, config })
    }

    /// Map a normalized ticker to the Yahoo symbol.
    fn to_yahoo_symbol(&self, symbol: &str) -> String {
        if symbol.starts_with('^') || symbol.contains('.') || self.config.symbol_suffix.is_empty()
        {
            symbol.to_string()
        } else {
            format!("{}{}", symbol, self.config.symbol_suffix)
        }
    }

    /// Fetch the recent daily bars and derive the change from the previous one.
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let yahoo_symbol = self.to_yahoo_symbol(symbol);

        let response = with_timeout(PROVIDER_ID, self.config.timeout, async {
            self.connector
                .get_quote_range(&yahoo_symbol, "1d", &self.config.history_range)
                .await
                .map_err(|e| map_yahoo_error(&yahoo_symbol, e))
        })
        .await?;

        let bars = response.quotes().map_err(|e| map_yahoo_error(&yahoo_symbol, e))?;
        let last = bars
            .last()
            .ok_or_else(|| MarketDataError::SymbolNotFound(yahoo_symbol.clone()))?;

        let mut quote = Quote::new(symbol, QuoteSource::Secondary, Utc::now());
        quote.price = Decimal::from_f64(last.close);
        quote.volume = Decimal::from_u64(last.volume);
        if bars.len() >= 2 {
            quote.previous_close = Decimal::from_f64(bars[bars.len() - 2].close);
        }
        quote.derive_change();
        quote.history = to_history(&bars);

        debug!("Yahoo: fetched {} as {}", symbol, yahoo_symbol);
        Ok(quote)
    }
}

/// Daily bars as history entries, oldest first. Bars with a bad timestamp are dropped.
fn to_history(bars: &[yahoo::Quote]) -> Vec<PriceBar> {
    bars.iter()
        .filter_map(|bar| {
            let date = Utc
                .timestamp_opt(bar.timestamp, 0)
                .single()?
                .date_naive();
            Some(PriceBar {
                date,
                close: Decimal::from_f64(bar.close),
                volume: Decimal::from_u64(bar.volume),
            })
        })
        .collect()
}

fn map_yahoo_error(symbol: &str, error: yahoo::YahooError) -> MarketDataError {
    match error {
        yahoo::YahooError::NoQuotes | yahoo::YahooError::NoResult => {
            MarketDataError::SymbolNotFound(symbol.to_string())
        }
        other => {
            let message = other.to_string();
            if message.contains("429") || message.to_lowercase().contains("too many requests") {
                MarketDataError::RateLimited {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                MarketDataError::Unavailable {
                    provider: PROVIDER_ID.to_string(),
                    message,
                }
            }
        }
    }
}

#[async_trait]
impl QuoteProvider for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn source(&self) -> QuoteSource {
        QuoteSource::Secondary
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_batch_quotes: true,
            supports_top_movers: false,
            supports_fixed_income: false,
            max_batch_size: 1,
        }
    }

    async fn fetch_batch(&self, symbols: &[String]) -> BatchFetch {
        let mut quotes = Vec::with_capacity(symbols.len());

        for symbol in symbols {
            match self.fetch_quote(symbol).await {
                Ok(quote) => quotes.push(quote),
                Err(MarketDataError::SymbolNotFound(_)) => {
                    debug!("Yahoo: no data for {}", symbol);
                }
                Err(e) => {
                    warn!("Yahoo: quote fetch failed for {}: {}", symbol, e);
                    let mut outcome = BatchFetch::from_quotes(symbols, quotes);
                    outcome.status = e.fetch_status();
                    return outcome;
                }
            }
        }

        BatchFetch::from_quotes(symbols, quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_suffix() {
        let provider = YahooProvider::new(YahooConfig::default()).unwrap();
        assert_eq!(provider.to_yahoo_symbol("VALE3"), "VALE3.SA");
        assert_eq!(provider.to_yahoo_symbol("^BVSP"), "^BVSP");
        assert_eq!(provider.to_yahoo_symbol("AAPL.MX"), "AAPL.MX");
    }

    #[test]
    fn test_no_suffix_configured() {
        let provider = YahooProvider::new(YahooConfig {
            symbol_suffix: String::new(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(provider.to_yahoo_symbol("AAPL"), "AAPL");
    }

    #[test]
    fn test_capabilities() {
        let provider = YahooProvider::new(YahooConfig::default()).unwrap();
        let caps = provider.capabilities();
        assert!(caps.supports_batch_quotes);
        assert!(!caps.supports_top_movers);
        assert_eq!(caps.max_batch_size, 1);
        assert_eq!(provider.source(), QuoteSource::Secondary);
    }

    #[test]
    fn test_history_from_bars() {
        let bar = |timestamp, close| yahoo::Quote {
            timestamp,
            open: close,
            high: close,
            low: close,
            volume: 1_000,
            close,
            adjclose: close,
        };
        // 2024-05-13 and 2024-05-14, 13:00 UTC
        let history = to_history(&[bar(1_715_605_200, 60.5), bar(1_715_691_600, 61.25)]);

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].date, chrono::NaiveDate::from_ymd_opt(2024, 5, 13).unwrap());
        assert_eq!(history[1].close, Some(rust_decimal_macros::dec!(61.25)));
        assert_eq!(history[1].volume, Some(Decimal::from(1_000)));
    }

    #[test]
    fn test_not_found_mapping() {
        let error = map_yahoo_error("XPTO3.SA", yahoo::YahooError::NoQuotes);
        assert!(matches!(error, MarketDataError::SymbolNotFound(_)));
    }
}
