//! Quote source adapters.
//!
//! This module contains:
//! - The `QuoteProvider` trait every upstream source implements
//! - Fetch status reporting (`FetchStatus`, `FetchOutcome`)
//! - Concrete adapters (brapi, Yahoo Finance, Tesouro Direto)
//! - The static last-resort data set
//!
//! # Architecture
//!
//! Adapters are:
//! - **Stateless**: only their wiring (endpoint, token, timeout) lives inside
//! - **Bounded**: every outbound call carries a timeout
//! - **Non-failing**: upstream errors become statuses, never `Err`

mod capabilities;
mod status;
mod traits;

pub mod brapi;
pub mod static_fallback;
pub mod tesouro;
pub mod yahoo;

use std::future::Future;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::errors::MarketDataError;

// Re-exports
pub use capabilities::{ProviderCapabilities, DEFAULT_PROVIDER_TIMEOUT};
pub use status::{BatchFetch, FetchOutcome, FetchStatus};
pub use traits::QuoteProvider;

/// Run `fut`, turning an elapsed `limit` into [`MarketDataError::Timeout`].
pub(crate) async fn with_timeout<T, F>(
    provider: &str,
    limit: Duration,
    fut: F,
) -> Result<T, MarketDataError>
where
    F: Future<Output = Result<T, MarketDataError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(MarketDataError::Timeout {
            provider: provider.to_string(),
        }),
    }
}

/// Parse a decimal written either as `1234.56` or in Brazilian notation `1.234,56`.
pub(crate) fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim().trim_end_matches('%').trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized = if trimmed.contains(',') {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.to_string()
    };
    normalized.parse::<Decimal>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_decimal_formats() {
        assert_eq!(parse_decimal("61.20"), Some(dec!(61.20)));
        assert_eq!(parse_decimal("10,23"), Some(dec!(10.23)));
        assert_eq!(parse_decimal("14.512,78"), Some(dec!(14512.78)));
        assert_eq!(parse_decimal("12,5%"), Some(dec!(12.5)));
        assert_eq!(parse_decimal("0"), Some(Decimal::ZERO));
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("n/a"), None);
    }

    #[tokio::test]
    async fn test_with_timeout_elapses() {
        let result: Result<(), MarketDataError> =
            with_timeout("SLOW", Duration::from_millis(10), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(MarketDataError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_through() {
        let result = with_timeout("FAST", Duration::from_secs(1), async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
