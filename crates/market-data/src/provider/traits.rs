//! Source adapter trait definitions.
//!
//! This module defines the core `QuoteProvider` trait that every upstream
//! quote source implements.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{FixedIncomeInstrument, Quote, QuoteSource};

use super::capabilities::ProviderCapabilities;
use super::status::{BatchFetch, FetchOutcome};

/// Trait for upstream quote sources.
///
/// Adapters never return errors: failures are reported through the
/// [`FetchStatus`](crate::provider::FetchStatus) of the outcome so the aggregator can keep walking the
/// precedence list. Adapters are shared across concurrent requests and must
/// not hold per-request state.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use finboard_market_data::provider::{BatchFetch, ProviderCapabilities, QuoteProvider};
/// use finboard_market_data::QuoteSource;
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl QuoteProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn source(&self) -> QuoteSource {
///         QuoteSource::Secondary
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities::default()
///     }
///
///     async fn fetch_batch(&self, symbols: &[String]) -> BatchFetch {
///         // ... call the upstream API
///     }
/// }
/// ```
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "BRAPI" or "YAHOO". Used for logging
    /// and degradation tracking.
    fn id(&self) -> &'static str;

    /// Precedence tier stamped on quotes this provider resolves.
    fn source(&self) -> QuoteSource;

    /// Describes which operations this provider can serve.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Fetch quotes for a batch of normalized symbols.
    ///
    /// Only resolved symbols appear in the returned map; the caller treats
    /// the rest as unresolved.
    async fn fetch_batch(&self, symbols: &[String]) -> BatchFetch;

    /// Fetch the provider's ranked list of top movers.
    async fn fetch_top_movers(&self) -> FetchOutcome<Vec<Quote>> {
        FetchOutcome::failed(
            MarketDataError::NotSupported {
                operation: "top movers".to_string(),
                provider: self.id().to_string(),
            }
            .fetch_status(),
        )
    }

    /// Fetch the provider's list of fixed-income instruments.
    async fn fetch_fixed_income(&self) -> FetchOutcome<Vec<FixedIncomeInstrument>> {
        FetchOutcome::failed(
            MarketDataError::NotSupported {
                operation: "fixed income".to_string(),
                provider: self.id().to_string(),
            }
            .fetch_status(),
        )
    }
}
