//! Source orchestration.
//!
//! This module provides:
//! - The quote aggregator (cache-first, precedence-ordered source walk)
//! - Per-provider degradation tracking
//! - Per-key request coalescing
//! - Diagnostics for each source walk

mod aggregator;
mod circuit_breaker;
mod coalesce;
mod skip_reason;

pub use aggregator::{
    AggregatorConfig, CachedPayload, MarketDataCache, QuoteAggregator, SourceState,
    FIXED_INCOME_KEY, MOVERS_KEY,
};
pub use circuit_breaker::{BreakerConfig, CircuitBreaker, CircuitSnapshot, CircuitState};
pub use skip_reason::{FetchDiagnostics, ProviderAttempt, SkipReason};
