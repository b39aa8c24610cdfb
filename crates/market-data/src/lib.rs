//! Finboard Market Data Crate
//!
//! This crate aggregates B3 (Brazilian exchange) quotes and fixed-income
//! data from several upstream sources for the Finboard dashboard.
//!
//! # Overview
//!
//! The market data crate supports:
//! - Batch quote lookups with per-symbol resolution status
//! - Multiple sources in precedence order: brapi.dev, Yahoo Finance, Tesouro Direto
//! - A static last-resort data set
//! - Per-entry expiring cache shared by all requests
//! - Temporary degradation of rate-limited sources
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |  HTTP handlers   |  (apps/server)
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! | QuoteAggregator  | <-> |  ExpiringCache   |  (batch / per-symbol / lists)
//! +------------------+     +------------------+
//!          |
//!          |-------------> +------------------+
//!          |               | CircuitBreaker   |  (degraded-until per source)
//!          |               +------------------+
//!          v
//! +------------------+
//! |  QuoteProvider   |  (Primary -> Secondary, skipping degraded)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! | StaticFallback   |  (whatever is still unresolved)
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`QuoteAggregator`] - Cache-first, precedence-ordered lookups
//! - [`Quote`] - Price and variation for one ticker
//! - [`QuoteLookup`] - Resolved quote or explicit unresolved marker
//! - [`FixedIncomeInstrument`] - Treasury bonds and other fixed income
//! - [`QuoteProvider`] - Trait every upstream source implements

pub mod cache;
pub mod config;
pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;

// Re-export all public types from models
pub use models::{
    normalize_symbol, BatchRequest, FixedIncomeInstrument, PriceBar, ProviderId, Quote,
    QuoteBatch, QuoteLookup, QuoteSource,
};

pub use cache::{Clock, ExpiringCache, ManualClock, SystemClock};
pub use config::{build_sources, parse_source_list, SourceKind, SourcesConfig};
pub use errors::MarketDataError;

// Re-export provider types
pub use provider::brapi::BrapiProvider;
pub use provider::static_fallback::StaticFallbackProvider;
pub use provider::tesouro::TesouroDiretoProvider;
pub use provider::yahoo::YahooProvider;
pub use provider::{FetchOutcome, FetchStatus, ProviderCapabilities, QuoteProvider};

// Re-export registry types
pub use registry::{
    AggregatorConfig, BreakerConfig, CachedPayload, CircuitBreaker, CircuitState,
    FetchDiagnostics, MarketDataCache, ProviderAttempt, QuoteAggregator, SkipReason, SourceState,
};
