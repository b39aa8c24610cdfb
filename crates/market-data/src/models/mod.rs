//! Market data models
//!
//! This module contains the core data types for market data operations:
//! - `types` - Type aliases for common identifiers (ProviderId)
//! - `quote` - Quote data structures (Quote, PriceBar, QuoteSource, QuoteLookup, QuoteBatch)
//! - `batch` - Normalized symbol sets and their cache keys (BatchRequest)
//! - `fixed_income` - Treasury and fixed-income instruments (FixedIncomeInstrument)

mod batch;
mod fixed_income;
mod quote;
mod types;

pub use batch::{normalize_symbol, quote_key, BatchRequest};
pub use fixed_income::FixedIncomeInstrument;
pub use quote::{PriceBar, Quote, QuoteBatch, QuoteLookup, QuoteSource};
pub use types::ProviderId;
