//! Provider capabilities.
//!
//! Describes which aggregator operations a source adapter can serve.

use std::time::Duration;

/// Describes the capabilities of a quote provider.
///
/// Used by the aggregator to decide which adapters take part in a
/// precedence walk for a given operation.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Whether the provider answers per-symbol batch quote requests.
    pub supports_batch_quotes: bool,

    /// Whether the provider exposes a ranked "top movers" list.
    pub supports_top_movers: bool,

    /// Whether the provider lists fixed-income instruments.
    pub supports_fixed_income: bool,

    /// Largest batch the provider accepts in a single call.
    pub max_batch_size: usize,
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self {
            supports_batch_quotes: true,
            supports_top_movers: false,
            supports_fixed_income: false,
            max_batch_size: 20,
        }
    }
}

/// Default bound on a single outbound provider call.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);
