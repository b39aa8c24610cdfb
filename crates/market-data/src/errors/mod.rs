//! Error types for the market data crate.
//!
//! Adapters work with [`MarketDataError`] internally and convert it into a
//! [`FetchStatus`] at the provider boundary via [`MarketDataError::fetch_status`].
//! Only configuration errors ever leave the crate as errors.

use thiserror::Error;

use crate::provider::FetchStatus;

/// Errors that can occur during market data operations.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The requested symbol was not found by the provider.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The provider rate limited the request (HTTP 429 or a quota signal).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The provider answered with a server error or could not be reached.
    #[error("Provider unavailable: {provider} - {message}")]
    Unavailable {
        /// The provider that failed
        provider: String,
        /// What went wrong
        message: String,
    },

    /// A provider-specific error occurred.
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The provider response could not be decoded.
    #[error("Parse error: {provider} - {message}")]
    ParseError {
        /// The provider whose payload was malformed
        provider: String,
        /// Decoder message
        message: String,
    },

    /// The operation is not offered by this provider.
    #[error("Not supported: {operation} by {provider}")]
    NotSupported {
        /// The operation that was requested
        operation: String,
        /// The provider that does not support it
        provider: String,
    },

    /// Invalid or incomplete configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Returns the status an adapter reports to the aggregator for this error.
    ///
    /// - Rate limiting maps to [`FetchStatus::RateLimited`], which degrades the source.
    /// - Timeouts, connection failures and 5xx answers map to [`FetchStatus::Unavailable`].
    /// - Everything else is a plain [`FetchStatus::Error`] carrying the message.
    ///
    /// # Examples
    ///
    /// ```
    /// use finboard_market_data::errors::MarketDataError;
    /// use finboard_market_data::provider::FetchStatus;
    ///
    /// let error = MarketDataError::RateLimited { provider: "BRAPI".to_string() };
    /// assert_eq!(error.fetch_status(), FetchStatus::RateLimited);
    ///
    /// let error = MarketDataError::Timeout { provider: "BRAPI".to_string() };
    /// assert_eq!(error.fetch_status(), FetchStatus::Unavailable);
    /// ```
    pub fn fetch_status(&self) -> FetchStatus {
        match self {
            Self::RateLimited { .. } => FetchStatus::RateLimited,

            Self::Timeout { .. } | Self::Unavailable { .. } => FetchStatus::Unavailable,

            Self::Network(e) if e.is_timeout() || e.is_connect() => FetchStatus::Unavailable,

            Self::SymbolNotFound(_)
            | Self::ProviderError { .. }
            | Self::ParseError { .. }
            | Self::NotSupported { .. }
            | Self::Config(_)
            | Self::Network(_) => FetchStatus::Error(self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_degrades() {
        let error = MarketDataError::RateLimited {
            provider: "BRAPI".to_string(),
        };
        assert_eq!(error.fetch_status(), FetchStatus::RateLimited);
    }

    #[test]
    fn test_timeout_is_unavailable() {
        let error = MarketDataError::Timeout {
            provider: "TESOURO".to_string(),
        };
        assert_eq!(error.fetch_status(), FetchStatus::Unavailable);
    }

    #[test]
    fn test_server_error_is_unavailable() {
        let error = MarketDataError::Unavailable {
            provider: "BRAPI".to_string(),
            message: "HTTP 503".to_string(),
        };
        assert_eq!(error.fetch_status(), FetchStatus::Unavailable);
    }

    #[test]
    fn test_provider_error_carries_message() {
        let error = MarketDataError::ProviderError {
            provider: "BRAPI".to_string(),
            message: "Invalid token".to_string(),
        };
        assert_eq!(
            error.fetch_status(),
            FetchStatus::Error("Provider error: BRAPI - Invalid token".to_string())
        );
    }

    #[test]
    fn test_error_display() {
        let error = MarketDataError::SymbolNotFound("XPTO3".to_string());
        assert_eq!(format!("{}", error), "Symbol not found: XPTO3");

        let error = MarketDataError::Config("FB_BRAPI_TOKEN is required".to_string());
        assert_eq!(
            format!("{}", error),
            "Configuration error: FB_BRAPI_TOKEN is required"
        );
    }
}
