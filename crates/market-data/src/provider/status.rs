//! Outcome reporting for source adapter calls.

use std::collections::HashMap;

use crate::models::Quote;

/// How an adapter call went.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchStatus {
    /// Every requested item was resolved.
    Ok,
    /// Some requested symbols resolved, the rest did not.
    PartialOk,
    /// The provider throttled or banned the caller.
    RateLimited,
    /// Timeout, connection failure or server error.
    Unavailable,
    /// Anything else, with a short description.
    Error(String),
}

impl FetchStatus {
    /// True when the call produced usable data.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok | Self::PartialOk)
    }
}

impl std::fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::PartialOk => write!(f, "PARTIAL_OK"),
            Self::RateLimited => write!(f, "RATE_LIMITED"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::Error(detail) => write!(f, "ERROR ({})", detail),
        }
    }
}

/// Data returned by an adapter together with its status.
///
/// On failure `data` is empty and `status` says why.
#[derive(Clone, Debug)]
pub struct FetchOutcome<T> {
    pub data: T,
    pub status: FetchStatus,
}

impl<T: Default> FetchOutcome<T> {
    pub fn failed(status: FetchStatus) -> Self {
        Self {
            data: T::default(),
            status,
        }
    }
}

impl<T> FetchOutcome<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data,
            status: FetchStatus::Ok,
        }
    }
}

/// Result of a batch quote call, keyed by normalized symbol.
pub type BatchFetch = FetchOutcome<HashMap<String, Quote>>;

impl BatchFetch {
    /// Classify resolved quotes against the requested symbols.
    ///
    /// Quotes for symbols that were not requested are dropped.
    pub fn from_quotes(requested: &[String], quotes: Vec<Quote>) -> Self {
        let mut results = HashMap::with_capacity(quotes.len());
        for quote in quotes {
            if requested.iter().any(|s| *s == quote.symbol) {
                results.insert(quote.symbol.clone(), quote);
            }
        }

        let status = if results.len() == requested.len() {
            FetchStatus::Ok
        } else if results.is_empty() {
            FetchStatus::Error("No requested symbol was returned".to_string())
        } else {
            FetchStatus::PartialOk
        };

        Self {
            data: results,
            status,
        }
    }
}
