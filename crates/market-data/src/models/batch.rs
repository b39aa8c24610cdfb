use std::collections::BTreeSet;

/// Normalize a raw ticker: trim and upper-case. Blank input yields `None`.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

/// Cache key for a single live-resolved quote.
pub fn quote_key(symbol: &str) -> String {
    format!("quote:{}", symbol)
}

/// A set of distinct, normalized symbols requested together.
///
/// Symbols are kept sorted so the batch key does not depend on request order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchRequest {
    symbols: BTreeSet<String>,
}

impl BatchRequest {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            symbols: symbols
                .into_iter()
                .filter_map(|s| normalize_symbol(s.as_ref()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.symbols.iter()
    }

    /// Deterministic cache key for this set, e.g. `quotes:KNRI11,VALE3`.
    pub fn batch_key(&self) -> String {
        let joined = self
            .symbols
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",");
        format!("quotes:{}", joined)
    }
}
