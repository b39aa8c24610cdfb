//! Source wiring: which adapters run, in which order, with which credentials.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::errors::MarketDataError;
use crate::models::QuoteSource;
use crate::provider::brapi::{BrapiConfig, BrapiProvider, DEFAULT_BASE_URL as BRAPI_BASE_URL};
use crate::provider::tesouro::{TesouroConfig, TesouroDiretoProvider};
use crate::provider::yahoo::{YahooConfig, YahooProvider};
use crate::provider::{QuoteProvider, DEFAULT_PROVIDER_TIMEOUT};

/// Adapters that can be enabled by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Brapi,
    Yahoo,
    Tesouro,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Brapi => "brapi",
            Self::Yahoo => "yahoo",
            Self::Tesouro => "tesouro",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "brapi" => Ok(Self::Brapi),
            "yahoo" => Ok(Self::Yahoo),
            "tesouro" | "tesouro-direto" => Ok(Self::Tesouro),
            other => Err(MarketDataError::Config(format!(
                "Unknown market data source '{}'",
                other
            ))),
        }
    }
}

/// Parse a comma-separated source list such as `brapi,yahoo,tesouro`.
///
/// Order is kept; repeated names are ignored after the first.
pub fn parse_source_list(raw: &str) -> Result<Vec<SourceKind>, MarketDataError> {
    let mut kinds = Vec::new();
    for name in raw.split(',').filter(|s| !s.trim().is_empty()) {
        let kind: SourceKind = name.parse()?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

/// Settings for every adapter that might be enabled.
#[derive(Clone, Debug)]
pub struct SourcesConfig {
    /// Enabled adapters in precedence order.
    pub enabled: Vec<SourceKind>,
    pub brapi_token: Option<String>,
    pub brapi_base_url: String,
    pub yahoo_suffix: String,
    pub tesouro: TesouroConfig,
    /// Per-call timeout applied to every adapter.
    pub timeout: Duration,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            enabled: vec![SourceKind::Brapi, SourceKind::Tesouro],
            brapi_token: None,
            brapi_base_url: BRAPI_BASE_URL.to_string(),
            yahoo_suffix: YahooConfig::default().symbol_suffix,
            tesouro: TesouroConfig::default(),
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }
}

/// Build the enabled adapters in precedence order.
///
/// The first quote adapter is Primary; a quote adapter after it is
/// Secondary. Fails on a missing credential instead of skipping the adapter.
pub fn build_sources(
    config: &SourcesConfig,
) -> Result<Vec<Arc<dyn QuoteProvider>>, MarketDataError> {
    let mut providers: Vec<Arc<dyn QuoteProvider>> = Vec::with_capacity(config.enabled.len());
    let mut quote_sources = 0;

    for kind in &config.enabled {
        let provider: Arc<dyn QuoteProvider> = match kind {
            SourceKind::Brapi => {
                let token = config
                    .brapi_token
                    .clone()
                    .filter(|t| !t.trim().is_empty())
                    .ok_or_else(|| {
                        MarketDataError::Config(
                            "brapi is enabled but no API token is configured".to_string(),
                        )
                    })?;
                let brapi_config = BrapiConfig {
                    base_url: config.brapi_base_url.clone(),
                    timeout: config.timeout,
                    ..BrapiConfig::new(token)
                };
                let tier = tier_for(quote_sources);
                quote_sources += 1;
                Arc::new(BrapiProvider::new(brapi_config)?.with_source(tier))
            }
            SourceKind::Yahoo => {
                quote_sources += 1;
                Arc::new(YahooProvider::new(YahooConfig {
                    symbol_suffix: config.yahoo_suffix.clone(),
                    timeout: config.timeout,
                    ..Default::default()
                })?)
            }
            SourceKind::Tesouro => Arc::new(TesouroDiretoProvider::new(TesouroConfig {
                timeout: config.timeout,
                ..config.tesouro.clone()
            })?),
        };
        providers.push(provider);
    }

    info!(
        "Market data sources initialized: {:?}",
        providers.iter().map(|p| p.id()).collect::<Vec<_>>()
    );
    Ok(providers)
}

fn tier_for(position: usize) -> QuoteSource {
    if position == 0 {
        QuoteSource::Primary
    } else {
        QuoteSource::Secondary
    }
}
