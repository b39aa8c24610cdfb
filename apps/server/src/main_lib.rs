use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use finboard_market_data::{
    build_sources, MarketDataCache, QuoteAggregator, StaticFallbackProvider,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub struct AppState {
    pub aggregator: Arc<QuoteAggregator>,
    /// Deadline handed to quote batches.
    pub request_timeout: Duration,
}

pub fn init_tracing() {
    let log_format = std::env::var("FB_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let providers = build_sources(&config.sources)?;

    // One cache for the whole process, shared by every request
    let cache = Arc::new(MarketDataCache::new());
    let aggregator = QuoteAggregator::new(providers, cache, config.aggregator.clone())
        .with_fallback(StaticFallbackProvider::builtin());

    tracing::info!(
        "Market data ready: quotes TTL {:?}, degradation window {:?}",
        config.aggregator.quotes_ttl,
        config.aggregator.breaker.degraded_duration
    );

    Ok(Arc::new(AppState {
        aggregator: Arc::new(aggregator),
        request_timeout: config.request_timeout,
    }))
}
