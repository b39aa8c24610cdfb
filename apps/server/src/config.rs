use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};
use finboard_market_data::provider::tesouro::TesouroConfig;
use finboard_market_data::{
    parse_source_list, AggregatorConfig, BreakerConfig, SourceKind, SourcesConfig,
};

pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    /// Overall budget for one HTTP request; quote batches use it as their deadline.
    pub request_timeout: Duration,
    pub sources: SourcesConfig,
    pub aggregator: AggregatorConfig,
}

impl Config {
    /// Read the configuration from the process environment (and `.env`).
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup. Invalid values are errors.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let listen_addr: SocketAddr = var("FB_LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .context("Invalid FB_LISTEN_ADDR")?;
        let cors_allow = var("FB_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = parse_or("FB_REQUEST_TIMEOUT_MS", var("FB_REQUEST_TIMEOUT_MS"), 8000)?;

        let enabled = match var("FB_SOURCES") {
            Some(raw) => parse_source_list(&raw).context("Invalid FB_SOURCES")?,
            None => vec![SourceKind::Brapi, SourceKind::Tesouro],
        };
        if enabled.is_empty() {
            return Err(anyhow!("FB_SOURCES must name at least one source"));
        }

        let defaults = SourcesConfig::default();
        let tesouro_defaults = TesouroConfig::default();
        let sources = SourcesConfig {
            enabled,
            brapi_token: var("FB_BRAPI_TOKEN"),
            brapi_base_url: var("FB_BRAPI_URL").unwrap_or(defaults.brapi_base_url),
            yahoo_suffix: lookup("FB_YAHOO_SUFFIX").unwrap_or(defaults.yahoo_suffix),
            tesouro: TesouroConfig {
                base_url: var("FB_TESOURO_URL").unwrap_or(tesouro_defaults.base_url.clone()),
                resource_id: var("FB_TESOURO_RESOURCE_ID")
                    .unwrap_or(tesouro_defaults.resource_id.clone()),
                ..tesouro_defaults
            },
            timeout: secs_or("FB_PROVIDER_TIMEOUT_SECS", &var, defaults.timeout)?,
        };

        let agg_defaults = AggregatorConfig::default();
        let breaker_defaults = BreakerConfig::default();
        let aggregator = AggregatorConfig {
            quotes_ttl: secs_or("FB_QUOTES_TTL_SECS", &var, agg_defaults.quotes_ttl)?,
            fallback_ttl: secs_or("FB_FALLBACK_TTL_SECS", &var, agg_defaults.fallback_ttl)?,
            movers_ttl: secs_or("FB_MOVERS_TTL_SECS", &var, agg_defaults.movers_ttl)?,
            fixed_income_ttl: secs_or(
                "FB_FIXED_INCOME_TTL_SECS",
                &var,
                agg_defaults.fixed_income_ttl,
            )?,
            index_symbols: match var("FB_INDEX_SYMBOLS") {
                Some(raw) => raw
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                None => agg_defaults.index_symbols,
            },
            coalesce_requests: agg_defaults.coalesce_requests,
            breaker: BreakerConfig {
                degraded_duration: secs_or(
                    "FB_DEGRADED_SECS",
                    &var,
                    breaker_defaults.degraded_duration,
                )?,
                backoff_factor: parse_or(
                    "FB_DEGRADED_BACKOFF",
                    var("FB_DEGRADED_BACKOFF"),
                    breaker_defaults.backoff_factor,
                )?,
                max_degraded_duration: secs_or(
                    "FB_DEGRADED_MAX_SECS",
                    &var,
                    breaker_defaults.max_degraded_duration,
                )?,
            },
        };

        Ok(Self {
            listen_addr,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            sources,
            aggregator,
        })
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid {}='{}': {}", key, value, e)),
        None => Ok(default),
    }
}

fn secs_or<F>(key: &str, var: &F, default: Duration) -> anyhow::Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let default_secs = default.as_secs();
    parse_or(key, var(key), default_secs).map(Duration::from_secs)
}
