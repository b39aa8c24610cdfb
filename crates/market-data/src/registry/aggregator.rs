//! Quote aggregator: the cache-first, precedence-ordered source walk.
//!
//! For a batch of symbols the aggregator:
//! 1. Normalizes and de-duplicates the symbols and derives the batch key
//! 2. Returns a cached batch verbatim when one is still valid
//! 3. Pre-resolves symbols from per-symbol cache entries
//! 4. Walks the live sources in precedence order, skipping degraded ones and
//!    asking each only for the symbols still missing
//! 5. Fills what is left from the static fallback, or marks it unresolved
//! 6. Caches the merged batch and every freshly resolved live quote
//!
//! Upstream failure never surfaces as an error; it shows up as unresolved
//! symbols or as data from a lower tier.

use std::borrow::Cow;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::time::Instant;

use super::circuit_breaker::{BreakerConfig, CircuitBreaker};
use super::coalesce::{CoalesceGuard, RequestCoalescer};
use super::skip_reason::{FetchDiagnostics, SkipReason};
use crate::cache::{Clock, ExpiringCache};
use crate::models::{
    normalize_symbol, quote_key, BatchRequest, FixedIncomeInstrument, ProviderId, Quote,
    QuoteBatch, QuoteLookup, QuoteSource,
};
use crate::provider::static_fallback::StaticFallbackProvider;
use crate::provider::{FetchOutcome, FetchStatus, ProviderCapabilities, QuoteProvider};

/// Cache key for the top movers list.
pub const MOVERS_KEY: &str = "movers:top";

/// Cache key for the fixed-income list.
pub const FIXED_INCOME_KEY: &str = "fixed-income:list";

/// Everything the aggregator stores in its cache.
///
/// Batches and lists are shared behind `Arc` so repeated hits hand out the
/// same object.
#[derive(Clone, Debug)]
pub enum CachedPayload {
    Batch(Arc<QuoteBatch>),
    Quote(Quote),
    Movers(Arc<Vec<Quote>>),
    FixedIncome(Arc<Vec<FixedIncomeInstrument>>),
}

/// The cache the aggregator is built around.
pub type MarketDataCache = ExpiringCache<CachedPayload>;

/// Aggregator tuning.
#[derive(Clone, Debug)]
pub struct AggregatorConfig {
    /// Lifetime of batches with at least one live quote, and of per-symbol entries.
    pub quotes_ttl: Duration,
    /// Lifetime of batches served only from the static fallback.
    pub fallback_ttl: Duration,
    pub movers_ttl: Duration,
    pub fixed_income_ttl: Duration,
    /// Symbols served by [`QuoteAggregator::list_market_indices`].
    pub index_symbols: Vec<String>,
    /// Let concurrent misses on the same key share one source walk.
    pub coalesce_requests: bool,
    pub breaker: BreakerConfig,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            quotes_ttl: Duration::from_secs(300),
            fallback_ttl: Duration::from_secs(60),
            movers_ttl: Duration::from_secs(300),
            fixed_income_ttl: Duration::from_secs(3600),
            index_symbols: vec!["^BVSP".to_string(), "IFIX".to_string()],
            coalesce_requests: true,
            breaker: BreakerConfig::default(),
        }
    }
}

/// Degradation view of one configured source.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceState {
    pub id: String,
    pub source: QuoteSource,
    pub degraded: bool,
    /// Seconds left in the degradation window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_for_secs: Option<u64>,
    pub strikes: u32,
}

/// Items whose source tier is stamped by the aggregator.
trait Sourced {
    fn set_source(&mut self, source: QuoteSource);
}

impl Sourced for Quote {
    fn set_source(&mut self, source: QuoteSource) {
        self.source = source;
    }
}

impl Sourced for FixedIncomeInstrument {
    fn set_source(&mut self, source: QuoteSource) {
        self.source = source;
    }
}

type ListFuture<'p, T> = Pin<Box<dyn Future<Output = FetchOutcome<Vec<T>>> + Send + 'p>>;

fn fetch_movers(provider: &dyn QuoteProvider) -> ListFuture<'_, Quote> {
    provider.fetch_top_movers()
}

fn fetch_fixed_income(provider: &dyn QuoteProvider) -> ListFuture<'_, FixedIncomeInstrument> {
    provider.fetch_fixed_income()
}

/// Await `fut`, giving up once `deadline` passes.
async fn within_deadline<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}

/// Orchestrates quote lookups across cache, live sources and static fallback.
pub struct QuoteAggregator {
    /// Live sources in precedence order.
    providers: Vec<Arc<dyn QuoteProvider>>,
    fallback: Option<StaticFallbackProvider>,
    cache: Arc<MarketDataCache>,
    breaker: CircuitBreaker,
    coalescer: RequestCoalescer,
    config: AggregatorConfig,
}

impl QuoteAggregator {
    /// Create an aggregator over `providers`.
    ///
    /// Providers keep their relative order within a tier; tiers are walked
    /// Primary before Secondary.
    pub fn new(
        mut providers: Vec<Arc<dyn QuoteProvider>>,
        cache: Arc<MarketDataCache>,
        config: AggregatorConfig,
    ) -> Self {
        providers.sort_by_key(|p| p.source());

        let breaker = CircuitBreaker::with_config(config.breaker.clone());
        Self {
            providers,
            fallback: None,
            cache,
            breaker,
            coalescer: RequestCoalescer::new(),
            config,
        }
    }

    /// Consult `fallback` for whatever the live sources leave unresolved.
    pub fn with_fallback(mut self, fallback: StaticFallbackProvider) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Drive degradation windows from `clock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.breaker = CircuitBreaker::with_clock(self.config.breaker.clone(), clock);
        self
    }

    pub fn cache(&self) -> &Arc<MarketDataCache> {
        &self.cache
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    // =========================================================================
    // Quotes
    // =========================================================================

    /// Look up a single ticker. `None` means no tier had data for it.
    pub async fn get_quote(&self, symbol: &str) -> Option<Quote> {
        let symbol = normalize_symbol(symbol)?;
        let request = BatchRequest::new([symbol.as_str()]);

        let batch = self.resolve_batch(&request, None).await;
        batch.get(&symbol).and_then(QuoteLookup::quote).cloned()
    }

    /// Look up a batch of tickers.
    ///
    /// Every distinct normalized symbol appears in the result, resolved or not.
    pub async fn get_quotes<S: AsRef<str> + Sync>(&self, symbols: &[S]) -> Arc<QuoteBatch> {
        let request = BatchRequest::new(symbols);
        self.resolve_batch(&request, None).await
    }

    /// Like [`get_quotes`](Self::get_quotes), bounded by `deadline` overall.
    ///
    /// When the deadline passes mid-walk the symbols resolved so far are
    /// returned and the batch is not cached.
    pub async fn get_quotes_with_deadline<S: AsRef<str> + Sync>(
        &self,
        symbols: &[S],
        deadline: Duration,
    ) -> Arc<QuoteBatch> {
        let request = BatchRequest::new(symbols);
        self.resolve_batch(&request, Some(Instant::now() + deadline))
            .await
    }

    /// Quotes for the configured market index symbols.
    pub async fn list_market_indices(&self) -> Arc<QuoteBatch> {
        self.get_quotes(self.config.index_symbols.as_slice()).await
    }

    fn cached_batch(&self, key: &str) -> Option<Arc<QuoteBatch>> {
        match self.cache.get(key) {
            Some(CachedPayload::Batch(batch)) => Some(batch),
            _ => None,
        }
    }

    async fn coalesce(&self, key: &str) -> Option<CoalesceGuard<'_>> {
        if self.config.coalesce_requests {
            Some(self.coalescer.acquire(key).await)
        } else {
            None
        }
    }

    async fn resolve_batch(
        &self,
        request: &BatchRequest,
        deadline: Option<Instant>,
    ) -> Arc<QuoteBatch> {
        if request.is_empty() {
            return Arc::new(QuoteBatch::new());
        }

        let key = request.batch_key();
        if let Some(batch) = self.cached_batch(&key) {
            debug!("Cache hit for '{}'", key);
            return batch;
        }

        let mut cut_short = false;
        let guard = match within_deadline(deadline, self.coalesce(&key)).await {
            Some(guard) => guard,
            None => {
                cut_short = true;
                None
            }
        };
        if guard.is_some() {
            if let Some(batch) = self.cached_batch(&key) {
                debug!("Cache filled for '{}' while waiting", key);
                return batch;
            }
        }

        // A batch built from cached quotes must not outlive the oldest of them
        let mut reused_remaining: Option<Duration> = None;
        let mut resolved: HashMap<String, Quote> = HashMap::with_capacity(request.len());
        for symbol in request.iter() {
            if let Some((CachedPayload::Quote(quote), remaining)) =
                self.cache.get_with_remaining(&quote_key(symbol))
            {
                reused_remaining = Some(reused_remaining.map_or(remaining, |r| r.min(remaining)));
                resolved.insert(symbol.clone(), quote);
            }
        }
        if !resolved.is_empty() {
            debug!(
                "'{}': {} of {} symbols served from per-symbol cache",
                key,
                resolved.len(),
                request.len()
            );
        }

        let mut fresh: Vec<String> = Vec::new();
        let mut diagnostics = FetchDiagnostics::new();

        for provider in &self.providers {
            if cut_short {
                break;
            }

            let pending: Vec<String> = request
                .iter()
                .filter(|s| !resolved.contains_key(*s))
                .cloned()
                .collect();
            if pending.is_empty() {
                break;
            }

            let provider_id: ProviderId = Cow::Borrowed(provider.id());

            if !provider.capabilities().supports_batch_quotes {
                diagnostics.record_skip(provider_id, SkipReason::OperationNotSupported);
                continue;
            }

            if self.breaker.is_degraded(&provider_id) {
                debug!("Provider '{}' is degraded, skipping", provider_id);
                diagnostics.record_skip(provider_id, SkipReason::Degraded);
                continue;
            }

            debug!(
                "Fetching {} symbols from provider '{}'",
                pending.len(),
                provider_id
            );

            let outcome = match within_deadline(deadline, provider.fetch_batch(&pending)).await {
                Some(outcome) => outcome,
                None => {
                    warn!(
                        "Deadline elapsed while waiting on provider '{}' for '{}'",
                        provider_id, key
                    );
                    diagnostics.record_skip(provider_id, SkipReason::DeadlineElapsed);
                    cut_short = true;
                    break;
                }
            };

            let source = provider.source();
            let mut merged = 0;
            for (symbol, mut quote) in outcome.data {
                if !request.contains(&symbol) || resolved.contains_key(&symbol) {
                    continue;
                }
                quote.set_source(source);
                fresh.push(symbol.clone());
                resolved.insert(symbol, quote);
                merged += 1;
            }

            self.record_status(&provider_id, &outcome.status, merged, &mut diagnostics);
        }

        for symbol in &fresh {
            if let Some(quote) = resolved.get(symbol) {
                self.cache.set(
                    quote_key(symbol),
                    CachedPayload::Quote(quote.clone()),
                    self.config.quotes_ttl,
                );
            }
        }

        let any_live = resolved.values().any(|q| q.source != QuoteSource::Static);

        let mut batch = QuoteBatch::new();
        let mut from_fallback = 0;
        for symbol in request.iter() {
            let lookup = match resolved.remove(symbol) {
                Some(quote) => QuoteLookup::Resolved(quote),
                None => match self.fallback.as_ref().and_then(|f| f.quote(symbol)) {
                    Some(quote) => {
                        from_fallback += 1;
                        QuoteLookup::Resolved(quote)
                    }
                    None => QuoteLookup::Unresolved,
                },
            };
            batch.insert(symbol.clone(), lookup);
        }

        let unresolved = batch.values().filter(|l| !l.is_resolved()).count();
        debug!(
            "'{}': {} -> {} live, {} static, {} unresolved",
            key,
            diagnostics.summary(),
            fresh.len(),
            from_fallback,
            unresolved
        );

        let batch = Arc::new(batch);
        if cut_short {
            debug!("Not caching '{}': walk cut short by deadline", key);
        } else {
            let mut ttl = if any_live {
                self.config.quotes_ttl
            } else {
                self.config.fallback_ttl
            };
            if let Some(remaining) = reused_remaining {
                ttl = ttl.min(remaining);
            }
            self.cache.set(key, CachedPayload::Batch(Arc::clone(&batch)), ttl);
        }

        drop(guard);
        batch
    }

    fn record_status(
        &self,
        provider_id: &ProviderId,
        status: &FetchStatus,
        resolved: usize,
        diagnostics: &mut FetchDiagnostics,
    ) {
        match status {
            FetchStatus::Ok | FetchStatus::PartialOk => {
                self.breaker.record_success(provider_id);
                diagnostics.record_success(provider_id.clone(), resolved);
            }
            FetchStatus::RateLimited => {
                let window = self.breaker.record_rate_limited(provider_id);
                warn!(
                    "Provider '{}' rate limited, skipping it for {:?}",
                    provider_id, window
                );
                diagnostics.record_error(provider_id.clone(), status.to_string(), resolved);
            }
            FetchStatus::Unavailable | FetchStatus::Error(_) => {
                warn!("Provider '{}' failed: {}", provider_id, status);
                diagnostics.record_error(provider_id.clone(), status.to_string(), resolved);
            }
        }
    }

    // =========================================================================
    // Lists
    // =========================================================================

    /// Ranked list of the day's top movers.
    pub async fn list_top_movers(&self) -> Arc<Vec<Quote>> {
        if let Some(CachedPayload::Movers(list)) = self.cache.get(MOVERS_KEY) {
            return list;
        }

        let _guard = self.coalesce(MOVERS_KEY).await;
        if let Some(CachedPayload::Movers(list)) = self.cache.get(MOVERS_KEY) {
            return list;
        }

        if let Some(list) = self
            .walk_lists("movers", |c| c.supports_top_movers, fetch_movers)
            .await
        {
            let list = Arc::new(list);
            self.cache.set(
                MOVERS_KEY,
                CachedPayload::Movers(Arc::clone(&list)),
                self.config.movers_ttl,
            );
            return list;
        }

        let list = Arc::new(
            self.fallback
                .as_ref()
                .map(StaticFallbackProvider::top_movers)
                .unwrap_or_default(),
        );
        if !list.is_empty() {
            self.cache.set(
                MOVERS_KEY,
                CachedPayload::Movers(Arc::clone(&list)),
                self.config.fallback_ttl,
            );
        }
        list
    }

    /// Available fixed-income instruments.
    pub async fn list_fixed_income_instruments(&self) -> Arc<Vec<FixedIncomeInstrument>> {
        if let Some(CachedPayload::FixedIncome(list)) = self.cache.get(FIXED_INCOME_KEY) {
            return list;
        }

        let _guard = self.coalesce(FIXED_INCOME_KEY).await;
        if let Some(CachedPayload::FixedIncome(list)) = self.cache.get(FIXED_INCOME_KEY) {
            return list;
        }

        if let Some(list) = self
            .walk_lists("fixed income", |c| c.supports_fixed_income, fetch_fixed_income)
            .await
        {
            let list = Arc::new(list);
            self.cache.set(
                FIXED_INCOME_KEY,
                CachedPayload::FixedIncome(Arc::clone(&list)),
                self.config.fixed_income_ttl,
            );
            return list;
        }

        let list = Arc::new(
            self.fallback
                .as_ref()
                .map(StaticFallbackProvider::fixed_income)
                .unwrap_or_default(),
        );
        if !list.is_empty() {
            self.cache.set(
                FIXED_INCOME_KEY,
                CachedPayload::FixedIncome(Arc::clone(&list)),
                self.config.fallback_ttl,
            );
        }
        list
    }

    /// First non-empty successful list from the live sources.
    async fn walk_lists<T, F>(
        &self,
        operation: &str,
        supported: fn(&ProviderCapabilities) -> bool,
        fetch: F,
    ) -> Option<Vec<T>>
    where
        T: Sourced,
        F: for<'p> Fn(&'p dyn QuoteProvider) -> ListFuture<'p, T>,
    {
        let mut diagnostics = FetchDiagnostics::new();
        let mut found = None;

        for provider in &self.providers {
            let provider_id: ProviderId = Cow::Borrowed(provider.id());

            if !supported(&provider.capabilities()) {
                diagnostics.record_skip(provider_id, SkipReason::OperationNotSupported);
                continue;
            }

            if self.breaker.is_degraded(&provider_id) {
                debug!("Provider '{}' is degraded, skipping", provider_id);
                diagnostics.record_skip(provider_id, SkipReason::Degraded);
                continue;
            }

            let outcome = fetch(provider.as_ref()).await;
            let count = outcome.data.len();
            self.record_status(&provider_id, &outcome.status, count, &mut diagnostics);

            if outcome.status.is_success() && count > 0 {
                let source = provider.source();
                found = Some(
                    outcome
                        .data
                        .into_iter()
                        .map(|mut item| {
                            item.set_source(source);
                            item
                        })
                        .collect(),
                );
                break;
            }
        }

        debug!("{} walk: {}", operation, diagnostics.summary());
        found
    }

    // =========================================================================
    // Source state
    // =========================================================================

    /// Degradation state of every configured live source, in precedence order.
    pub fn source_states(&self) -> Vec<SourceState> {
        let snapshot = self.breaker.snapshot();

        self.providers
            .iter()
            .map(|provider| {
                let tracked = snapshot.iter().find(|s| s.provider == provider.id());
                let degraded_for = tracked.and_then(|s| s.degraded_for);
                SourceState {
                    id: provider.id().to_string(),
                    source: provider.source(),
                    degraded: degraded_for.is_some(),
                    degraded_for_secs: degraded_for.map(|d| d.as_secs().max(1)),
                    strikes: tracked.map(|s| s.strikes).unwrap_or(0),
                }
            })
            .collect()
    }

    /// Clear the degradation state of one source. Returns false for unknown ids.
    pub fn reset_source(&self, id: &str) -> bool {
        let Some(provider) = self
            .providers
            .iter()
            .find(|p| p.id().eq_ignore_ascii_case(id))
        else {
            return false;
        };

        self.breaker.reset(&Cow::Borrowed(provider.id()));
        true
    }

    pub fn reset_all_sources(&self) {
        info!("Resetting degradation state of all sources");
        self.breaker.reset_all();
    }
}
