//! Per-provider degradation tracking.
//!
//! A provider that reports rate limiting is marked degraded until a deadline
//! and skipped by the aggregator until then. The circuit has two states:
//!
//! - **Closed**: Normal operation, the provider is called.
//! - **Open**: The provider is degraded, calls are skipped.
//!
//! Expiry is checked lazily on read; no timer runs in the background.
//! The state is in-memory and resets on application restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::cache::{Clock, SystemClock};
use crate::models::ProviderId;

/// Default time a rate-limited provider is skipped.
const DEFAULT_DEGRADED_DURATION: Duration = Duration::from_secs(300);

/// Default cap for escalated degradation windows.
const DEFAULT_MAX_DEGRADED_DURATION: Duration = Duration::from_secs(1800);

/// Circuit breaker state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CircuitState {
    /// Normal operation - requests are allowed.
    Closed,
    /// Provider is degraded - requests are skipped.
    Open,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
        }
    }
}

/// Internal degradation state for a single provider.
#[derive(Debug, Default)]
struct DegradationState {
    /// Skip the provider until this instant.
    degraded_until: Option<Instant>,
    /// Rate limits seen since the last success.
    strikes: u32,
}

/// Circuit breaker configuration.
#[derive(Clone, Debug)]
pub struct BreakerConfig {
    /// Window applied on the first rate limit.
    pub degraded_duration: Duration,
    /// Multiplier for each further rate limit without an intervening success.
    /// `1` keeps the window fixed.
    pub backoff_factor: u32,
    /// Upper bound for escalated windows.
    pub max_degraded_duration: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            degraded_duration: DEFAULT_DEGRADED_DURATION,
            backoff_factor: 1,
            max_degraded_duration: DEFAULT_MAX_DEGRADED_DURATION,
        }
    }
}

impl BreakerConfig {
    /// Window for the given strike count (1-based).
    fn window_for(&self, strikes: u32) -> Duration {
        let factor = self
            .backoff_factor
            .max(1)
            .saturating_pow(strikes.saturating_sub(1));
        self.degraded_duration
            .saturating_mul(factor)
            .min(self.max_degraded_duration.max(self.degraded_duration))
    }
}

/// Per-provider circuit breaker.
///
/// Thread-safe; critical sections are short and never span an `.await`.
pub struct CircuitBreaker {
    /// Per-provider degradation states.
    states: Mutex<HashMap<String, DegradationState>>,
    /// Configuration.
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default settings.
    pub fn new() -> Self {
        Self::with_config(BreakerConfig::default())
    }

    /// Create a circuit breaker with custom configuration.
    pub fn with_config(config: BreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            config,
            clock,
        }
    }

    /// Lock the states mutex, recovering from poison if necessary.
    ///
    /// Recovering is safe here: the worst case is a slightly stale
    /// degradation window.
    fn lock_states(&self) -> MutexGuard<'_, HashMap<String, DegradationState>> {
        self.states.lock().unwrap_or_else(|poisoned| {
            warn!("Circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// True iff the provider is degraded and the window has not elapsed.
    ///
    /// An elapsed window is cleared here.
    pub fn is_degraded(&self, provider: &ProviderId) -> bool {
        let now = self.clock.now();
        let mut states = self.lock_states();

        let Some(state) = states.get_mut(provider.as_ref()) else {
            return false;
        };

        match state.degraded_until {
            Some(until) if now < until => true,
            Some(_) => {
                info!(
                    "Circuit breaker: degradation window for '{}' elapsed, closing",
                    provider
                );
                state.degraded_until = None;
                false
            }
            None => false,
        }
    }

    /// Instant the current degradation window ends, if one is still open.
    pub fn degraded_until(&self, provider: &ProviderId) -> Option<Instant> {
        let now = self.clock.now();
        self.lock_states()
            .get(provider.as_ref())
            .and_then(|s| s.degraded_until)
            .filter(|until| now < *until)
    }

    /// Remaining degradation window, if any.
    pub fn degraded_for(&self, provider: &ProviderId) -> Option<Duration> {
        let now = self.clock.now();
        let states = self.lock_states();

        states
            .get(provider.as_ref())
            .and_then(|s| s.degraded_until)
            .and_then(|until| until.checked_duration_since(now))
            .filter(|remaining| !remaining.is_zero())
    }

    pub fn state(&self, provider: &ProviderId) -> CircuitState {
        if self.is_degraded(provider) {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    /// Skip the provider for `duration` from now.
    ///
    /// Never shortens a window that is already further in the future.
    pub fn mark_degraded(&self, provider: &ProviderId, duration: Duration) {
        let until = self.clock.now() + duration;
        let mut states = self.lock_states();

        let state = states.entry(provider.to_string()).or_default();
        state.degraded_until = Some(match state.degraded_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });

        info!(
            "Circuit breaker: '{}' degraded for {:?}",
            provider, duration
        );
    }

    /// Record a rate limit and degrade the provider using the configured window.
    ///
    /// Returns the window applied.
    pub fn record_rate_limited(&self, provider: &ProviderId) -> Duration {
        let strikes = {
            let mut states = self.lock_states();
            let state = states.entry(provider.to_string()).or_default();
            state.strikes = state.strikes.saturating_add(1);
            state.strikes
        };

        let window = self.config.window_for(strikes);
        debug!(
            "Circuit breaker: rate limit #{} for '{}'",
            strikes, provider
        );
        self.mark_degraded(provider, window);
        window
    }

    /// Record a successful call; resets the escalation counter.
    pub fn record_success(&self, provider: &ProviderId) {
        let mut states = self.lock_states();

        if let Some(state) = states.get_mut(provider.as_ref()) {
            if state.strikes > 0 {
                debug!(
                    "Circuit breaker: success for '{}', strike count reset",
                    provider
                );
            }
            state.strikes = 0;
        }
    }

    /// Reset the circuit for a provider to Closed state.
    pub fn reset(&self, provider: &ProviderId) {
        let mut states = self.lock_states();

        if states.remove(provider.as_ref()).is_some() {
            info!(
                "Circuit breaker: manually resetting circuit for '{}'",
                provider
            );
        }
    }

    /// Reset all circuits to their initial state.
    pub fn reset_all(&self) {
        let mut states = self.lock_states();
        states.clear();
        info!("Circuit breaker: all circuits reset");
    }

    /// Current view of every tracked provider.
    pub fn snapshot(&self) -> Vec<CircuitSnapshot> {
        let now = self.clock.now();
        let states = self.lock_states();

        let mut snapshot: Vec<_> = states
            .iter()
            .map(|(provider, state)| {
                let remaining = state
                    .degraded_until
                    .and_then(|until| until.checked_duration_since(now))
                    .filter(|remaining| !remaining.is_zero());
                CircuitSnapshot {
                    provider: provider.clone(),
                    state: if remaining.is_some() {
                        CircuitState::Open
                    } else {
                        CircuitState::Closed
                    },
                    degraded_for: remaining,
                    strikes: state.strikes,
                }
            })
            .collect();
        snapshot.sort_by(|a, b| a.provider.cmp(&b.provider));
        snapshot
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of a single circuit.
#[derive(Clone, Debug)]
pub struct CircuitSnapshot {
    /// Provider identifier.
    pub provider: String,
    /// Current circuit state.
    pub state: CircuitState,
    /// Remaining degradation window.
    pub degraded_for: Option<Duration>,
    /// Rate limits since the last success.
    pub strikes: u32,
}
