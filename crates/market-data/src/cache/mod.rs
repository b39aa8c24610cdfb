//! In-memory caching with per-entry expiry.
//!
//! - [`ExpiringCache`]: concurrent key/value store, entries expire at an absolute instant
//! - [`Clock`]: time source shared by the cache and the circuit breaker

mod clock;
mod expiring;

pub use clock::{Clock, ManualClock, SystemClock};
pub use expiring::ExpiringCache;
