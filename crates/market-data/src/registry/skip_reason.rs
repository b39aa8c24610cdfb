//! Skip reason tracking for source walk diagnostics.

use crate::models::ProviderId;

/// Why a provider was skipped during a walk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Provider is inside a degradation window.
    Degraded,

    /// Provider does not serve the requested operation.
    OperationNotSupported,

    /// The caller's deadline elapsed before or during the call.
    DeadlineElapsed,
}

/// Record of a single provider attempt during a walk.
#[derive(Clone, Debug)]
pub struct ProviderAttempt {
    pub provider_id: ProviderId,
    pub skipped: Option<SkipReason>,
    pub error: Option<String>,
    /// Items this provider contributed.
    pub resolved: usize,
    pub success: bool,
}

/// Per-walk diagnostics, logged once the walk finishes.
#[derive(Clone, Debug, Default)]
pub struct FetchDiagnostics {
    pub attempts: Vec<ProviderAttempt>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self {
            attempts: Vec::new(),
        }
    }

    pub fn record_skip(&mut self, provider_id: ProviderId, reason: SkipReason) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            skipped: Some(reason),
            error: None,
            resolved: 0,
            success: false,
        });
    }

    /// Record a failed call. `resolved` counts data returned alongside the failure.
    pub fn record_error(&mut self, provider_id: ProviderId, error: String, resolved: usize) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            skipped: None,
            error: Some(error),
            resolved,
            success: false,
        });
    }

    pub fn record_success(&mut self, provider_id: ProviderId, resolved: usize) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            skipped: None,
            error: None,
            resolved,
            success: true,
        });
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        if self.attempts.is_empty() {
            return "no provider attempted".to_string();
        }

        self.attempts
            .iter()
            .map(|a| {
                if a.success {
                    format!("{}: SUCCESS ({})", a.provider_id, a.resolved)
                } else if let Some(skip) = &a.skipped {
                    format!("{}: SKIPPED ({:?})", a.provider_id, skip)
                } else if let Some(err) = &a.error {
                    format!("{}: ERROR ({})", a.provider_id, err)
                } else {
                    format!("{}: UNKNOWN", a.provider_id)
                }
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Check if any provider succeeded.
    pub fn has_success(&self) -> bool {
        self.attempts.iter().any(|a| a.success)
    }

    /// Get all skip reasons.
    pub fn skip_reasons(&self) -> Vec<(&ProviderId, &SkipReason)> {
        self.attempts
            .iter()
            .filter_map(|a| a.skipped.as_ref().map(|s| (&a.provider_id, s)))
            .collect()
    }

    /// Get all errors.
    pub fn errors(&self) -> Vec<(&ProviderId, &str)> {
        self.attempts
            .iter()
            .filter_map(|a| a.error.as_ref().map(|e| (&a.provider_id, e.as_str())))
            .collect()
    }
}
