//! Authorization metrics
//!
//! Enable with the `metrics` feature flag. Requires a `metrics` recorder
//! to be installed (e.g., via `metrics-exporter-prometheus`).
//!
//! ## Metrics Provided
//!
//! - `quillpad_auth_decisions_total` - Counter for decisions (labels: effect, error_kind)
//! - `quillpad_auth_key_set_fetches_total` - Counter for key-set fetches (labels: status)
//! - `quillpad_auth_decision_duration_seconds` - Histogram for end-to-end decision latency
//!
//! ## Example
//!
//! ```rust,ignore
//! use quillpad_auth::init_auth_metrics;
//!
//! // Initialize metric descriptions once at startup
//! init_auth_metrics();
//! ```

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_histogram, histogram};

#[cfg(feature = "metrics")]
use std::sync::Once;

use crate::error::ErrorKind;

#[cfg(feature = "metrics")]
static INIT: Once = Once::new();

/// Outcome label for key-set fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FetchStatus {
    Success,
    Failure,
    Stale,
}

impl FetchStatus {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            FetchStatus::Success => "success",
            FetchStatus::Failure => "failure",
            FetchStatus::Stale => "stale",
        }
    }
}

/// Initialize auth metric descriptions. Call once at startup.
///
/// Idempotent; only the first call registers the descriptions.
#[cfg(feature = "metrics")]
pub fn init_auth_metrics() {
    INIT.call_once(|| {
        describe_counter!(
            "quillpad_auth_decisions_total",
            "Authorization decisions by effect and failure class"
        );
        describe_counter!(
            "quillpad_auth_key_set_fetches_total",
            "Key-set fetch attempts by outcome"
        );
        describe_histogram!(
            "quillpad_auth_decision_duration_seconds",
            "Time to reach an authorization decision in seconds"
        );
    });
}

/// Record a decision; `error_kind` is `None` for Allow
#[cfg(feature = "metrics")]
pub(crate) fn record_decision(error_kind: Option<ErrorKind>, duration_seconds: f64) {
    let (effect, kind) = match error_kind {
        None => ("allow", "none"),
        Some(kind) => ("deny", kind.as_str()),
    };
    counter!(
        "quillpad_auth_decisions_total",
        "effect" => effect,
        "error_kind" => kind
    )
    .increment(1);
    histogram!("quillpad_auth_decision_duration_seconds").record(duration_seconds);
}

/// Record a key-set fetch
#[cfg(feature = "metrics")]
pub(crate) fn record_key_set_fetch(status: FetchStatus) {
    counter!(
        "quillpad_auth_key_set_fetches_total",
        "status" => status.as_str()
    )
    .increment(1);
}

// No-op versions when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
#[allow(missing_docs)]
pub fn init_auth_metrics() {}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_decision(_error_kind: Option<ErrorKind>, _duration_seconds: f64) {}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_key_set_fetch(_status: FetchStatus) {}
