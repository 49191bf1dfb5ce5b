//! Per-read fallback policy
//!
//! Every sub-read returns a `FetchResult`; the fetcher declares a fallback constant
//! per field and records whether the value it ends up using was read live.

use std::fmt::Debug;
use tracing::warn;

use yield_core::{FetchError, FetchResult, SourceKind, ValidatedValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Live,
    Fallback,
}

/// A value tagged with where it came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sourced<T> {
    pub value: T,
    pub origin: Origin,
}

impl<T> Sourced<T> {
    pub fn live(value: T) -> Self {
        Self { value, origin: Origin::Live }
    }

    pub fn fallback(value: T) -> Self {
        Self { value, origin: Origin::Fallback }
    }

    pub fn is_live(&self) -> bool {
        self.origin == Origin::Live
    }
}

/// Use the read value, or substitute `fallback` and log why
pub fn or_fallback<T: Debug>(field: &'static str, result: FetchResult<T>, fallback: T) -> Sourced<T> {
    match result {
        Ok(value) => Sourced::live(value),
        Err(e) => {
            warn!(field, error = %e, fallback = ?fallback, "Read failed, using fallback");
            Sourced::fallback(fallback)
        }
    }
}

/// Like `or_fallback`, also rejecting NaN, infinite and negative amounts
pub fn or_fallback_amount(field: &'static str, result: FetchResult<f64>, fallback: f64) -> Sourced<f64> {
    let checked = result.and_then(|value| {
        if value.is_finite() && value >= 0.0 {
            Ok(value)
        } else {
            Err(FetchError::Implausible { field, value })
        }
    });
    or_fallback(field, checked, fallback)
}

/// Settle validated readings into one value and its confidence.
///
/// No usable reading falls back to the constant at fallback confidence.
/// Otherwise the validator's confidence is published as is, so a lone reading
/// never carries more than the single-source ceiling.
pub fn resolve(field: &'static str, validated: &ValidatedValue, fallback: f64) -> (Sourced<f64>, f64) {
    if validated.is_empty() {
        warn!(field, fallback, "No usable readings, using fallback");
        return (Sourced::fallback(fallback), SourceKind::Fallback.default_confidence());
    }
    (Sourced::live(validated.value), validated.confidence)
}
