//! Confidence-weighted consensus over multi-source readings
//!
//! Pure functions, no I/O. APY uses a confidence-weighted average, TVL the median.
//! Agreement is measured by the coefficient of variation across surviving readings.

use yield_core::{DataSource, ValidatedValue};

/// Max coefficient of variation for APY readings to count as agreeing
pub const APY_AGREEMENT_THRESHOLD: f64 = 0.15;
/// Max coefficient of variation for TVL readings to count as agreeing
pub const TVL_AGREEMENT_THRESHOLD: f64 = 0.20;

const AGREED_CONFIDENCE: f64 = 0.9;
const DISPUTED_CONFIDENCE: f64 = 0.6;
const SINGLE_SOURCE_CONFIDENCE: f64 = 0.3;

/// Consensus APY. Readings outside (0, 100) are discarded.
pub fn validate_apy(sources: &[DataSource]) -> ValidatedValue {
    let usable: Vec<&DataSource> = sources
        .iter()
        .filter(|s| s.value.is_finite() && s.value > 0.0 && s.value < 100.0)
        .collect();

    if let Some(early) = degenerate(&usable) {
        return early;
    }

    let values: Vec<f64> = usable.iter().map(|s| s.value).collect();
    let total_weight: f64 = usable.iter().map(|s| weight(s)).sum();
    let value = if total_weight > 0.0 {
        usable.iter().map(|s| s.value * weight(s)).sum::<f64>() / total_weight
    } else {
        mean(&values)
    };

    ValidatedValue {
        value,
        confidence: consensus_confidence(
            coefficient_of_variation(&values),
            APY_AGREEMENT_THRESHOLD,
            total_weight / usable.len() as f64,
        ),
        sources: usable.iter().map(|s| s.source.clone()).collect(),
    }
}

/// Consensus TVL. Non-positive readings are discarded.
pub fn validate_tvl(sources: &[DataSource]) -> ValidatedValue {
    let usable: Vec<&DataSource> = sources
        .iter()
        .filter(|s| s.value.is_finite() && s.value > 0.0)
        .collect();

    if let Some(early) = degenerate(&usable) {
        return early;
    }

    let values: Vec<f64> = usable.iter().map(|s| s.value).collect();
    let total_weight: f64 = usable.iter().map(|s| weight(s)).sum();

    ValidatedValue {
        value: median(&values),
        confidence: consensus_confidence(
            coefficient_of_variation(&values),
            TVL_AGREEMENT_THRESHOLD,
            total_weight / usable.len() as f64,
        ),
        sources: usable.iter().map(|s| s.source.clone()).collect(),
    }
}

/// Zero or one usable reading
fn degenerate(usable: &[&DataSource]) -> Option<ValidatedValue> {
    match usable {
        [] => Some(ValidatedValue::empty()),
        [only] => Some(ValidatedValue {
            value: only.value,
            confidence: SINGLE_SOURCE_CONFIDENCE,
            sources: vec![only.source.clone()],
        }),
        _ => None,
    }
}

fn weight(source: &DataSource) -> f64 {
    if source.confidence.is_finite() {
        source.confidence.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Agreeing readings earn 0.9; disagreeing ones get 0.6 capped by the mean
/// source confidence.
///
/// The mean-confidence cap is not applied on agreement, so agreeing readings
/// always reach 0.9 even when every source is a low-confidence heuristic. Capping
/// there too would break that guarantee for sources below 0.9.
fn consensus_confidence(cv: f64, threshold: f64, mean_weight: f64) -> f64 {
    if cv < threshold {
        AGREED_CONFIDENCE
    } else {
        DISPUTED_CONFIDENCE.min(mean_weight)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.is_empty() {
        0.0
    } else if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Population standard deviation over the mean
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len().max(1) as f64;
    let std_dev = variance.sqrt();
    if m.abs() > f64::EPSILON {
        std_dev / m.abs()
    } else if std_dev == 0.0 {
        0.0
    } else {
        f64::INFINITY
    }
}
