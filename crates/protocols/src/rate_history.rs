//! Exchange-rate history for share-price based APY
//!
//! Liquid staking and vault tokens accrue yield through a rising share price.
//! Sampling that price over time and annualising the growth gives an APY that
//! does not depend on any API. Until two samples span at least an hour the
//! estimate is withheld.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use yield_core::SECONDS_PER_YEAR;

pub const DEFAULT_CAPACITY: usize = 168;
pub const MAX_ANNUALIZED_APY: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSample {
    pub at: DateTime<Utc>,
    pub rate: f64,
}

/// Bounded per-vault share-price samples
#[derive(Debug)]
pub struct RateHistory {
    samples: Mutex<HashMap<String, VecDeque<RateSample>>>,
    capacity: usize,
    min_span: Duration,
}

impl RateHistory {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_CAPACITY, Duration::hours(1))
    }

    pub fn with_limits(capacity: usize, min_span: Duration) -> Self {
        Self {
            samples: Mutex::new(HashMap::new()),
            capacity: capacity.max(2),
            min_span,
        }
    }

    pub fn record(&self, key: &str, rate: f64) -> bool {
        self.record_at(key, Utc::now(), rate)
    }

    /// Returns false when the sample was ignored
    pub fn record_at(&self, key: &str, at: DateTime<Utc>, rate: f64) -> bool {
        if !rate.is_finite() || rate <= 0.0 {
            return false;
        }

        let mut samples = self.samples.lock();
        let series = samples.entry(key.to_string()).or_default();
        if series.back().is_some_and(|last| at <= last.at) {
            return false;
        }

        if series.len() >= self.capacity {
            series.pop_front();
        }
        series.push_back(RateSample { at, rate });
        true
    }

    /// Annualised growth between the oldest and newest sample, clamped to [0, 50]
    pub fn annualized_apy(&self, key: &str) -> Option<f64> {
        let samples = self.samples.lock();
        let series = samples.get(key)?;
        let (first, last) = (series.front()?, series.back()?);

        let span = last.at - first.at;
        if series.len() < 2 || span < self.min_span {
            return None;
        }

        let span_secs = span.num_milliseconds() as f64 / 1000.0;
        let growth = last.rate / first.rate;
        let apy = (growth.powf(SECONDS_PER_YEAR / span_secs) - 1.0) * 100.0;
        if apy.is_nan() {
            return None;
        }
        Some(apy.clamp(0.0, MAX_ANNUALIZED_APY))
    }

    /// Annualised APY, or a conservative constant while history is insufficient
    pub fn apy_or(&self, key: &str, conservative: f64) -> f64 {
        self.annualized_apy(key).unwrap_or(conservative)
    }

    pub fn len(&self, key: &str) -> usize {
        self.samples.lock().get(key).map(|s| s.len()).unwrap_or(0)
    }
}

impl Default for RateHistory {
    fn default() -> Self {
        Self::new()
    }
}
