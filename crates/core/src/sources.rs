//! Per-cycle source readings and validated consensus values

use serde::{Deserialize, Serialize};

/// Kind of source a reading came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Direct contract view call
    OnChain,
    /// Indexed subgraph query
    Subgraph,
    /// Protocol's own metrics API
    OfficialApi,
    /// Third-party aggregator such as DeFiLlama
    Aggregator,
    /// Estimate derived from market prices
    PriceHeuristic,
    /// Hardcoded constant
    Fallback,
}

impl SourceKind {
    /// Default confidence assigned to readings of this kind
    pub fn default_confidence(&self) -> f64 {
        match self {
            SourceKind::OnChain => 0.95,
            SourceKind::Subgraph => 0.9,
            SourceKind::OfficialApi => 0.9,
            SourceKind::Aggregator => 0.85,
            SourceKind::PriceHeuristic => 0.7,
            SourceKind::Fallback => 0.3,
        }
    }
}

/// A single reading of a metric from one source. Ephemeral, built per fetch cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub source: String,
    pub kind: SourceKind,
    pub value: f64,
    pub confidence: f64,
    pub timestamp_ms: u64,
}

impl DataSource {
    pub fn new(source: impl Into<String>, kind: SourceKind, value: f64) -> Self {
        Self {
            source: source.into(),
            kind,
            value,
            confidence: kind.default_confidence(),
            timestamp_ms: crate::now_ms(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}

/// Consensus over several readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedValue {
    pub value: f64,
    pub confidence: f64,
    /// Identifiers of the readings that survived filtering
    pub sources: Vec<String>,
}

impl ValidatedValue {
    pub fn empty() -> Self {
        Self {
            value: 0.0,
            confidence: 0.0,
            sources: vec![],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
