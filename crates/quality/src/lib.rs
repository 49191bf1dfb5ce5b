//! Data quality for protocol readings
//!
//! Features:
//! - Confidence-weighted consensus over disagreeing sources
//! - Plausibility and baseline-deviation checks with a bounded alert log
//! - Reference TVL cross-check against DeFiLlama
//! - Per-protocol and system health scores

pub mod validator;
pub mod monitor;
pub mod baseline;
pub mod reference;

pub use validator::{validate_apy, validate_tvl};
pub use monitor::{Alert, DataHealthScore, DataMonitor, MetricKind, Severity, SystemHealth};
pub use baseline::{BaselineStore, FileBaseline, MemoryBaseline};
pub use reference::{DefiLlamaClient, ReferenceTvl};
