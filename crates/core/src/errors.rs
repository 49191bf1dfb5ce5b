//! Error types

use thiserror::Error;

use crate::Protocol;

/// Errors raised by a single read against a chain, API or subgraph
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Implausible {field}: {value}")]
    Implausible { field: &'static str, value: f64 },

    #[error("Timed out after {0}ms")]
    Timeout(u64),

    #[error("All sources failed for {0}")]
    AllSourcesFailed(Protocol),
}

/// Aggregation-level errors surfaced to the presentation layer
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AggregatorError {
    #[error("No protocol data available: all {attempted} protocol fetches failed")]
    AllProtocolsFailed { attempted: usize },

    #[error("No protocol fetchers configured")]
    NoFetchers,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to load configuration: {0}")]
    Load(String),
}

/// Result type alias
pub type FetchResult<T> = Result<T, FetchError>;
pub type AggregatorResult<T> = Result<T, AggregatorError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
