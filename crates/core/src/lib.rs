//! Core types for the Avalanche yield dashboard
//!
//! This crate provides shared types used across all components:
//! - Protocol, category and risk definitions
//! - Source readings and validated consensus values
//! - Normalized protocol snapshots and yield opportunities
//! - Token tables, configuration and error types

pub mod types;
pub mod tokens;
pub mod sources;
pub mod snapshots;
pub mod opportunities;
pub mod config;
pub mod errors;

pub use types::*;
pub use sources::*;
pub use snapshots::*;
pub use opportunities::*;
pub use config::*;
pub use errors::*;
