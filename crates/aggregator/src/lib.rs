//! Yield aggregation service
//!
//! Fans out to every protocol fetcher, formats the combined snapshot into
//! yield-table rows and summary metrics, scores data health, and publishes the
//! result on a refresh timer.

pub mod aggregator;
pub mod formatter;
pub mod metrics;
pub mod service;
pub mod settings;

pub use aggregator::{FetchOutcome, YieldAggregator};
pub use formatter::{format_to_yield_opportunities, rank_by_apy};
pub use metrics::calculate_total_metrics;
pub use service::{DashboardService, DashboardState, HealthReport, RefreshOutcome, RefreshStatus};
pub use settings::load_settings;
