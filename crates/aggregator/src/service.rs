//! Refresh loop and published dashboard state
//!
//! The latest `DashboardState` lives in a watch channel. Consumers read it at any
//! time, including while a refresh is in flight (status `Refreshing`, previous
//! data still served). A refresh requested while another is running is skipped.

use futures::future::join_all;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info, warn};

use yield_core::{AggregatedData, RefreshConfig, TotalMetrics, YieldOpportunity};
use yield_quality::{DataHealthScore, DataMonitor, ReferenceTvl, SystemHealth};

use crate::aggregator::YieldAggregator;
use crate::formatter::{format_to_yield_opportunities, rank_by_apy};
use crate::metrics::calculate_total_metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshStatus {
    Idle,
    Refreshing,
}

/// Per-protocol scores for the latest cycle plus the alert-driven system gauge
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub protocols: Vec<DataHealthScore>,
    pub system: SystemHealth,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    pub data: AggregatedData,
    pub opportunities: Vec<YieldOpportunity>,
    pub totals: TotalMetrics,
    pub health: Option<HealthReport>,
    pub status: RefreshStatus,
    pub error: Option<String>,
    /// Completed refresh cycles, successful or not
    pub cycle: u64,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            data: AggregatedData::empty(),
            opportunities: Vec::new(),
            totals: TotalMetrics::default(),
            health: None,
            status: RefreshStatus::Idle,
            error: None,
            cycle: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated,
    Failed,
    Skipped,
}

pub struct DashboardService {
    aggregator: YieldAggregator,
    monitor: Arc<DataMonitor>,
    reference: Option<Arc<dyn ReferenceTvl>>,
    config: RefreshConfig,
    state: watch::Sender<Arc<DashboardState>>,
    in_flight: Mutex<()>,
}

impl DashboardService {
    pub fn new(aggregator: YieldAggregator, monitor: Arc<DataMonitor>, config: RefreshConfig) -> Self {
        let (state, _) = watch::channel(Arc::new(DashboardState::default()));
        Self {
            aggregator,
            monitor,
            reference: None,
            config,
            state,
            in_flight: Mutex::new(()),
        }
    }

    /// Cross-check each protocol's TVL against an external reference
    pub fn with_reference(mut self, reference: Arc<dyn ReferenceTvl>) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn state(&self) -> Arc<DashboardState> {
        Arc::clone(&self.state.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<DashboardState>> {
        self.state.subscribe()
    }

    /// Current state, then every published change
    pub fn updates(&self) -> WatchStream<Arc<DashboardState>> {
        WatchStream::new(self.state.subscribe())
    }

    /// Run one refresh cycle unless one is already running
    pub async fn refresh(&self) -> RefreshOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("Refresh already in flight, skipping");
            return RefreshOutcome::Skipped;
        };

        self.update(|state| state.status = RefreshStatus::Refreshing);
        let _reset = StatusReset(&self.state);

        match self.aggregator.fetch_all_protocol_data().await {
            Ok(data) => {
                let health = self.assess(&data).await;
                let opportunities = rank_by_apy(format_to_yield_opportunities(&data));
                let totals = calculate_total_metrics(&data, self.config.materiality_floor_usd);

                info!(
                    protocols = data.protocols.len(),
                    opportunities = opportunities.len(),
                    total_tvl = totals.total_tvl,
                    health = health.system.overall,
                    "Dashboard refreshed"
                );

                self.update(|state| {
                    state.data = data;
                    state.opportunities = opportunities;
                    state.totals = totals;
                    state.health = Some(health);
                    state.status = RefreshStatus::Idle;
                    state.error = None;
                    state.cycle += 1;
                });
                RefreshOutcome::Updated
            }
            Err(e) => {
                error!(error = %e, "Refresh failed, keeping previous snapshot");
                self.update(|state| {
                    state.status = RefreshStatus::Idle;
                    state.error = Some(e.to_string());
                    state.cycle += 1;
                });
                RefreshOutcome::Failed
            }
        }
    }

    /// Refresh on the configured interval until `shutdown` resolves
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            interval_secs = self.config.interval_secs,
            protocols = ?self.aggregator.protocols(),
            "Refresh loop started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Refresh loop stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.refresh().await;
                }
            }
        }
    }

    async fn assess(&self, data: &AggregatedData) -> HealthReport {
        let protocols: Vec<DataHealthScore> = data
            .protocols
            .values()
            .map(|snapshot| self.monitor.validate_protocol_metrics(snapshot))
            .collect();
        self.monitor.flush_baseline();

        if let Some(reference) = &self.reference {
            let checks = join_all(data.protocols.values().map(|snapshot| {
                let reference = Arc::clone(reference);
                async move { (snapshot, reference.protocol_tvl(snapshot.protocol).await) }
            }))
            .await;

            for (snapshot, reference_tvl) in checks {
                match reference_tvl {
                    Ok(tvl) => {
                        self.monitor.cross_check_reference(snapshot, tvl);
                    }
                    Err(e) => warn!(protocol = %snapshot.protocol, error = %e, "Reference TVL unavailable"),
                }
            }
        }

        HealthReport {
            protocols,
            system: self.monitor.get_system_health(),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut DashboardState)) {
        self.state.send_modify(|state| apply(Arc::make_mut(state)));
    }
}

/// Puts a `Refreshing` status back to `Idle` when a refresh is dropped mid-flight
struct StatusReset<'a>(&'a watch::Sender<Arc<DashboardState>>);

impl Drop for StatusReset<'_> {
    fn drop(&mut self) {
        self.0.send_if_modified(|state| {
            if state.status != RefreshStatus::Refreshing {
                return false;
            }
            warn!("Refresh cancelled before completion");
            Arc::make_mut(state).status = RefreshStatus::Idle;
            true
        });
    }
}
