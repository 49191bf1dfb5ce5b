//! Post-hoc sanity checks and health scoring
//!
//! `validate_protocol_metrics` scores one snapshot against static bounds and the
//! previous cycle's baseline. Every violation is also appended to a bounded alert
//! log; `get_system_health` derives scores from that log alone, so it lags the
//! live values and only recovers as old alerts are evicted.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

use yield_core::{Category, MonitorConfig, ProductSnapshot, ProtocolSnapshot};

use crate::baseline::BaselineStore;

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Points removed from a protocol's system health score
    pub fn penalty(&self) -> u8 {
        match self {
            Severity::Low => 5,
            Severity::Medium => 15,
            Severity::High => 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Apy,
    Tvl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub protocol: String,
    pub product: String,
    pub metric: MetricKind,
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Health of one protocol's latest snapshot, 0-100 per score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataHealthScore {
    pub protocol: String,
    pub overall: u8,
    pub apy: u8,
    pub tvl: u8,
    pub timestamp: DateTime<Utc>,
    pub alerts: Vec<Alert>,
}

/// Alert-driven health across protocols
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub overall: u8,
    pub protocols: BTreeMap<String, u8>,
    pub alert_count: usize,
    pub alerts: Vec<Alert>,
}

const HIGH_SCORE: u8 = 30;
const MEDIUM_SCORE: u8 = 60;
const MILD_SCORE: u8 = 75;

/// Accumulates alerts for one snapshot check
struct Scorecard<'a> {
    protocol: &'a str,
    apy: u8,
    tvl: u8,
    alerts: Vec<Alert>,
}

impl<'a> Scorecard<'a> {
    fn new(protocol: &'a str) -> Self {
        Self {
            protocol,
            apy: 100,
            tvl: 100,
            alerts: vec![],
        }
    }

    fn flag(&mut self, product: &str, metric: MetricKind, severity: Severity, score: u8, message: String) {
        let slot = match metric {
            MetricKind::Apy => &mut self.apy,
            MetricKind::Tvl => &mut self.tvl,
        };
        *slot = (*slot).min(score);

        self.alerts.push(Alert {
            protocol: self.protocol.to_string(),
            product: product.to_string(),
            metric,
            severity,
            message,
            timestamp: Utc::now(),
        });
    }
}

pub struct DataMonitor {
    config: MonitorConfig,
    baseline: Arc<dyn BaselineStore>,
    alerts: Mutex<VecDeque<Alert>>,
}

impl DataMonitor {
    pub fn new(config: MonitorConfig, baseline: Arc<dyn BaselineStore>) -> Self {
        let capacity = config.alert_capacity.max(1);
        Self {
            config,
            baseline,
            alerts: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Check one snapshot and record any alerts
    pub fn validate_protocol_metrics(&self, snapshot: &ProtocolSnapshot) -> DataHealthScore {
        let protocol = snapshot.protocol.name();
        let mut card = Scorecard::new(protocol);

        for product in &snapshot.products {
            self.check_rate(&mut card, product);
            self.check_tvl(&mut card, product);
            self.check_baseline(&mut card, snapshot, product);
        }

        let total_tvl = snapshot.total_tvl();
        if !snapshot.products.is_empty() && total_tvl < self.config.min_major_tvl_usd {
            card.flag(
                "*",
                MetricKind::Tvl,
                Severity::Medium,
                MEDIUM_SCORE,
                format!(
                    "Total TVL ${:.0} is below ${:.0} for a major protocol",
                    total_tvl, self.config.min_major_tvl_usd
                ),
            );
        }

        let Scorecard { apy, tvl, alerts, .. } = card;
        for alert in &alerts {
            self.record(alert.clone());
        }

        let overall = ((apy as u16 + tvl as u16) / 2) as u8;
        debug!(protocol, overall, apy, tvl, alerts = alerts.len(), "Protocol health");

        DataHealthScore {
            protocol: protocol.to_string(),
            overall,
            apy,
            tvl,
            timestamp: Utc::now(),
            alerts,
        }
    }

    /// Compare our TVL with a reference aggregator's figure
    pub fn cross_check_reference(&self, snapshot: &ProtocolSnapshot, reference_tvl: f64) -> Option<Alert> {
        if !reference_tvl.is_finite() || reference_tvl <= 0.0 {
            return None;
        }

        let ours = snapshot.total_tvl();
        let deviation = (ours - reference_tvl).abs() / reference_tvl * 100.0;
        if deviation <= self.config.reference_max_deviation_pct {
            return None;
        }

        let alert = Alert {
            protocol: snapshot.protocol.name().to_string(),
            product: "*".to_string(),
            metric: MetricKind::Tvl,
            severity: Severity::Medium,
            message: format!(
                "TVL ${:.0} deviates {:.1}% from reference ${:.0}",
                ours, deviation, reference_tvl
            ),
            timestamp: Utc::now(),
        };
        self.record(alert.clone());
        Some(alert)
    }

    /// Health derived purely from the alert log
    pub fn get_system_health(&self) -> SystemHealth {
        let alerts: Vec<Alert> = self.alerts.lock().iter().cloned().collect();

        let mut protocols: BTreeMap<String, u8> = BTreeMap::new();
        for alert in &alerts {
            let score = protocols.entry(alert.protocol.clone()).or_insert(100);
            *score = score.saturating_sub(alert.severity.penalty());
        }

        let overall = if protocols.is_empty() {
            100
        } else {
            let sum: u32 = protocols.values().map(|s| *s as u32).sum();
            (sum as f64 / protocols.len() as f64).round() as u8
        };

        SystemHealth {
            overall,
            protocols,
            alert_count: alerts.len(),
            alerts,
        }
    }

    /// Persist the baseline values recorded by this cycle's checks
    pub fn flush_baseline(&self) {
        self.baseline.flush();
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().iter().cloned().collect()
    }

    fn record(&self, alert: Alert) {
        match alert.severity {
            Severity::High => warn!(protocol = %alert.protocol, product = %alert.product, "{}", alert.message),
            _ => debug!(protocol = %alert.protocol, product = %alert.product, "{}", alert.message),
        }

        let mut alerts = self.alerts.lock();
        while alerts.len() >= self.config.alert_capacity.max(1) {
            alerts.pop_front();
        }
        alerts.push_back(alert);
    }

    fn check_rate(&self, card: &mut Scorecard<'_>, product: &ProductSnapshot) {
        let key = product.key();
        let rate = product.headline_rate();

        if !rate.is_finite() || rate < 0.0 {
            card.flag(&key, MetricKind::Apy, Severity::High, HIGH_SCORE, format!("APY is invalid: {}", rate));
            return;
        }

        let category = product.category();
        if category.is_staking() {
            if rate > self.config.staking_apy_max {
                card.flag(
                    &key,
                    MetricKind::Apy,
                    Severity::High,
                    HIGH_SCORE,
                    format!("Staking APY {:.2}% exceeds {:.2}%", rate, self.config.staking_apy_max),
                );
            } else if rate < self.config.staking_apy_min {
                card.flag(
                    &key,
                    MetricKind::Apy,
                    Severity::Medium,
                    MEDIUM_SCORE,
                    format!("Staking APY {:.3}% below {:.2}%", rate, self.config.staking_apy_min),
                );
            }
        } else if category == Category::Lending && rate > self.config.lending_apy_max {
            card.flag(
                &key,
                MetricKind::Apy,
                Severity::High,
                HIGH_SCORE,
                format!("Supply APY {:.2}% exceeds {:.2}%", rate, self.config.lending_apy_max),
            );
        } else if category == Category::YieldFarming && rate > self.config.dex_apr_max {
            card.flag(
                &key,
                MetricKind::Apy,
                Severity::Medium,
                MEDIUM_SCORE,
                format!("Pair APR {:.2}% exceeds {:.2}%", rate, self.config.dex_apr_max),
            );
        }
    }

    fn check_tvl(&self, card: &mut Scorecard<'_>, product: &ProductSnapshot) {
        let tvl = product.tvl_usd();
        if !tvl.is_finite() || tvl < 0.0 {
            card.flag(&product.key(), MetricKind::Tvl, Severity::High, HIGH_SCORE, format!("TVL is invalid: {}", tvl));
        }
    }

    fn check_baseline(&self, card: &mut Scorecard<'_>, snapshot: &ProtocolSnapshot, product: &ProductSnapshot) {
        let rate = product.headline_rate();
        if !rate.is_finite() || rate < 0.0 {
            return;
        }

        let key = format!("{}:{}:apy", snapshot.protocol.slug(), product.key());
        if let Some(previous) = self.baseline.get(&key).filter(|p| *p > 0.0) {
            let change = (rate - previous).abs() / previous * 100.0;
            let flagged = if change > 100.0 {
                Some((Severity::High, HIGH_SCORE))
            } else if change > 50.0 {
                Some((Severity::Medium, MEDIUM_SCORE))
            } else if change > 25.0 {
                Some((Severity::Medium, MILD_SCORE))
            } else {
                None
            };

            if let Some((severity, score)) = flagged {
                card.flag(
                    &product.key(),
                    MetricKind::Apy,
                    severity,
                    score,
                    format!("APY moved {:.1}% since last cycle ({:.2}% -> {:.2}%)", change, previous, rate),
                );
            }
        }

        self.baseline.set(&key, rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::MemoryBaseline;
    use yield_core::{LendingMarket, Protocol, Rate, StakingPool};

    fn monitor() -> DataMonitor {
        DataMonitor::new(MonitorConfig::default(), Arc::new(MemoryBaseline::new()))
    }

    fn staking(apy: f64, tvl: f64) -> ProductSnapshot {
        ProductSnapshot::LiquidStaking(StakingPool {
            token: "sAVAX".to_string(),
            underlying: "AVAX".to_string(),
            rate: Rate::apy(apy),
            tvl_usd: tvl,
            exchange_rate: 1.2,
            total_staked: 0.0,
            confidence: 0.9,
            live: true,
        })
    }

    fn snapshot(products: Vec<ProductSnapshot>) -> ProtocolSnapshot {
        ProtocolSnapshot::new(Protocol::Benqi, products)
    }

    #[test]
    fn test_implausible_staking_apy_is_high_severity() {
        let monitor = monitor();
        let score = monitor.validate_protocol_metrics(&snapshot(vec![staking(120.0, 1_000_000.0)]));

        assert!(score
            .alerts
            .iter()
            .any(|a| a.metric == MetricKind::Apy && a.severity == Severity::High));
        assert!(score.apy <= 30);
        assert_eq!(score.tvl, 100);
    }

    #[test]
    fn test_healthy_snapshot_scores_full() {
        let monitor = monitor();
        let score = monitor.validate_protocol_metrics(&snapshot(vec![staking(5.05, 650e6)]));

        assert!(score.alerts.is_empty());
        assert_eq!(score.overall, 100);
        assert_eq!(monitor.get_system_health().overall, 100);
    }

    #[test]
    fn test_tiny_apy_and_tvl_are_medium() {
        let monitor = monitor();
        let score = monitor.validate_protocol_metrics(&snapshot(vec![staking(0.01, 50_000.0)]));

        assert_eq!(score.apy, 60);
        assert_eq!(score.tvl, 60);
        assert!(score.alerts.iter().all(|a| a.severity == Severity::Medium));
    }

    #[test]
    fn test_nan_values_are_high_severity() {
        let monitor = monitor();
        let score = monitor.validate_protocol_metrics(&snapshot(vec![staking(f64::NAN, f64::NAN)]));

        assert_eq!(score.apy, 30);
        assert_eq!(score.tvl, 30);
    }

    #[test]
    fn test_baseline_deviation() {
        let monitor = monitor();
        monitor.validate_protocol_metrics(&snapshot(vec![staking(5.0, 650e6)]));

        // 5.0 -> 7.0 is a 40% move
        let score = monitor.validate_protocol_metrics(&snapshot(vec![staking(7.0, 650e6)]));
        assert_eq!(score.apy, 75);

        // 7.0 -> 15.0 is a >100% move
        let score = monitor.validate_protocol_metrics(&snapshot(vec![staking(15.0, 650e6)]));
        assert_eq!(score.apy, 30);
        assert!(score.alerts.iter().any(|a| a.severity == Severity::High));
    }

    #[test]
    fn test_lending_bounds() {
        let monitor = monitor();
        let market = ProductSnapshot::Lending(LendingMarket {
            market: "USDC".to_string(),
            asset: "USDC".to_string(),
            supply_apy: 140.0,
            borrow_apy: 160.0,
            total_supply_usd: 10e6,
            total_borrows_usd: 9e6,
            utilization: 90.0,
            confidence: 0.9,
            live: true,
        });
        let score = monitor.validate_protocol_metrics(&snapshot(vec![market]));
        assert_eq!(score.apy, 30);
    }

    #[test]
    fn test_alert_log_is_bounded() {
        let monitor = monitor();
        for _ in 0..60 {
            monitor.validate_protocol_metrics(&snapshot(vec![staking(f64::NAN, 650e6)]));
        }
        assert_eq!(monitor.alerts().len(), 50);
    }

    #[test]
    fn test_system_health_degrades_with_alerts() {
        let monitor = monitor();
        monitor.validate_protocol_metrics(&snapshot(vec![staking(120.0, 650e6)]));
        let first = monitor.get_system_health();
        assert_eq!(first.protocols.get("BENQI"), Some(&70));

        monitor.validate_protocol_metrics(&snapshot(vec![staking(120.0, 650e6)]));
        let second = monitor.get_system_health();
        assert!(second.overall < first.overall);
        assert_eq!(second.alert_count, 2);
    }

    #[test]
    fn test_reference_cross_check() {
        let monitor = monitor();
        let snap = snapshot(vec![staking(5.0, 650e6)]);

        assert!(monitor.cross_check_reference(&snap, 640e6).is_none());
        assert!(monitor.cross_check_reference(&snap, f64::NAN).is_none());

        let alert = monitor.cross_check_reference(&snap, 300e6).unwrap();
        assert_eq!(alert.severity, Severity::Medium);
        assert_eq!(monitor.alerts().len(), 1);
    }
}
