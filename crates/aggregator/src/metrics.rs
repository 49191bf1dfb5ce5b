//! Portfolio summary over an aggregated snapshot

use yield_core::{sanitize_amount, AggregatedData, TotalMetrics};

/// Sum TVL and average headline yield over products with at least
/// `materiality_floor_usd` of TVL. A protocol counts as active when one of its
/// products clears the floor.
pub fn calculate_total_metrics(data: &AggregatedData, materiality_floor_usd: f64) -> TotalMetrics {
    let mut total_tvl = 0.0;
    let mut rate_sum = 0.0;
    let mut rate_count = 0usize;
    let mut active_protocols = 0usize;

    for snapshot in data.protocols.values() {
        let mut active = false;
        for product in &snapshot.products {
            let tvl = sanitize_amount(product.tvl_usd());
            if tvl < materiality_floor_usd || tvl == 0.0 {
                continue;
            }
            active = true;
            total_tvl += tvl;

            let rate = product.headline_rate();
            if rate.is_finite() {
                rate_sum += rate.max(0.0);
                rate_count += 1;
            }
        }
        if active {
            active_protocols += 1;
        }
    }

    TotalMetrics {
        total_tvl,
        average_apy: if rate_count > 0 {
            rate_sum / rate_count as f64
        } else {
            0.0
        },
        active_protocols,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::testing::staking;
    use yield_core::{ProductSnapshot, Protocol, ProtocolSnapshot, Rate};

    #[test]
    fn test_empty_data() {
        let totals = calculate_total_metrics(&AggregatedData::empty(), 100_000.0);
        assert_eq!(totals, TotalMetrics::default());
        assert_eq!(totals.total_tvl, 0.0);
        assert_eq!(totals.average_apy, 0.0);
        assert_eq!(totals.active_protocols, 0);
    }

    #[test]
    fn test_benqi_and_gogopool_totals() {
        let mut ggavax = staking("ggAVAX", 0.0, 362_000_000.0);
        if let ProductSnapshot::LiquidStaking(pool) = &mut ggavax {
            pool.rate = Rate::apr(6.85);
        }
        let data = AggregatedData::new(vec![
            ProtocolSnapshot::new(Protocol::Benqi, vec![staking("sAVAX", 5.05, 650_000_000.0)]),
            ProtocolSnapshot::new(Protocol::GoGoPool, vec![ggavax]),
        ]);

        let totals = calculate_total_metrics(&data, 100_000.0);
        assert!((totals.total_tvl - 1_012_000_000.0).abs() < 1.0);
        assert!((totals.average_apy - 5.95).abs() < 1e-9);
        assert_eq!(totals.active_protocols, 2);
    }

    #[test]
    fn test_immaterial_markets_excluded() {
        let data = AggregatedData::new(vec![
            ProtocolSnapshot::new(Protocol::Benqi, vec![staking("sAVAX", 5.0, 1_000_000.0)]),
            ProtocolSnapshot::new(Protocol::Silo, vec![staking("dust", 90.0, 5_000.0)]),
        ]);

        let totals = calculate_total_metrics(&data, 100_000.0);
        assert_eq!(totals.total_tvl, 1_000_000.0);
        assert_eq!(totals.average_apy, 5.0);
        assert_eq!(totals.active_protocols, 1);
    }

    #[test]
    fn test_invalid_values_ignored() {
        let data = AggregatedData::new(vec![ProtocolSnapshot::new(
            Protocol::Avant,
            vec![staking("a", f64::NAN, 2_000_000.0), staking("b", 4.0, f64::NAN)],
        )]);

        let totals = calculate_total_metrics(&data, 100_000.0);
        assert_eq!(totals.total_tvl, 2_000_000.0);
        assert_eq!(totals.average_apy, 0.0);
        assert!(totals.total_tvl.is_finite() && totals.average_apy.is_finite());
    }
}
