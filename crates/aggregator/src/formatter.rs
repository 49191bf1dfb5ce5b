//! Snapshot to yield-table mapping
//!
//! `format_to_yield_opportunities` is pure: the same `AggregatedData` always maps
//! to the same rows in the same order. Non-finite rates and amounts render as
//! "N/A" and rank as zero.

use std::collections::HashSet;

use yield_core::{
    format_percent, format_usd, sanitize_amount, AggregatedData, Category, DexPair, LendingMarket,
    ProductSnapshot, Protocol, RateKind, RiskTier, StakingPool, YieldOpportunity,
};

/// Rows for every product of every present protocol, in protocol order
pub fn format_to_yield_opportunities(data: &AggregatedData) -> Vec<YieldOpportunity> {
    let mut ids = HashSet::new();
    let mut rows = Vec::new();

    for (protocol, snapshot) in &data.protocols {
        for product in &snapshot.products {
            for mut row in product_rows(*protocol, product) {
                row.id = unique_id(&mut ids, row.id);
                rows.push(row);
            }
        }
    }

    rows
}

/// Highest APY first; ties broken by TVL, then id
pub fn rank_by_apy(mut rows: Vec<YieldOpportunity>) -> Vec<YieldOpportunity> {
    rows.sort_by(|a, b| {
        b.apy_value
            .total_cmp(&a.apy_value)
            .then(b.tvl_value.total_cmp(&a.tvl_value))
            .then_with(|| a.id.cmp(&b.id))
    });
    rows
}

fn unique_id(seen: &mut HashSet<String>, id: String) -> String {
    if seen.insert(id.clone()) {
        return id;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", id, n);
        if seen.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn product_rows(protocol: Protocol, product: &ProductSnapshot) -> Vec<YieldOpportunity> {
    let key = product.key();
    match product {
        ProductSnapshot::Lending(market) => lending_rows(protocol, &key, market),
        ProductSnapshot::LiquidStaking(pool)
        | ProductSnapshot::TokenStaking(pool)
        | ProductSnapshot::ValidatorStaking(pool) => {
            vec![staking_row(protocol, product.category(), &key, pool)]
        }
        ProductSnapshot::DexPair(pair) => vec![pair_row(protocol, &key, pair)],
    }
}

struct RowInput<'a> {
    protocol: Protocol,
    category: Category,
    key: &'a str,
    asset: String,
    rate: f64,
    tvl: f64,
    utilization: Option<f64>,
    confidence: f64,
    live: bool,
    features: Vec<String>,
}

fn row(input: RowInput<'_>) -> YieldOpportunity {
    let RowInput {
        protocol,
        category,
        key,
        asset,
        rate,
        tvl,
        utilization,
        confidence,
        live,
        mut features,
    } = input;

    if !live {
        features.push("Fallback data".to_string());
    }

    YieldOpportunity {
        id: YieldOpportunity::id_for(protocol, category, key),
        protocol: protocol.name().to_string(),
        category,
        asset,
        apy: format_percent(rate),
        tvl: format_usd(tvl),
        risk: RiskTier::classify(utilization, sanitize_amount(rate), confidence),
        icon: protocol.icon().to_string(),
        url: protocol.app_url().to_string(),
        live,
        features,
        apy_value: sanitize_amount(rate),
        tvl_value: sanitize_amount(tvl),
    }
}

fn lending_rows(protocol: Protocol, key: &str, market: &LendingMarket) -> Vec<YieldOpportunity> {
    let utilization = Some(market.utilization).filter(|u| u.is_finite());
    let utilization_tag = utilization
        .map(|u| format!("{:.1}% utilized", u))
        .unwrap_or_else(|| "Utilization N/A".to_string());

    vec![
        row(RowInput {
            protocol,
            category: Category::Lending,
            key,
            asset: market.asset.clone(),
            rate: market.supply_apy,
            tvl: market.total_supply_usd,
            utilization,
            confidence: market.confidence,
            live: market.live,
            features: vec![utilization_tag.clone()],
        }),
        row(RowInput {
            protocol,
            category: Category::Borrowing,
            key,
            asset: market.asset.clone(),
            rate: market.borrow_apy,
            tvl: market.total_borrows_usd,
            utilization,
            confidence: market.confidence,
            live: market.live,
            features: vec![utilization_tag],
        }),
    ]
}

fn staking_row(protocol: Protocol, category: Category, key: &str, pool: &StakingPool) -> YieldOpportunity {
    let mut features = Vec::new();
    match category {
        Category::LiquidStaking => features.push(format!("Liquid {}", pool.underlying)),
        Category::ValidatorStaking => features.push("Validator rewards".to_string()),
        _ => {}
    }
    if pool.rate.kind == RateKind::Apr {
        features.push("APR".to_string());
    }
    if pool.exchange_rate.is_finite() && pool.exchange_rate > 0.0 && pool.exchange_rate != 1.0 {
        features.push(format!("1 {} = {:.4} {}", pool.token, pool.exchange_rate, pool.underlying));
    }

    row(RowInput {
        protocol,
        category,
        key,
        asset: pool.token.clone(),
        rate: pool.rate.value,
        tvl: pool.tvl_usd,
        utilization: None,
        confidence: pool.confidence,
        live: pool.live,
        features,
    })
}

fn pair_row(protocol: Protocol, key: &str, pair: &DexPair) -> YieldOpportunity {
    let mut features = vec![format!("24h volume {}", format_usd(pair.volume_24h_usd))];
    if pair.reward_apr.is_some() {
        features.push("Farm rewards".to_string());
    }

    row(RowInput {
        protocol,
        category: Category::YieldFarming,
        key,
        asset: pair.label(),
        rate: pair.total_apr(),
        tvl: pair.reserve_usd,
        utilization: None,
        confidence: pair.confidence,
        live: pair.live,
        features,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::testing::staking;
    use proptest::prelude::*;
    use yield_core::{ProtocolSnapshot, NOT_AVAILABLE};

    fn market(name: &str, asset: &str, supply: f64, util: f64) -> ProductSnapshot {
        ProductSnapshot::Lending(LendingMarket {
            market: name.to_string(),
            asset: asset.to_string(),
            supply_apy: supply,
            borrow_apy: supply * 1.6,
            total_supply_usd: 10_000_000.0,
            total_borrows_usd: 10_000_000.0 * util / 100.0,
            utilization: util,
            confidence: 0.95,
            live: true,
        })
    }

    fn pair(token0: &str, token1: &str, apr: f64) -> ProductSnapshot {
        ProductSnapshot::DexPair(DexPair {
            pair_address: format!("0x{}{}", token0, token1).to_lowercase(),
            token0: token0.to_string(),
            token1: token1.to_string(),
            reserve_usd: 4_000_000.0,
            volume_24h_usd: 1_000_000.0,
            fee_apr: apr,
            reward_apr: None,
            confidence: 0.9,
            live: true,
        })
    }

    fn sample() -> AggregatedData {
        AggregatedData::new(vec![
            ProtocolSnapshot::new(
                Protocol::Benqi,
                vec![staking("sAVAX", 5.05, 650e6), market("USDC", "USDC", 4.5, 85.0)],
            ),
            ProtocolSnapshot::new(Protocol::Pangolin, vec![pair("AVAX", "USDC", 9.1)]),
        ])
    }

    #[test]
    fn test_rows_per_product() {
        let rows = format_to_yield_opportunities(&sample());

        let categories: Vec<Category> = rows.iter().map(|r| r.category).collect();
        assert_eq!(
            categories,
            vec![
                Category::LiquidStaking,
                Category::Lending,
                Category::Borrowing,
                Category::YieldFarming,
            ]
        );

        assert_eq!(rows[0].id, "benqi-liquid-staking-savax");
        assert_eq!(rows[0].apy, "5.05%");
        assert_eq!(rows[0].tvl, "$650.00M");
        assert_eq!(rows[0].risk, RiskTier::Low);

        // 85% utilization
        assert_eq!(rows[1].risk, RiskTier::High);
        assert_eq!(rows[3].asset, "AVAX/USDC");
        assert_eq!(rows[3].id, "pangolin-yield-farming-avax-usdc");
    }

    #[test]
    fn test_formatting_is_idempotent() {
        let data = sample();
        assert_eq!(format_to_yield_opportunities(&data), format_to_yield_opportunities(&data));
    }

    #[test]
    fn test_colliding_keys_get_unique_ids() {
        let data = AggregatedData::new(vec![ProtocolSnapshot::new(
            Protocol::Pangolin,
            vec![pair("AVAX", "USDC", 9.0), pair("AVAX", "USDC", 4.0)],
        )]);

        let rows = format_to_yield_opportunities(&data);
        assert_eq!(rows[0].id, "pangolin-yield-farming-avax-usdc");
        assert_eq!(rows[1].id, "pangolin-yield-farming-avax-usdc-2");
    }

    #[test]
    fn test_non_finite_values_render_na() {
        let data = AggregatedData::new(vec![ProtocolSnapshot::new(
            Protocol::Avant,
            vec![staking("savUSD", f64::NAN, f64::INFINITY)],
        )]);

        let rows = format_to_yield_opportunities(&data);
        assert_eq!(rows[0].apy, NOT_AVAILABLE);
        assert_eq!(rows[0].tvl, NOT_AVAILABLE);
        assert_eq!(rows[0].apy_value, 0.0);
        assert_eq!(rows[0].tvl_value, 0.0);
    }

    #[test]
    fn test_absent_protocol_emits_nothing() {
        assert!(format_to_yield_opportunities(&AggregatedData::empty()).is_empty());
    }

    #[test]
    fn test_rank_by_apy() {
        let ranked = rank_by_apy(format_to_yield_opportunities(&sample()));
        let apys: Vec<f64> = ranked.iter().map(|r| r.apy_value).collect();
        assert!(apys.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(ranked[0].category, Category::YieldFarming);
    }

    fn any_value() -> impl Strategy<Value = f64> {
        prop_oneof![
            -1e12..1e12f64,
            Just(f64::NAN),
            Just(f64::INFINITY),
            Just(f64::NEG_INFINITY),
        ]
    }

    proptest! {
        #[test]
        fn prop_rows_never_render_nan(
            apy in any_value(),
            tvl in any_value(),
            supply in any_value(),
            util in any_value(),
        ) {
            let data = AggregatedData::new(vec![
                ProtocolSnapshot::new(Protocol::GoGoPool, vec![staking("ggAVAX", apy, tvl)]),
                ProtocolSnapshot::new(Protocol::Silo, vec![market("m", "USDC", supply, util)]),
            ]);

            let rows = format_to_yield_opportunities(&data);
            let ids: HashSet<&str> = rows.iter().map(|r| r.id.as_str()).collect();
            prop_assert_eq!(ids.len(), rows.len());
            for row in &rows {
                prop_assert!(!row.apy.contains("NaN") && !row.apy.contains("inf"));
                prop_assert!(!row.tvl.contains("NaN") && !row.tvl.contains("inf"));
                prop_assert!(row.apy_value.is_finite() && row.apy_value >= 0.0);
                prop_assert!(row.tvl_value.is_finite() && row.tvl_value >= 0.0);
            }
        }
    }
}
