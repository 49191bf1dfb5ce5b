//! Normalized protocol snapshots
//!
//! Each fetcher reduces its reads to one `ProtocolSnapshot` holding a list of
//! products. A product is one of a small set of shapes; the formatter turns each
//! shape into `YieldOpportunity` records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{sanitize_amount, Category, Protocol, Rate};

/// Lending market (Compound-style or isolated silo)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LendingMarket {
    /// Market label, e.g. "AVAX" or "savUSD/USDC"
    pub market: String,
    pub asset: String,
    pub supply_apy: f64,
    pub borrow_apy: f64,
    pub total_supply_usd: f64,
    pub total_borrows_usd: f64,
    /// Borrows / (cash + borrows) in percent
    pub utilization: f64,
    pub confidence: f64,
    pub live: bool,
}

impl LendingMarket {
    pub fn utilization_of(cash: f64, borrows: f64) -> f64 {
        let total = cash + borrows;
        if total > 0.0 && total.is_finite() {
            sanitize_amount(borrows / total * 100.0)
        } else {
            0.0
        }
    }
}

/// Staking pool (liquid staking token, staked stablecoin or validator pool)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakingPool {
    /// Receipt token, e.g. "sAVAX"
    pub token: String,
    /// Staked asset, e.g. "AVAX"
    pub underlying: String,
    pub rate: Rate,
    pub tvl_usd: f64,
    /// Underlying per share
    pub exchange_rate: f64,
    pub total_staked: f64,
    pub confidence: f64,
    pub live: bool,
}

/// DEX liquidity pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DexPair {
    pub pair_address: String,
    pub token0: String,
    pub token1: String,
    pub reserve_usd: f64,
    pub volume_24h_usd: f64,
    /// Trading-fee APR in percent
    pub fee_apr: f64,
    /// Farm reward APR in percent, when known
    pub reward_apr: Option<f64>,
    pub confidence: f64,
    pub live: bool,
}

impl DexPair {
    pub fn label(&self) -> String {
        format!("{}/{}", self.token0, self.token1)
    }

    pub fn total_apr(&self) -> f64 {
        sanitize_amount(self.fee_apr) + self.reward_apr.map(sanitize_amount).unwrap_or(0.0)
    }
}

/// One product within a protocol snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProductSnapshot {
    Lending(LendingMarket),
    LiquidStaking(StakingPool),
    TokenStaking(StakingPool),
    ValidatorStaking(StakingPool),
    DexPair(DexPair),
}

impl ProductSnapshot {
    /// Primary category of the product
    pub fn category(&self) -> Category {
        match self {
            ProductSnapshot::Lending(_) => Category::Lending,
            ProductSnapshot::LiquidStaking(_) => Category::LiquidStaking,
            ProductSnapshot::TokenStaking(_) => Category::TokenStaking,
            ProductSnapshot::ValidatorStaking(_) => Category::ValidatorStaking,
            ProductSnapshot::DexPair(_) => Category::YieldFarming,
        }
    }

    /// Stable per-protocol key for the product
    pub fn key(&self) -> String {
        match self {
            ProductSnapshot::Lending(m) if m.market == m.asset => m.market.clone(),
            ProductSnapshot::Lending(m) => format!("{} {}", m.market, m.asset),
            ProductSnapshot::LiquidStaking(p)
            | ProductSnapshot::TokenStaking(p)
            | ProductSnapshot::ValidatorStaking(p) => p.token.clone(),
            ProductSnapshot::DexPair(p) => p.label(),
        }
    }

    /// Headline yield in percent (supply APY for lending)
    pub fn headline_rate(&self) -> f64 {
        match self {
            ProductSnapshot::Lending(m) => m.supply_apy,
            ProductSnapshot::LiquidStaking(p)
            | ProductSnapshot::TokenStaking(p)
            | ProductSnapshot::ValidatorStaking(p) => p.rate.value,
            ProductSnapshot::DexPair(p) => p.total_apr(),
        }
    }

    /// Value locked in USD
    pub fn tvl_usd(&self) -> f64 {
        match self {
            ProductSnapshot::Lending(m) => m.total_supply_usd,
            ProductSnapshot::LiquidStaking(p)
            | ProductSnapshot::TokenStaking(p)
            | ProductSnapshot::ValidatorStaking(p) => p.tvl_usd,
            ProductSnapshot::DexPair(p) => p.reserve_usd,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            ProductSnapshot::Lending(m) => m.confidence,
            ProductSnapshot::LiquidStaking(p)
            | ProductSnapshot::TokenStaking(p)
            | ProductSnapshot::ValidatorStaking(p) => p.confidence,
            ProductSnapshot::DexPair(p) => p.confidence,
        }
    }

    pub fn is_live(&self) -> bool {
        match self {
            ProductSnapshot::Lending(m) => m.live,
            ProductSnapshot::LiquidStaking(p)
            | ProductSnapshot::TokenStaking(p)
            | ProductSnapshot::ValidatorStaking(p) => p.live,
            ProductSnapshot::DexPair(p) => p.live,
        }
    }

    /// Utilization in percent, for products that have one
    pub fn utilization(&self) -> Option<f64> {
        match self {
            ProductSnapshot::Lending(m) => Some(m.utilization),
            _ => None,
        }
    }
}

/// Latest result for one protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolSnapshot {
    pub protocol: Protocol,
    pub products: Vec<ProductSnapshot>,
    pub fetched_at: DateTime<Utc>,
}

impl ProtocolSnapshot {
    pub fn new(protocol: Protocol, products: Vec<ProductSnapshot>) -> Self {
        Self {
            protocol,
            products,
            fetched_at: Utc::now(),
        }
    }

    /// Sum of product TVL in USD
    pub fn total_tvl(&self) -> f64 {
        self.products.iter().map(|p| sanitize_amount(p.tvl_usd())).sum()
    }

    pub fn has_live_data(&self) -> bool {
        self.products.iter().any(|p| p.is_live())
    }
}

/// Snapshot of the latest successful result per protocol.
///
/// Replaced wholesale on each refresh; a protocol that failed this cycle is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedData {
    pub protocols: BTreeMap<Protocol, ProtocolSnapshot>,
    pub last_updated: DateTime<Utc>,
}

impl AggregatedData {
    pub fn new(snapshots: impl IntoIterator<Item = ProtocolSnapshot>) -> Self {
        Self {
            protocols: snapshots.into_iter().map(|s| (s.protocol, s)).collect(),
            last_updated: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    pub fn get(&self, protocol: Protocol) -> Option<&ProtocolSnapshot> {
        self.protocols.get(&protocol)
    }

    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }
}

impl Default for AggregatedData {
    fn default() -> Self {
        Self::empty()
    }
}
