//! Core type definitions

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds in a (non-leap) year, used for rate annualisation
pub const SECONDS_PER_YEAR: f64 = 31_536_000.0;

/// Supported yield protocols on Avalanche C-Chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Benqi,
    GoGoPool,
    Avant,
    Pangolin,
    Silo,
}

impl Protocol {
    pub const ALL: [Protocol; 5] = [
        Protocol::Benqi,
        Protocol::GoGoPool,
        Protocol::Avant,
        Protocol::Pangolin,
        Protocol::Silo,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Benqi => "BENQI",
            Protocol::GoGoPool => "GoGoPool",
            Protocol::Avant => "Avant",
            Protocol::Pangolin => "Pangolin",
            Protocol::Silo => "Silo",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Protocol::Benqi => "benqi",
            Protocol::GoGoPool => "gogopool",
            Protocol::Avant => "avant",
            Protocol::Pangolin => "pangolin",
            Protocol::Silo => "silo",
        }
    }

    /// Protocol identifier on DeFiLlama
    pub fn defillama_slug(&self) -> &'static str {
        match self {
            Protocol::Benqi => "benqi-staked-avax",
            Protocol::GoGoPool => "gogopool",
            Protocol::Avant => "avant-protocol",
            Protocol::Pangolin => "pangolin",
            Protocol::Silo => "silo-v2",
        }
    }

    pub fn app_url(&self) -> &'static str {
        match self {
            Protocol::Benqi => "https://app.benqi.fi",
            Protocol::GoGoPool => "https://app.gogopool.com",
            Protocol::Avant => "https://app.avantprotocol.com",
            Protocol::Pangolin => "https://app.pangolin.exchange",
            Protocol::Silo => "https://app.silo.finance",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Protocol::Benqi => "/icons/benqi.svg",
            Protocol::GoGoPool => "/icons/gogopool.svg",
            Protocol::Avant => "/icons/avant.svg",
            Protocol::Pangolin => "/icons/pangolin.svg",
            Protocol::Silo => "/icons/silo.svg",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Opportunity category shown to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Liquid Staking")]
    LiquidStaking,
    Lending,
    Borrowing,
    #[serde(rename = "Yield Farming")]
    YieldFarming,
    #[serde(rename = "Token Staking")]
    TokenStaking,
    #[serde(rename = "Validator Staking")]
    ValidatorStaking,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::LiquidStaking => "Liquid Staking",
            Category::Lending => "Lending",
            Category::Borrowing => "Borrowing",
            Category::YieldFarming => "Yield Farming",
            Category::TokenStaking => "Token Staking",
            Category::ValidatorStaking => "Validator Staking",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Category::LiquidStaking => "liquid-staking",
            Category::Lending => "lending",
            Category::Borrowing => "borrowing",
            Category::YieldFarming => "yield-farming",
            Category::TokenStaking => "token-staking",
            Category::ValidatorStaking => "validator-staking",
        }
    }

    pub fn is_staking(&self) -> bool {
        matches!(
            self,
            Category::LiquidStaking | Category::TokenStaking | Category::ValidatorStaking
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Risk bucket derived from utilization, yield and data confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// High if utilization > 80% or confidence < 0.6, Medium if utilization > 50%
    /// or APY > 10%, otherwise Low. Utilization and APY are percentages.
    pub fn classify(utilization_pct: Option<f64>, apy_pct: f64, confidence: f64) -> Self {
        let utilization = utilization_pct.filter(|u| u.is_finite()).unwrap_or(0.0);
        if utilization > 80.0 || !(confidence >= 0.6) {
            RiskTier::High
        } else if utilization > 50.0 || apy_pct > 10.0 {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskTier::Low => "Low",
            RiskTier::Medium => "Medium",
            RiskTier::High => "High",
        };
        write!(f, "{}", s)
    }
}

/// How a protocol quotes its yield
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateKind {
    Apy,
    Apr,
}

/// Yield rate in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    pub value: f64,
    pub kind: RateKind,
}

impl Rate {
    pub fn apy(value: f64) -> Self {
        Self { value, kind: RateKind::Apy }
    }

    pub fn apr(value: f64) -> Self {
        Self { value, kind: RateKind::Apr }
    }

    /// Value clamped to a non-negative finite number
    pub fn sanitized(&self) -> f64 {
        sanitize_amount(self.value)
    }
}

/// Token amount with proper decimal handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub raw: U256,
    pub decimals: u8,
}

impl TokenAmount {
    pub fn new(raw: U256, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    pub fn to_human(&self) -> f64 {
        let divisor = 10f64.powi(self.decimals as i32);
        // Convert U256 to f64 safely
        let raw_f64: f64 = self.raw.to_string().parse().unwrap_or(0.0);
        raw_f64 / divisor
    }

    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }
}

/// One whole unit (1e18) of an 18-decimal share token
pub fn one_share() -> U256 {
    U256::from(1_000_000_000_000_000_000u128)
}

/// Clamp negative values to zero and replace NaN/infinite with zero
pub fn sanitize_amount(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Compound a per-second rate (1e18 mantissa) into a percentage APY
pub fn rate_per_second_to_apy(rate_mantissa: U256) -> f64 {
    let per_second = TokenAmount::new(rate_mantissa, 18).to_human();
    ((1.0 + per_second).powf(SECONDS_PER_YEAR) - 1.0) * 100.0
}

/// Nominal APR equivalent of a compounded APY, both in percent
pub fn apy_to_apr(apy_pct: f64) -> f64 {
    (1.0 + apy_pct / 100.0).ln() * 100.0
}

/// Current wall clock in milliseconds
pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_amount_conversion() {
        // USDC with 6 decimals
        let amount = TokenAmount::new(U256::from(100_000_000u64), 6);
        assert!((amount.to_human() - 100.0).abs() < 0.0001);

        let avax = TokenAmount::new(U256::from(1_500_000_000_000_000_000u128), 18);
        assert!((avax.to_human() - 1.5).abs() < 0.0001);
    }

    #[test]
    fn test_rate_per_second_compounding() {
        // ~5% APR expressed per second
        let per_second = 0.05 / SECONDS_PER_YEAR;
        let mantissa = U256::from((per_second * 1e18) as u128);
        let apy = rate_per_second_to_apy(mantissa);
        assert!(apy > 5.0 && apy < 5.2, "apy = {apy}");

        assert_eq!(rate_per_second_to_apy(U256::ZERO), 0.0);
    }

    #[test]
    fn test_risk_classification() {
        assert_eq!(RiskTier::classify(Some(85.0), 3.0, 0.9), RiskTier::High);
        assert_eq!(RiskTier::classify(None, 3.0, 0.5), RiskTier::High);
        assert_eq!(RiskTier::classify(None, 3.0, f64::NAN), RiskTier::High);
        assert_eq!(RiskTier::classify(Some(60.0), 3.0, 0.9), RiskTier::Medium);
        assert_eq!(RiskTier::classify(None, 12.0, 0.9), RiskTier::Medium);
        assert_eq!(RiskTier::classify(Some(20.0), 4.0, 0.9), RiskTier::Low);
    }

    #[test]
    fn test_apy_to_apr() {
        assert_eq!(apy_to_apr(0.0), 0.0);
        let apr = apy_to_apr(7.0);
        assert!(apr > 6.7 && apr < 6.8);
    }

    #[test]
    fn test_sanitize_amount() {
        assert_eq!(sanitize_amount(-3.0), 0.0);
        assert_eq!(sanitize_amount(f64::NAN), 0.0);
        assert_eq!(sanitize_amount(f64::INFINITY), 0.0);
        assert_eq!(sanitize_amount(4.2), 4.2);
    }
}
