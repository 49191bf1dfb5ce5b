//! Configuration types

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{tokens, ConfigError, ConfigResult};

/// RPC endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub http_url: String,
    pub request_timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            http_url: "https://api.avax.network/ext/bc/C/rpc".to_string(),
            request_timeout_ms: 8_000,
        }
    }
}

/// Price oracle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceConfig {
    pub api_url: String,
    pub ttl_secs: u64,
    pub request_timeout_ms: u64,
}

impl PriceConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.coingecko.com/api/v3/simple/price".to_string(),
            ttl_secs: 30,
            request_timeout_ms: 5_000,
        }
    }
}

/// Refresh loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    pub interval_secs: u64,
    /// Upper bound for a single protocol fetch
    pub fetch_timeout_secs: u64,
    /// Markets below this TVL are left out of summary metrics
    pub materiality_floor_usd: f64,
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 15,
            fetch_timeout_secs: 10,
            materiality_floor_usd: 100_000.0,
        }
    }
}

/// Data monitor thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub staking_apy_max: f64,
    pub staking_apy_min: f64,
    pub lending_apy_max: f64,
    pub dex_apr_max: f64,
    /// TVL below this is suspicious for a major protocol
    pub min_major_tvl_usd: f64,
    /// Max relative deviation from the reference aggregator, in percent
    pub reference_max_deviation_pct: f64,
    pub alert_capacity: usize,
    /// File backing the previous-cycle baseline; in-memory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_path: Option<String>,
    pub defillama_url: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            staking_apy_max: 50.0,
            staking_apy_min: 0.1,
            lending_apy_max: 100.0,
            dex_apr_max: 500.0,
            min_major_tvl_usd: 100_000.0,
            reference_max_deviation_pct: 30.0,
            alert_capacity: 50,
            baseline_path: None,
            defillama_url: "https://api.llama.fi".to_string(),
        }
    }
}

/// A single Compound-style lending market
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LendingMarketConfig {
    pub symbol: String,
    pub qi_token: Address,
    pub fallback_supply_apy: f64,
    pub fallback_borrow_apy: f64,
    /// Underlying units (cash + borrows) assumed when the market cannot be read
    pub fallback_total_underlying: f64,
}

impl LendingMarketConfig {
    fn new(symbol: &str, qi_token: Address, supply: f64, borrow: f64, total: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            qi_token,
            fallback_supply_apy: supply,
            fallback_borrow_apy: borrow,
            fallback_total_underlying: total,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenqiConfig {
    pub enabled: bool,
    pub allow_fallback: bool,
    pub savax: Address,
    pub staking_api_url: String,
    pub fallback_apy: f64,
    pub fallback_exchange_rate: f64,
    pub fallback_total_pooled_avax: f64,
    pub markets: Vec<LendingMarketConfig>,
}

impl Default for BenqiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_fallback: true,
            savax: tokens::SAVAX,
            staking_api_url: "https://api.benqi.fi/liquidstaking/apr".to_string(),
            fallback_apy: 5.05,
            fallback_exchange_rate: 1.18,
            fallback_total_pooled_avax: 15_294_117.0,
            markets: vec![
                LendingMarketConfig::new("AVAX", tokens::QI_AVAX, 2.1, 4.8, 3_200_000.0),
                LendingMarketConfig::new("USDC", tokens::QI_USDC, 4.5, 7.2, 60_000_000.0),
                LendingMarketConfig::new("USDT", tokens::QI_USDT, 4.2, 7.0, 35_000_000.0),
                LendingMarketConfig::new("BTC.b", tokens::QI_BTC_B, 0.3, 2.5, 450.0),
                LendingMarketConfig::new("sAVAX", tokens::QI_SAVAX, 0.1, 1.9, 1_800_000.0),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoGoPoolConfig {
    pub enabled: bool,
    pub allow_fallback: bool,
    pub ggavax: Address,
    pub api_url: String,
    pub fallback_apr: f64,
    pub fallback_exchange_rate: f64,
    pub fallback_total_assets: f64,
    pub fallback_validator_apr: f64,
    pub fallback_minipools: u64,
}

impl Default for GoGoPoolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_fallback: true,
            ggavax: tokens::GGAVAX,
            api_url: "https://api.gogopool.com/metrics".to_string(),
            fallback_apr: 6.85,
            fallback_exchange_rate: 1.07,
            fallback_total_assets: 8_517_647.0,
            fallback_validator_apr: 7.9,
            fallback_minipools: 180,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvantConfig {
    pub enabled: bool,
    pub allow_fallback: bool,
    pub savusd: Address,
    pub api_url: String,
    pub fallback_apy: f64,
    pub fallback_exchange_rate: f64,
    pub fallback_total_assets: f64,
}

impl Default for AvantConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_fallback: true,
            savusd: tokens::SAVUSD,
            api_url: "https://app.avantprotocol.com/api/savusd/stats".to_string(),
            fallback_apy: 10.0,
            fallback_exchange_rate: 1.08,
            fallback_total_assets: 95_000_000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PangolinConfig {
    pub enabled: bool,
    pub allow_fallback: bool,
    pub subgraph_url: String,
    /// Share of each swap paid to liquidity providers
    pub lp_fee_rate: f64,
    pub min_reserve_usd: f64,
    pub max_pairs: usize,
}

impl Default for PangolinConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_fallback: true,
            subgraph_url: "https://api.thegraph.com/subgraphs/name/pangolindex/exchange".to_string(),
            lp_fee_rate: 0.0025,
            min_reserve_usd: 50_000.0,
            max_pairs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiloConfig {
    pub enabled: bool,
    pub allow_fallback: bool,
    pub api_url: String,
    pub min_tvl_usd: f64,
}

impl Default for SiloConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_fallback: true,
            api_url: "https://v2.silo.finance/api/markets?chain=avalanche".to_string(),
            min_tvl_usd: 10_000.0,
        }
    }
}

/// Per-protocol fetcher configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProtocolsConfig {
    pub benqi: BenqiConfig,
    pub gogopool: GoGoPoolConfig,
    pub avant: AvantConfig,
    pub pangolin: PangolinConfig,
    pub silo: SiloConfig,
}

/// Complete dashboard configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub rpc: RpcConfig,
    pub price: PriceConfig,
    pub refresh: RefreshConfig,
    pub monitor: MonitorConfig,
    pub protocols: ProtocolsConfig,
}

impl DashboardConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.rpc.http_url.trim().is_empty() {
            return Err(ConfigError::Invalid("rpc.http_url is empty".to_string()));
        }
        if self.refresh.interval_secs == 0 {
            return Err(ConfigError::Invalid("refresh.interval_secs must be > 0".to_string()));
        }
        if self.refresh.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "refresh.fetch_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.monitor.alert_capacity == 0 {
            return Err(ConfigError::Invalid("monitor.alert_capacity must be > 0".to_string()));
        }
        if self.monitor.staking_apy_min >= self.monitor.staking_apy_max {
            return Err(ConfigError::Invalid(format!(
                "monitor.staking_apy_min ({}) must be below staking_apy_max ({})",
                self.monitor.staking_apy_min, self.monitor.staking_apy_max
            )));
        }
        let fee = self.protocols.pangolin.lp_fee_rate;
        if !(0.0..1.0).contains(&fee) {
            return Err(ConfigError::Invalid(format!(
                "protocols.pangolin.lp_fee_rate out of range: {}",
                fee
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DashboardConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.price.ttl(), Duration::from_secs(30));
        assert_eq!(config.refresh.interval(), Duration::from_secs(15));
        assert_eq!(config.monitor.alert_capacity, 50);
    }

    #[test]
    fn test_rejects_zero_interval() {
        let mut config = DashboardConfig::default();
        config.refresh.interval_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_config_roundtrips_through_json() {
        let config = DashboardConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: DashboardConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.protocols.benqi.savax, tokens::SAVAX);
        assert_eq!(parsed.protocols.benqi.markets.len(), 5);
    }
}
