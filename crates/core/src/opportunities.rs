//! Yield opportunity types and display formatting

use serde::{Deserialize, Serialize};

use crate::{Category, Protocol, RiskTier};

/// Placeholder rendered for values that could not be determined
pub const NOT_AVAILABLE: &str = "N/A";

/// One row of the yield table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YieldOpportunity {
    pub id: String,
    pub protocol: String,
    pub category: Category,
    /// Asset or pair label, e.g. "AVAX" or "AVAX/USDC"
    pub asset: String,
    /// Display string, e.g. "5.05%"
    pub apy: String,
    /// Display string, e.g. "$650.00M"
    pub tvl: String,
    pub risk: RiskTier,
    pub icon: String,
    pub url: String,
    pub live: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    /// Numeric APY in percent for ranking; 0 when unavailable
    pub apy_value: f64,
    /// Numeric TVL in USD for ranking; 0 when unavailable
    pub tvl_value: f64,
}

impl YieldOpportunity {
    pub fn id_for(protocol: Protocol, category: Category, key: &str) -> String {
        let key: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();
        format!("{}-{}-{}", protocol.slug(), category.slug(), key.trim_matches('-'))
    }
}

/// Portfolio-level summary
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalMetrics {
    pub total_tvl: f64,
    pub average_apy: f64,
    pub active_protocols: usize,
}

/// Format a percentage, e.g. `5.05%`; negative values clamp to zero
pub fn format_percent(value: f64) -> String {
    if !value.is_finite() {
        return NOT_AVAILABLE.to_string();
    }
    format!("{:.2}%", value.max(0.0))
}

/// Format a USD amount with K/M/B suffixes
pub fn format_usd(value: f64) -> String {
    if !value.is_finite() {
        return NOT_AVAILABLE.to_string();
    }
    let value = value.max(0.0);
    if value >= 1e9 {
        format!("${:.2}B", value / 1e9)
    } else if value >= 1e6 {
        format!("${:.2}M", value / 1e6)
    } else if value >= 1e3 {
        format!("${:.1}K", value / 1e3)
    } else {
        format!("${:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(5.05), "5.05%");
        assert_eq!(format_percent(-1.0), "0.00%");
        assert_eq!(format_percent(f64::NAN), "N/A");
        assert_eq!(format_percent(f64::INFINITY), "N/A");
    }

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(650_000_000.0), "$650.00M");
        assert_eq!(format_usd(1_012_000_000.0), "$1.01B");
        assert_eq!(format_usd(95_000.0), "$95.0K");
        assert_eq!(format_usd(12.5), "$12.50");
        assert_eq!(format_usd(f64::NAN), "N/A");
    }

    #[test]
    fn test_opportunity_id() {
        let id = YieldOpportunity::id_for(Protocol::Pangolin, Category::YieldFarming, "AVAX/USDC");
        assert_eq!(id, "pangolin-yield-farming-avax-usdc");
    }
}
