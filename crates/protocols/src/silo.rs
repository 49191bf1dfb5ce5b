//! Silo isolated lending markets

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use yield_core::tokens::display_symbol;
use yield_core::{
    sanitize_amount, FetchError, FetchResult, LendingMarket, ProductSnapshot, Protocol,
    ProtocolSnapshot, SiloConfig, SourceKind,
};
use yield_price_feed::decode_json;

use crate::decimal::flexible_f64;
use crate::{Clients, ProtocolFetcher};

const SILO_API_CONFIDENCE: f64 = 0.85;

/// (market, asset, supply APY %, borrow APY %, TVL USD, borrowed USD)
const FALLBACK_MARKETS: &[(&str, &str, f64, f64, f64, f64)] = &[
    ("sAVAX/USDC", "USDC", 8.2, 11.4, 12_500_000.0, 8_900_000.0),
    ("sAVAX/USDC", "sAVAX", 0.4, 2.1, 18_000_000.0, 2_300_000.0),
    ("ggAVAX/AVAX", "AVAX", 3.1, 5.6, 6_400_000.0, 3_500_000.0),
    ("BTC.b/USDC", "BTC.b", 0.2, 1.8, 4_100_000.0, 400_000.0),
];

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MarketsPayload {
    List(Vec<MarketRow>),
    Wrapped { markets: Vec<MarketRow> },
}

impl MarketsPayload {
    fn into_rows(self) -> Vec<MarketRow> {
        match self {
            MarketsPayload::List(rows) | MarketsPayload::Wrapped { markets: rows } => rows,
        }
    }
}

/// APYs are fractions, e.g. 0.082
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketRow {
    name: String,
    asset: String,
    #[serde(default, deserialize_with = "flexible_f64")]
    supply_apy: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    borrow_apy: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    tvl_usd: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    borrowed_usd: Option<f64>,
}

#[allow(clippy::too_many_arguments)]
fn market(
    name: &str,
    asset: &str,
    supply_apy: f64,
    borrow_apy: f64,
    tvl_usd: f64,
    borrowed_usd: f64,
    confidence: f64,
    live: bool,
) -> LendingMarket {
    let tvl_usd = sanitize_amount(tvl_usd);
    let borrowed_usd = sanitize_amount(borrowed_usd).min(tvl_usd);
    let utilization = if tvl_usd > 0.0 {
        borrowed_usd / tvl_usd * 100.0
    } else {
        0.0
    };

    LendingMarket {
        market: name.to_string(),
        asset: display_symbol(asset).to_string(),
        supply_apy: sanitize_amount(supply_apy),
        borrow_apy: sanitize_amount(borrow_apy),
        total_supply_usd: tvl_usd,
        total_borrows_usd: borrowed_usd,
        utilization,
        confidence,
        live,
    }
}

pub struct SiloFetcher {
    config: SiloConfig,
    clients: Clients,
}

impl SiloFetcher {
    pub fn new(config: SiloConfig, clients: Clients) -> Self {
        Self { config, clients }
    }

    async fn fetch_markets(&self) -> FetchResult<Vec<LendingMarket>> {
        let body = self.clients.http.get_json(&self.config.api_url).await?;
        let rows = decode_json::<MarketsPayload>(body)?.into_rows();
        let total = rows.len();

        let markets: Vec<LendingMarket> = rows
            .into_iter()
            .filter_map(|row| {
                let supply = row.supply_apy?;
                let tvl = row.tvl_usd.filter(|tvl| *tvl >= self.config.min_tvl_usd)?;
                Some(market(
                    &row.name,
                    &row.asset,
                    supply * 100.0,
                    row.borrow_apy.unwrap_or(0.0) * 100.0,
                    tvl,
                    row.borrowed_usd.unwrap_or(0.0),
                    SILO_API_CONFIDENCE,
                    true,
                ))
            })
            .collect();

        debug!(total, kept = markets.len(), "Silo markets decoded");
        if markets.is_empty() {
            return Err(FetchError::MissingField("markets"));
        }
        Ok(markets)
    }

    fn fallback_markets(&self) -> Vec<LendingMarket> {
        FALLBACK_MARKETS
            .iter()
            .map(|(name, asset, supply, borrow, tvl, borrowed)| {
                market(
                    name,
                    asset,
                    *supply,
                    *borrow,
                    *tvl,
                    *borrowed,
                    SourceKind::Fallback.default_confidence(),
                    false,
                )
            })
            .collect()
    }
}

#[async_trait]
impl ProtocolFetcher for SiloFetcher {
    fn protocol(&self) -> Protocol {
        Protocol::Silo
    }

    async fn fetch_data(&self) -> FetchResult<ProtocolSnapshot> {
        let markets = match self.fetch_markets().await {
            Ok(markets) => markets,
            Err(e) if self.config.allow_fallback => {
                warn!(error = %e, "Silo API unavailable, using fallback markets");
                self.fallback_markets()
            }
            Err(e) => {
                warn!(error = %e, "Silo API unavailable");
                return Err(FetchError::AllSourcesFailed(Protocol::Silo));
            }
        };

        Ok(ProtocolSnapshot::new(
            Protocol::Silo,
            markets.into_iter().map(ProductSnapshot::Lending).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChain;
    use crate::testing;
    use serde_json::json;
    use std::sync::Arc;
    use yield_price_feed::MockHttp;

    const API: &str = "https://silo.test/api/markets";

    fn fetcher(http: Arc<MockHttp>) -> SiloFetcher {
        let config = SiloConfig {
            api_url: API.to_string(),
            ..Default::default()
        };
        SiloFetcher::new(config, testing::clients(Arc::new(MockChain::new()), http))
    }

    fn markets(snapshot: &ProtocolSnapshot) -> Vec<&LendingMarket> {
        snapshot
            .products
            .iter()
            .filter_map(|p| match p {
                ProductSnapshot::Lending(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_wrapped_payload() {
        let http = Arc::new(MockHttp::new());
        http.respond(
            API,
            json!({ "markets": [
                { "name": "sAVAX/USDC", "asset": "USDC", "supplyApy": "0.082", "borrowApy": 0.114,
                  "tvlUsd": 12000000, "borrowedUsd": "9000000" },
                { "name": "tiny", "asset": "WAVAX", "supplyApy": 0.5, "tvlUsd": 500 },
                { "name": "no-rate", "asset": "USDC", "tvlUsd": 1000000 },
            ] }),
        );

        let snapshot = fetcher(http).fetch_data().await.unwrap();
        let markets = markets(&snapshot);

        assert_eq!(markets.len(), 1);
        let m = markets[0];
        assert!((m.supply_apy - 8.2).abs() < 1e-9);
        assert!((m.borrow_apy - 11.4).abs() < 1e-9);
        assert!((m.utilization - 75.0).abs() < 1e-9);
        assert_eq!(m.confidence, 0.85);
        assert!(m.live);
    }

    #[tokio::test]
    async fn test_bare_list_payload() {
        let http = Arc::new(MockHttp::new());
        http.respond(
            API,
            json!([{ "name": "ggAVAX/AVAX", "asset": "WAVAX", "supplyApy": 0.03, "tvlUsd": "6400000" }]),
        );

        let snapshot = fetcher(http).fetch_data().await.unwrap();
        let markets = markets(&snapshot);
        assert_eq!(markets[0].asset, "AVAX");
        assert_eq!(markets[0].utilization, 0.0);
    }

    #[tokio::test]
    async fn test_api_down_uses_fallback_table() {
        let http = Arc::new(MockHttp::new());
        http.fail(API, FetchError::Timeout(0));

        let snapshot = fetcher(http).fetch_data().await.unwrap();
        let markets = markets(&snapshot);

        assert_eq!(markets.len(), FALLBACK_MARKETS.len());
        assert!(markets.iter().all(|m| !m.live && m.confidence == 0.3));
        assert!(!snapshot.has_live_data());
    }
}
