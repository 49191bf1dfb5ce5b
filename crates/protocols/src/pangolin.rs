//! Pangolin DEX pairs from the exchange subgraph

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

use yield_core::tokens::display_symbol;
use yield_core::{
    sanitize_amount, DexPair, FetchError, FetchResult, PangolinConfig, ProductSnapshot, Protocol,
    ProtocolSnapshot, SourceKind,
};
use yield_price_feed::decode_json;

use crate::decimal::flexible_f64;
use crate::{Clients, ProtocolFetcher};

/// Day-data rows are requested for the last two days so the latest complete
/// day is always present
const LOOKBACK_SECS: i64 = 2 * 86_400;

const PAIR_DAY_DATAS_QUERY: &str = r#"
query topPairs($since: Int!, $first: Int!) {
  pairDayDatas(
    first: $first
    orderBy: reserveUSD
    orderDirection: desc
    where: { date_gt: $since }
  ) {
    pairAddress
    token0 { symbol }
    token1 { symbol }
    reserveUSD
    dailyVolumeUSD
  }
}
"#;

/// (pair, token0, token1, reserve USD, 24h volume USD)
const FALLBACK_PAIRS: &[(&str, &str, &str, f64, f64)] = &[
    ("0x0e0100ab771e9288e0aa97e11557e6654c3a9665", "AVAX", "USDC", 4_200_000.0, 1_100_000.0),
    ("0xe28984e1ee8d431346d32bec9ec800efb643eef4", "AVAX", "USDT", 2_100_000.0, 420_000.0),
    ("0xd7538cabbf8605bde1f4901b47b8d42c61de0367", "AVAX", "PNG", 1_600_000.0, 150_000.0),
    ("0x4797e7f8ad7d4a2c0b04b4b5b0df0fe17bd04ad8", "sAVAX", "AVAX", 900_000.0, 60_000.0),
];

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<GraphData>,
    #[serde(default)]
    errors: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphData {
    #[serde(default)]
    pair_day_datas: Vec<PairDayData>,
}

#[derive(Debug, Deserialize)]
struct TokenRef {
    symbol: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PairDayData {
    pair_address: String,
    token0: TokenRef,
    token1: TokenRef,
    #[serde(rename = "reserveUSD", default, deserialize_with = "flexible_f64")]
    reserve_usd: Option<f64>,
    #[serde(rename = "dailyVolumeUSD", default, deserialize_with = "flexible_f64")]
    daily_volume_usd: Option<f64>,
}

/// LP fee APR in percent
pub fn fee_apr(volume_24h_usd: f64, fee_rate: f64, reserve_usd: f64) -> f64 {
    if reserve_usd <= 0.0 || !reserve_usd.is_finite() {
        return 0.0;
    }
    sanitize_amount(volume_24h_usd * fee_rate * 365.0 / reserve_usd * 100.0)
}

pub struct PangolinFetcher {
    config: PangolinConfig,
    clients: Clients,
}

impl PangolinFetcher {
    pub fn new(config: PangolinConfig, clients: Clients) -> Self {
        Self { config, clients }
    }

    fn pair(&self, address: &str, token0: &str, token1: &str, reserve: f64, volume: f64, live: bool) -> DexPair {
        DexPair {
            pair_address: address.to_lowercase(),
            token0: display_symbol(token0).to_string(),
            token1: display_symbol(token1).to_string(),
            reserve_usd: reserve,
            volume_24h_usd: volume,
            fee_apr: fee_apr(volume, self.config.lp_fee_rate, reserve),
            reward_apr: None,
            confidence: if live {
                SourceKind::Subgraph.default_confidence()
            } else {
                SourceKind::Fallback.default_confidence()
            },
            live,
        }
    }

    async fn fetch_pairs(&self) -> FetchResult<Vec<DexPair>> {
        let since = Utc::now().timestamp() - LOOKBACK_SECS;
        let body = json!({
            "query": PAIR_DAY_DATAS_QUERY,
            "variables": { "since": since, "first": self.config.max_pairs * 3 },
        });

        let response: GraphResponse =
            decode_json(self.clients.http.post_json(&self.config.subgraph_url, &body).await?)?;
        if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
            return Err(FetchError::Http(format!("subgraph errors: {}", Value::from(errors))));
        }
        let rows = response
            .data
            .ok_or(FetchError::MissingField("data"))?
            .pair_day_datas;

        // Rows are ordered by reserve, so the first row per pair is the one kept
        let mut seen = HashSet::new();
        let pairs: Vec<DexPair> = rows
            .into_iter()
            .filter(|row| seen.insert(row.pair_address.to_lowercase()))
            .filter_map(|row| {
                let reserve = row.reserve_usd?;
                if reserve < self.config.min_reserve_usd {
                    return None;
                }
                let volume = row.daily_volume_usd.map(sanitize_amount).unwrap_or(0.0);
                Some(self.pair(&row.pair_address, &row.token0.symbol, &row.token1.symbol, reserve, volume, true))
            })
            .take(self.config.max_pairs)
            .collect();

        if pairs.is_empty() {
            return Err(FetchError::MissingField("pairDayDatas"));
        }
        Ok(pairs)
    }

    fn fallback_pairs(&self) -> Vec<DexPair> {
        FALLBACK_PAIRS
            .iter()
            .take(self.config.max_pairs)
            .map(|(address, t0, t1, reserve, volume)| self.pair(address, t0, t1, *reserve, *volume, false))
            .collect()
    }
}

#[async_trait]
impl ProtocolFetcher for PangolinFetcher {
    fn protocol(&self) -> Protocol {
        Protocol::Pangolin
    }

    async fn fetch_data(&self) -> FetchResult<ProtocolSnapshot> {
        let pairs = match self.fetch_pairs().await {
            Ok(pairs) => {
                debug!(count = pairs.len(), "Pangolin pairs from subgraph");
                pairs
            }
            Err(e) if self.config.allow_fallback => {
                warn!(error = %e, "Pangolin subgraph unavailable, using fallback pairs");
                self.fallback_pairs()
            }
            Err(e) => {
                warn!(error = %e, "Pangolin subgraph unavailable");
                return Err(FetchError::AllSourcesFailed(Protocol::Pangolin));
            }
        };

        Ok(ProtocolSnapshot::new(
            Protocol::Pangolin,
            pairs.into_iter().map(ProductSnapshot::DexPair).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChain;
    use crate::testing;
    use std::sync::Arc;
    use yield_price_feed::MockHttp;

    const SUBGRAPH: &str = "https://graph.test/subgraphs/name/pangolindex/exchange";

    fn config() -> PangolinConfig {
        PangolinConfig {
            subgraph_url: SUBGRAPH.to_string(),
            ..Default::default()
        }
    }

    fn row(address: &str, t0: &str, t1: &str, reserve: &str, volume: &str) -> Value {
        json!({
            "pairAddress": address,
            "token0": { "symbol": t0 },
            "token1": { "symbol": t1 },
            "reserveUSD": reserve,
            "dailyVolumeUSD": volume,
        })
    }

    fn pairs(snapshot: &ProtocolSnapshot) -> Vec<&DexPair> {
        snapshot
            .products
            .iter()
            .map(|p| match p {
                ProductSnapshot::DexPair(pair) => pair,
                other => panic!("unexpected product {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_fee_apr() {
        // 1M volume * 0.25% * 365 / 10M reserve = 9.125%
        assert!((fee_apr(1_000_000.0, 0.0025, 10_000_000.0) - 9.125).abs() < 1e-9);
        assert_eq!(fee_apr(1_000_000.0, 0.0025, 0.0), 0.0);
        assert_eq!(fee_apr(f64::NAN, 0.0025, 10.0), 0.0);
    }

    #[tokio::test]
    async fn test_subgraph_pairs() {
        let http = Arc::new(MockHttp::new());
        http.respond(
            SUBGRAPH,
            json!({ "data": { "pairDayDatas": [
                row("0xAAA", "WAVAX", "USDC", "10000000", "1000000"),
                row("0xaaa", "WAVAX", "USDC", "9000000", "800000"),
                row("0xbbb", "PNG", "WAVAX", "2000000", "100000"),
                row("0xccc", "DUST", "WAVAX", "1000", "50000"),
            ] } }),
        );

        let fetcher = PangolinFetcher::new(config(), testing::clients(Arc::new(MockChain::new()), http));
        let snapshot = fetcher.fetch_data().await.unwrap();
        let pairs = pairs(&snapshot);

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].label(), "AVAX/USDC");
        assert_eq!(pairs[0].pair_address, "0xaaa");
        assert!((pairs[0].fee_apr - 9.125).abs() < 1e-9);
        assert_eq!(pairs[1].label(), "PNG/AVAX");
        assert!(pairs.iter().all(|p| p.live && p.confidence == 0.9));
    }

    #[tokio::test]
    async fn test_graphql_errors_use_fallback_table() {
        let http = Arc::new(MockHttp::new());
        http.respond(SUBGRAPH, json!({ "errors": [{ "message": "indexer unavailable" }] }));

        let fetcher = PangolinFetcher::new(config(), testing::clients(Arc::new(MockChain::new()), http));
        let snapshot = fetcher.fetch_data().await.unwrap();
        let pairs = pairs(&snapshot);

        assert_eq!(pairs.len(), FALLBACK_PAIRS.len());
        assert!(pairs.iter().all(|p| !p.live && p.confidence == 0.3));
        assert!(pairs.iter().all(|p| p.fee_apr.is_finite()));
    }

    #[tokio::test]
    async fn test_strict_mode() {
        let cfg = PangolinConfig {
            allow_fallback: false,
            ..config()
        };
        let fetcher = PangolinFetcher::new(
            cfg,
            testing::clients(Arc::new(MockChain::new()), Arc::new(MockHttp::new())),
        );
        assert_eq!(
            fetcher.fetch_data().await.unwrap_err(),
            FetchError::AllSourcesFailed(Protocol::Pangolin)
        );
    }
}
