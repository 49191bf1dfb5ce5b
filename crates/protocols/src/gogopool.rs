//! GoGoPool: ggAVAX liquid staking and minipool validator staking

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use yield_core::tokens;
use yield_core::{
    apy_to_apr, DataSource, FetchError, FetchResult, GoGoPoolConfig, ProductSnapshot, Protocol,
    ProtocolSnapshot, Rate, SourceKind, StakingPool,
};
use yield_price_feed::{decode_json, price_or};
use yield_quality::{validate_apy, validate_tvl};

use crate::chain::read_vault;
use crate::decimal::flexible_f64;
use crate::fallback::{or_fallback_amount, resolve};
use crate::rate_history::RateHistory;
use crate::{Clients, ProtocolFetcher};

const GGAVAX_HISTORY_KEY: &str = "gogopool:ggavax";

/// AVAX bonded by the node operator of each minipool
pub const OPERATOR_STAKE_AVAX: f64 = 1_000.0;

/// GoGoPool metrics endpoint, rates in percent
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetricsResponse {
    #[serde(default, deserialize_with = "flexible_f64")]
    ggavax_apr: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    minipool_apr: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    minipool_count: Option<f64>,
}

pub struct GoGoPoolFetcher {
    config: GoGoPoolConfig,
    clients: Clients,
    history: Arc<RateHistory>,
}

impl GoGoPoolFetcher {
    pub fn new(config: GoGoPoolConfig, clients: Clients, history: Arc<RateHistory>) -> Self {
        Self {
            config,
            clients,
            history,
        }
    }

    async fn fetch_metrics(&self) -> FetchResult<MetricsResponse> {
        let body = self.clients.http.get_json(&self.config.api_url).await?;
        decode_json(body)
    }

    fn liquid_staking(
        &self,
        metrics: &FetchResult<MetricsResponse>,
        share_price: FetchResult<f64>,
        total_assets: FetchResult<f64>,
        avax_price: f64,
        ggavax_price: Option<f64>,
    ) -> StakingPool {
        let exchange_rate = or_fallback_amount(
            "gogopool.ggavax.exchange_rate",
            share_price,
            self.config.fallback_exchange_rate,
        );
        if exchange_rate.is_live() {
            self.history.record(GGAVAX_HISTORY_KEY, exchange_rate.value);
        }
        let total_assets = or_fallback_amount(
            "gogopool.ggavax.total_assets",
            total_assets,
            self.config.fallback_total_assets,
        );

        let mut apr_sources = Vec::new();
        if let Ok(MetricsResponse { ggavax_apr: Some(apr), .. }) = metrics {
            apr_sources.push(DataSource::new("gogopool-api", SourceKind::OfficialApi, *apr));
        }
        if let Some(apy) = self.history.annualized_apy(GGAVAX_HISTORY_KEY) {
            apr_sources.push(
                DataSource::new("gogopool-exchange-rate", SourceKind::OnChain, apy_to_apr(apy))
                    .with_confidence(0.9),
            );
        }
        let (apr, apr_confidence) = resolve(
            "gogopool.ggavax.apr",
            &validate_apy(&apr_sources),
            self.config.fallback_apr,
        );

        let mut tvl_sources = Vec::new();
        if total_assets.is_live() {
            tvl_sources.push(DataSource::new(
                "gogopool-total-assets",
                SourceKind::OnChain,
                total_assets.value * avax_price,
            ));
        }
        let both_live = total_assets.is_live() && exchange_rate.is_live();
        if let Some(price) = ggavax_price.filter(|_| both_live) {
            let supply = total_assets.value / exchange_rate.value.max(f64::EPSILON);
            tvl_sources.push(DataSource::new("gogopool-ggavax-market", SourceKind::PriceHeuristic, supply * price));
        }
        let (tvl, tvl_confidence) = resolve(
            "gogopool.ggavax.tvl",
            &validate_tvl(&tvl_sources),
            self.config.fallback_total_assets * avax_price,
        );

        StakingPool {
            token: "ggAVAX".to_string(),
            underlying: "AVAX".to_string(),
            rate: Rate::apr(apr.value),
            tvl_usd: tvl.value,
            exchange_rate: exchange_rate.value,
            total_staked: total_assets.value,
            confidence: apr_confidence.min(tvl_confidence),
            live: apr.is_live() && tvl.is_live(),
        }
    }

    fn validator_staking(&self, metrics: &FetchResult<MetricsResponse>, avax_price: f64) -> StakingPool {
        let (apr, minipools) = match metrics {
            Ok(m) => (m.minipool_apr, m.minipool_count),
            Err(_) => (None, None),
        };

        let apr = or_fallback_amount(
            "gogopool.minipool.apr",
            apr.ok_or(FetchError::MissingField("minipoolApr")),
            self.config.fallback_validator_apr,
        );
        let minipools = or_fallback_amount(
            "gogopool.minipool.count",
            minipools.ok_or(FetchError::MissingField("minipoolCount")),
            self.config.fallback_minipools as f64,
        );
        let staked = minipools.value.floor() * OPERATOR_STAKE_AVAX;
        let live = apr.is_live() && minipools.is_live();

        StakingPool {
            token: "minipool".to_string(),
            underlying: "AVAX".to_string(),
            rate: Rate::apr(apr.value),
            tvl_usd: staked * avax_price,
            exchange_rate: 1.0,
            total_staked: staked,
            confidence: if live {
                SourceKind::OfficialApi.default_confidence()
            } else {
                SourceKind::Fallback.default_confidence()
            },
            live,
        }
    }
}

#[async_trait]
impl ProtocolFetcher for GoGoPoolFetcher {
    fn protocol(&self) -> Protocol {
        Protocol::GoGoPool
    }

    async fn fetch_data(&self) -> FetchResult<ProtocolSnapshot> {
        let chain = self.clients.chain.as_ref();
        let ((share_price, total_assets), metrics, prices) = tokio::join!(
            read_vault(chain, self.config.ggavax, 18),
            self.fetch_metrics(),
            self.clients.prices.get_token_prices(&["avax", "ggavax"]),
        );
        if let Err(e) = &metrics {
            warn!(error = %e, "GoGoPool metrics API unavailable");
        }

        let avax_price = price_or(&prices, "avax", tokens::fallback_price("avax").unwrap_or(0.0));
        let ggavax_price = prices.get("ggavax").copied();

        let products = vec![
            ProductSnapshot::LiquidStaking(self.liquid_staking(
                &metrics,
                share_price,
                total_assets,
                avax_price,
                ggavax_price,
            )),
            ProductSnapshot::ValidatorStaking(self.validator_staking(&metrics, avax_price)),
        ];

        if !self.config.allow_fallback && !products.iter().any(|p| p.is_live()) {
            return Err(FetchError::AllSourcesFailed(Protocol::GoGoPool));
        }

        Ok(ProtocolSnapshot::new(Protocol::GoGoPool, products))
    }
}
