//! Avant: savUSD staked stablecoin vault

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use yield_core::tokens;
use yield_core::{
    AvantConfig, DataSource, FetchError, FetchResult, ProductSnapshot, Protocol, ProtocolSnapshot,
    Rate, SourceKind, StakingPool,
};
use yield_price_feed::{decode_json, price_or};
use yield_quality::{validate_apy, validate_tvl};

use crate::chain::read_vault;
use crate::decimal::flexible_f64;
use crate::fallback::{or_fallback_amount, resolve};
use crate::rate_history::RateHistory;
use crate::{Clients, ProtocolFetcher};

const SAVUSD_HISTORY_KEY: &str = "avant:savusd";

#[derive(Debug, Deserialize)]
struct StatsResponse {
    /// Percent
    #[serde(default, deserialize_with = "flexible_f64")]
    apy: Option<f64>,
    /// USD
    #[serde(default, deserialize_with = "flexible_f64")]
    tvl: Option<f64>,
}

pub struct AvantFetcher {
    config: AvantConfig,
    clients: Clients,
    history: Arc<RateHistory>,
}

impl AvantFetcher {
    pub fn new(config: AvantConfig, clients: Clients, history: Arc<RateHistory>) -> Self {
        Self {
            config,
            clients,
            history,
        }
    }

    async fn fetch_stats(&self) -> FetchResult<StatsResponse> {
        let body = self.clients.http.get_json(&self.config.api_url).await?;
        decode_json(body)
    }
}

#[async_trait]
impl ProtocolFetcher for AvantFetcher {
    fn protocol(&self) -> Protocol {
        Protocol::Avant
    }

    async fn fetch_data(&self) -> FetchResult<ProtocolSnapshot> {
        let chain = self.clients.chain.as_ref();
        let ((share_price, total_assets), stats, prices) = tokio::join!(
            read_vault(chain, self.config.savusd, tokens::decimals_of("avUSD")),
            self.fetch_stats(),
            self.clients.prices.get_token_prices(&["avusd"]),
        );
        let stats = stats
            .map_err(|e| warn!(error = %e, "Avant stats API unavailable"))
            .ok();

        let exchange_rate = or_fallback_amount(
            "avant.savusd.exchange_rate",
            share_price,
            self.config.fallback_exchange_rate,
        );
        if exchange_rate.is_live() {
            self.history.record(SAVUSD_HISTORY_KEY, exchange_rate.value);
        }
        let total_assets = or_fallback_amount(
            "avant.savusd.total_assets",
            total_assets,
            self.config.fallback_total_assets,
        );
        let avusd_price = price_or(&prices, "avusd", 1.0);

        let mut apy_sources = Vec::new();
        if let Some(apy) = stats.as_ref().and_then(|s| s.apy) {
            apy_sources.push(DataSource::new("avant-api", SourceKind::OfficialApi, apy));
        }
        if let Some(apy) = self.history.annualized_apy(SAVUSD_HISTORY_KEY) {
            apy_sources.push(DataSource::new("avant-exchange-rate", SourceKind::OnChain, apy).with_confidence(0.9));
        }
        let (apy, apy_confidence) = resolve(
            "avant.savusd.apy",
            &validate_apy(&apy_sources),
            self.config.fallback_apy,
        );

        let mut tvl_sources = Vec::new();
        if total_assets.is_live() {
            tvl_sources.push(DataSource::new(
                "avant-total-assets",
                SourceKind::OnChain,
                total_assets.value * avusd_price,
            ));
        }
        if let Some(tvl) = stats.as_ref().and_then(|s| s.tvl) {
            tvl_sources.push(DataSource::new("avant-api", SourceKind::OfficialApi, tvl));
        }
        let (tvl, tvl_confidence) = resolve(
            "avant.savusd.tvl",
            &validate_tvl(&tvl_sources),
            self.config.fallback_total_assets * avusd_price,
        );

        let pool = StakingPool {
            token: "savUSD".to_string(),
            underlying: "avUSD".to_string(),
            rate: Rate::apy(apy.value),
            tvl_usd: tvl.value,
            exchange_rate: exchange_rate.value,
            total_staked: total_assets.value,
            confidence: apy_confidence.min(tvl_confidence),
            live: apy.is_live() && tvl.is_live(),
        };

        if !self.config.allow_fallback && !pool.live {
            return Err(FetchError::AllSourcesFailed(Protocol::Avant));
        }

        Ok(ProtocolSnapshot::new(
            Protocol::Avant,
            vec![ProductSnapshot::TokenStaking(pool)],
        ))
    }
}
