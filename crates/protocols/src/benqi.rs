//! BENQI: sAVAX liquid staking and Compound-style lending markets

use alloy_primitives::Address;
use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use yield_core::tokens;
use yield_core::{
    one_share, rate_per_second_to_apy, BenqiConfig, DataSource, FetchError, FetchResult,
    LendingMarket, LendingMarketConfig, ProductSnapshot, Protocol, ProtocolSnapshot, Rate,
    SourceKind, StakingPool, TokenAmount,
};
use yield_price_feed::{decode_json, price_or};
use yield_quality::{validate_apy, validate_tvl};

use crate::chain::{read_call, IQiToken, IStakedAvax};
use crate::decimal::flexible_f64;
use crate::fallback::{or_fallback_amount, resolve};
use crate::rate_history::RateHistory;
use crate::{Clients, ProtocolFetcher};

const SAVAX_HISTORY_KEY: &str = "benqi:savax";

/// Partial-read confidence for a lending market
const PARTIAL_MARKET_CONFIDENCE: f64 = 0.6;

#[derive(Debug, Deserialize)]
struct StakingAprResponse {
    /// Fraction, e.g. 0.0505
    #[serde(default, deserialize_with = "flexible_f64")]
    apr: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    apy: Option<f64>,
}

pub struct BenqiFetcher {
    config: BenqiConfig,
    clients: Clients,
    history: Arc<RateHistory>,
}

impl BenqiFetcher {
    pub fn new(config: BenqiConfig, clients: Clients, history: Arc<RateHistory>) -> Self {
        Self {
            config,
            clients,
            history,
        }
    }

    async fn fetch_api_apy(&self) -> FetchResult<f64> {
        let body = self.clients.http.get_json(&self.config.staking_api_url).await?;
        let response: StakingAprResponse = decode_json(body)?;
        response
            .apy
            .or(response.apr)
            .map(|fraction| fraction * 100.0)
            .ok_or(FetchError::MissingField("apr"))
    }

    async fn fetch_liquid_staking(&self, prices: &HashMap<String, f64>) -> StakingPool {
        let chain = self.clients.chain.as_ref();
        let savax = self.config.savax;

        let (share_price, pooled, supply, api_apy) = tokio::join!(
            read_call(chain, savax, IStakedAvax::getPooledAvaxBySharesCall { shareAmount: one_share() }),
            read_call(chain, savax, IStakedAvax::totalPooledAvaxCall {}),
            read_call(chain, savax, IStakedAvax::totalSupplyCall {}),
            self.fetch_api_apy(),
        );

        let exchange_rate = or_fallback_amount(
            "benqi.savax.exchange_rate",
            share_price.map(|r| TokenAmount::new(r.amount, 18).to_human()),
            self.config.fallback_exchange_rate,
        );
        if exchange_rate.is_live() {
            self.history.record(SAVAX_HISTORY_KEY, exchange_rate.value);
        }

        let pooled = or_fallback_amount(
            "benqi.savax.total_pooled",
            pooled.map(|r| TokenAmount::new(r.total, 18).to_human()),
            self.config.fallback_total_pooled_avax,
        );

        let mut apy_sources = Vec::new();
        if let Some(apy) = self.history.annualized_apy(SAVAX_HISTORY_KEY) {
            apy_sources.push(DataSource::new("benqi-exchange-rate", SourceKind::OnChain, apy).with_confidence(0.9));
        }
        match api_apy {
            Ok(apy) => apy_sources.push(DataSource::new("benqi-api", SourceKind::OfficialApi, apy)),
            Err(e) => warn!(error = %e, "BENQI staking API unavailable"),
        }
        let (apy, apy_confidence) = resolve(
            "benqi.savax.apy",
            &validate_apy(&apy_sources),
            self.config.fallback_apy,
        );

        let avax_price = price_or(prices, "avax", tokens::fallback_price("avax").unwrap_or(0.0));
        let mut tvl_sources = Vec::new();
        if pooled.is_live() {
            tvl_sources.push(DataSource::new("benqi-pooled-avax", SourceKind::OnChain, pooled.value * avax_price));
        }
        if let (Ok(supply), Some(savax_price)) = (&supply, prices.get("savax")) {
            let supply = TokenAmount::new(supply.supply, 18).to_human();
            tvl_sources.push(DataSource::new("benqi-savax-market", SourceKind::PriceHeuristic, supply * savax_price));
        }
        let (tvl, tvl_confidence) = resolve(
            "benqi.savax.tvl",
            &validate_tvl(&tvl_sources),
            self.config.fallback_total_pooled_avax * avax_price,
        );

        StakingPool {
            token: "sAVAX".to_string(),
            underlying: "AVAX".to_string(),
            rate: Rate::apy(apy.value),
            tvl_usd: tvl.value,
            exchange_rate: exchange_rate.value,
            total_staked: pooled.value,
            confidence: apy_confidence.min(tvl_confidence),
            live: apy.is_live() && tvl.is_live(),
        }
    }

    async fn fetch_market(&self, market: &LendingMarketConfig, price: f64) -> LendingMarket {
        let chain = self.clients.chain.as_ref();
        let qi: Address = market.qi_token;
        let decimals = tokens::decimals_of(&market.symbol);

        let (supply_rate, borrow_rate, cash, borrows) = tokio::join!(
            read_call(chain, qi, IQiToken::supplyRatePerTimestampCall {}),
            read_call(chain, qi, IQiToken::borrowRatePerTimestampCall {}),
            read_call(chain, qi, IQiToken::getCashCall {}),
            read_call(chain, qi, IQiToken::totalBorrowsCall {}),
        );

        let supply_apy = or_fallback_amount(
            "benqi.market.supply_apy",
            supply_rate.map(|r| rate_per_second_to_apy(r.rate)),
            market.fallback_supply_apy,
        );
        let borrow_apy = or_fallback_amount(
            "benqi.market.borrow_apy",
            borrow_rate.map(|r| rate_per_second_to_apy(r.rate)),
            market.fallback_borrow_apy,
        );

        // Utilization implied by the fallback rates: supply ~= borrow * utilization
        let fallback_utilization = if market.fallback_borrow_apy > 0.0 {
            (market.fallback_supply_apy / market.fallback_borrow_apy).clamp(0.0, 0.95)
        } else {
            0.0
        };
        let cash = or_fallback_amount(
            "benqi.market.cash",
            cash.map(|r| TokenAmount::new(r.cash, decimals).to_human()),
            market.fallback_total_underlying * (1.0 - fallback_utilization),
        );
        let borrows = or_fallback_amount(
            "benqi.market.borrows",
            borrows.map(|r| TokenAmount::new(r.borrows, decimals).to_human()),
            market.fallback_total_underlying * fallback_utilization,
        );

        let live_reads = [supply_apy.is_live(), borrow_apy.is_live(), cash.is_live(), borrows.is_live()]
            .iter()
            .filter(|live| **live)
            .count();
        let confidence = match live_reads {
            4 => SourceKind::OnChain.default_confidence(),
            0 => SourceKind::Fallback.default_confidence(),
            _ => PARTIAL_MARKET_CONFIDENCE,
        };

        debug!(market = %market.symbol, live_reads, "BENQI market read");

        LendingMarket {
            market: market.symbol.clone(),
            asset: market.symbol.clone(),
            supply_apy: supply_apy.value,
            borrow_apy: borrow_apy.value,
            total_supply_usd: (cash.value + borrows.value) * price,
            total_borrows_usd: borrows.value * price,
            utilization: LendingMarket::utilization_of(cash.value, borrows.value),
            confidence,
            live: live_reads == 4,
        }
    }
}

#[async_trait]
impl ProtocolFetcher for BenqiFetcher {
    fn protocol(&self) -> Protocol {
        Protocol::Benqi
    }

    async fn fetch_data(&self) -> FetchResult<ProtocolSnapshot> {
        let mut symbols = vec!["avax", "savax"];
        symbols.extend(self.config.markets.iter().map(|m| m.symbol.as_str()));
        let prices = self.clients.prices.get_token_prices(&symbols).await;

        let markets = join_all(self.config.markets.iter().map(|market| {
            let fallback = tokens::fallback_price(&market.symbol).unwrap_or(0.0);
            let price = price_or(&prices, &market.symbol, fallback);
            self.fetch_market(market, price)
        }));
        let (staking, markets) = tokio::join!(self.fetch_liquid_staking(&prices), markets);

        let mut products = vec![ProductSnapshot::LiquidStaking(staking)];
        products.extend(markets.into_iter().map(ProductSnapshot::Lending));

        if !self.config.allow_fallback && !products.iter().any(|p| p.is_live()) {
            return Err(FetchError::AllSourcesFailed(Protocol::Benqi));
        }

        Ok(ProtocolSnapshot::new(Protocol::Benqi, products))
    }
}
