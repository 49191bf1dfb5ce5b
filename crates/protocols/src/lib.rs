//! Per-protocol data fetchers
//!
//! Features:
//! - One fetcher per protocol, each producing a normalized `ProtocolSnapshot`
//! - Concurrent sub-reads against chain, REST and subgraph sources
//! - Declared fallback constant per field instead of failing the whole fetch
//! - Share-price history for API-independent APY estimates

pub mod chain;
pub mod fallback;
pub mod rate_history;
pub mod decimal;
pub mod mock;

pub mod benqi;
pub mod gogopool;
pub mod avant;
pub mod pangolin;
pub mod silo;

use async_trait::async_trait;
use std::sync::Arc;

use yield_core::{DashboardConfig, FetchResult, Protocol, ProtocolSnapshot};
use yield_price_feed::{HttpFetch, PriceOracle};

pub use chain::{read_call, read_vault, ChainReader, JsonRpcChainReader};
pub use fallback::{or_fallback, or_fallback_amount, Origin, Sourced};
pub use rate_history::RateHistory;
pub use mock::MockChain;

pub use benqi::BenqiFetcher;
pub use gogopool::GoGoPoolFetcher;
pub use avant::AvantFetcher;
pub use pangolin::PangolinFetcher;
pub use silo::SiloFetcher;

/// Source of one protocol's snapshot
#[async_trait]
pub trait ProtocolFetcher: Send + Sync {
    fn protocol(&self) -> Protocol;
    async fn fetch_data(&self) -> FetchResult<ProtocolSnapshot>;
}

/// Shared I/O handles passed to every fetcher
#[derive(Clone)]
pub struct Clients {
    pub chain: Arc<dyn ChainReader>,
    pub http: Arc<dyn HttpFetch>,
    pub prices: Arc<PriceOracle>,
}

/// Build the fetchers enabled in `config`, sharing one rate history
pub fn build_fetchers(
    config: &DashboardConfig,
    clients: &Clients,
    history: Arc<RateHistory>,
) -> Vec<Arc<dyn ProtocolFetcher>> {
    let protocols = &config.protocols;
    let mut fetchers: Vec<Arc<dyn ProtocolFetcher>> = Vec::new();

    if protocols.benqi.enabled {
        fetchers.push(Arc::new(BenqiFetcher::new(
            protocols.benqi.clone(),
            clients.clone(),
            Arc::clone(&history),
        )));
    }
    if protocols.gogopool.enabled {
        fetchers.push(Arc::new(GoGoPoolFetcher::new(
            protocols.gogopool.clone(),
            clients.clone(),
            Arc::clone(&history),
        )));
    }
    if protocols.avant.enabled {
        fetchers.push(Arc::new(AvantFetcher::new(
            protocols.avant.clone(),
            clients.clone(),
            Arc::clone(&history),
        )));
    }
    if protocols.pangolin.enabled {
        fetchers.push(Arc::new(PangolinFetcher::new(protocols.pangolin.clone(), clients.clone())));
    }
    if protocols.silo.enabled {
        fetchers.push(Arc::new(SiloFetcher::new(protocols.silo.clone(), clients.clone())));
    }

    fetchers
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use yield_core::{FetchError, PriceConfig};
    use yield_price_feed::MockHttp;

    pub const PRICE_API: &str = "https://prices.test/simple/price";

    /// Clients whose price API is down, so prices come from the static table
    pub fn clients(chain: Arc<MockChain>, http: Arc<MockHttp>) -> Clients {
        http.fail(PRICE_API, FetchError::Http("offline".to_string()));
        let prices = PriceOracle::new(
            http.clone(),
            PriceConfig {
                api_url: PRICE_API.to_string(),
                ..Default::default()
            },
        );
        Clients {
            chain,
            http,
            prices: Arc::new(prices),
        }
    }
}
