//! Spot price oracle client
//!
//! `get_token_prices` never fails: fresh cache entries are served directly, the
//! rest are fetched in one batched request, and anything the API cannot supply
//! falls back to a stale cache entry and then to the static table. Symbols with no
//! price anywhere are left out of the result.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use yield_core::tokens::{self, FALLBACK_PRICES};
use yield_core::{FetchError, FetchResult, PriceConfig};

use crate::http::HttpFetch;
use crate::state::PriceCache;

/// Price with a default for symbols missing from a lookup result
pub fn price_or(prices: &HashMap<String, f64>, symbol: &str, default: f64) -> f64 {
    prices
        .get(&symbol.to_lowercase())
        .copied()
        .filter(|p| p.is_finite() && *p > 0.0)
        .unwrap_or(default)
}

pub struct PriceOracle {
    http: Arc<dyn HttpFetch>,
    cache: Arc<PriceCache>,
    config: PriceConfig,
    fallback: HashMap<String, f64>,
}

impl PriceOracle {
    pub fn new(http: Arc<dyn HttpFetch>, config: PriceConfig) -> Self {
        Self::with_cache(http, config, Arc::new(PriceCache::new()))
    }

    pub fn with_cache(http: Arc<dyn HttpFetch>, config: PriceConfig, cache: Arc<PriceCache>) -> Self {
        let fallback = FALLBACK_PRICES
            .iter()
            .map(|(symbol, price)| (symbol.to_string(), *price))
            .collect();

        Self {
            http,
            cache,
            config,
            fallback,
        }
    }

    /// Replace the static fallback table
    pub fn with_fallback(mut self, table: HashMap<String, f64>) -> Self {
        self.fallback = table
            .into_iter()
            .map(|(symbol, price)| (symbol.to_lowercase(), price))
            .collect();
        self
    }

    pub fn cache(&self) -> Arc<PriceCache> {
        Arc::clone(&self.cache)
    }

    /// USD prices keyed by lower-case symbol
    pub async fn get_token_prices(&self, symbols: &[&str]) -> HashMap<String, f64> {
        let ttl = self.config.ttl();
        let mut prices = HashMap::new();
        let mut missing = Vec::new();

        for symbol in symbols {
            let symbol = symbol.to_lowercase();
            if prices.contains_key(&symbol) || missing.contains(&symbol) {
                continue;
            }
            match self.cache.get_fresh(&symbol, ttl) {
                Some(price) => {
                    prices.insert(symbol, price);
                }
                None => missing.push(symbol),
            }
        }

        if missing.is_empty() {
            return prices;
        }

        let live = match self.fetch_live(&missing).await {
            Ok(live) => live,
            Err(e) => {
                warn!(error = %e, symbols = ?missing, "Price API unavailable, using fallback prices");
                HashMap::new()
            }
        };

        for symbol in missing {
            if let Some(price) = live.get(&symbol) {
                self.cache.insert(&symbol, *price);
                prices.insert(symbol, *price);
            } else if let Some(entry) = self.cache.get_any(&symbol) {
                debug!(symbol = %symbol, age = ?entry.age(), "Serving stale cached price");
                prices.insert(symbol, entry.price);
            } else if let Some(price) = self.fallback.get(&symbol) {
                prices.insert(symbol, *price);
            } else {
                debug!(symbol = %symbol, "No price available");
            }
        }

        prices
    }

    /// Single-symbol convenience lookup
    pub async fn price_of(&self, symbol: &str) -> Option<f64> {
        self.get_token_prices(&[symbol])
            .await
            .get(&symbol.to_lowercase())
            .copied()
    }

    async fn fetch_live(&self, symbols: &[String]) -> FetchResult<HashMap<String, f64>> {
        let ids: Vec<(&String, &str)> = symbols
            .iter()
            .filter_map(|s| tokens::price_id(s).map(|id| (s, id)))
            .collect();

        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let id_list: Vec<&str> = ids.iter().map(|(_, id)| *id).collect();
        let url = format!(
            "{}?ids={}&vs_currencies=usd",
            self.config.api_url,
            id_list.join(",")
        );

        let body = self.http.get_json(&url).await?;
        let object = body
            .as_object()
            .ok_or_else(|| FetchError::Decode("price response is not an object".to_string()))?;

        let mut prices = HashMap::new();
        for (symbol, id) in ids {
            let price = object.get(id).and_then(|v| v.get("usd")).and_then(Value::as_f64);
            match price {
                Some(p) if p.is_finite() && p > 0.0 => {
                    prices.insert(symbol.clone(), p);
                }
                _ => debug!(symbol = %symbol, id, "Price missing from API response"),
            }
        }

        Ok(prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHttp;
    use serde_json::json;

    const API: &str = "https://prices.test/simple/price";

    fn config(ttl_secs: u64) -> PriceConfig {
        PriceConfig {
            api_url: API.to_string(),
            ttl_secs,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_live_prices_are_cached() {
        let http = Arc::new(MockHttp::new());
        http.respond(API, json!({ "avalanche-2": { "usd": 40.0 }, "usd-coin": { "usd": 1.0 } }));
        let oracle = PriceOracle::new(http.clone(), config(30));

        let prices = oracle.get_token_prices(&["AVAX", "usdc"]).await;
        assert_eq!(prices.get("avax"), Some(&40.0));
        assert_eq!(prices.get("usdc"), Some(&1.0));
        assert_eq!(http.call_count(), 1);

        let again = oracle.get_token_prices(&["avax"]).await;
        assert_eq!(again.get("avax"), Some(&40.0));
        assert_eq!(http.call_count(), 1, "fresh entry must come from cache");
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let http = Arc::new(MockHttp::new());
        http.respond(API, json!({ "avalanche-2": { "usd": 40.0 } }));
        let oracle = PriceOracle::new(http.clone(), config(0));

        oracle.get_token_prices(&["avax"]).await;
        oracle.get_token_prices(&["avax"]).await;
        assert_eq!(http.call_count(), 2);
    }

    #[tokio::test]
    async fn test_api_failure_uses_documented_fallback() {
        let http = Arc::new(MockHttp::new());
        http.fail(API, FetchError::Http("503".to_string()));
        let oracle = PriceOracle::new(http, config(30));

        let prices = oracle.get_token_prices(&["AVAX"]).await;
        assert_eq!(prices, HashMap::from([("avax".to_string(), 42.50)]));
    }

    #[tokio::test]
    async fn test_stale_cache_preferred_over_fallback() {
        let http = Arc::new(MockHttp::new());
        http.respond(API, json!({ "avalanche-2": { "usd": 38.0 } }));
        let oracle = PriceOracle::new(http.clone(), config(0));
        oracle.get_token_prices(&["avax"]).await;

        http.clear();
        http.fail(API, FetchError::Timeout(5_000));
        let prices = oracle.get_token_prices(&["avax"]).await;
        assert_eq!(prices.get("avax"), Some(&38.0));
    }

    #[tokio::test]
    async fn test_unknown_symbols_are_omitted() {
        let http = Arc::new(MockHttp::new());
        http.fail(API, FetchError::Http("down".to_string()));
        let oracle = PriceOracle::new(http, config(30));

        let prices = oracle.get_token_prices(&["avax", "doesnotexist"]).await;
        assert!(prices.contains_key("avax"));
        assert!(!prices.contains_key("doesnotexist"));
        assert_eq!(price_or(&prices, "doesnotexist", 1.0), 1.0);
    }

    #[tokio::test]
    async fn test_partial_response_fills_from_fallback() {
        let http = Arc::new(MockHttp::new());
        http.respond(API, json!({ "avalanche-2": { "usd": 41.0 } }));
        let oracle = PriceOracle::new(http, config(30));

        let prices = oracle.get_token_prices(&["avax", "ggp"]).await;
        assert_eq!(prices.get("avax"), Some(&41.0));
        assert_eq!(prices.get("ggp"), Some(&8.50));
    }
}
