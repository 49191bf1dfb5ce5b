//! Reference TVL from an external aggregator

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use yield_core::{FetchError, FetchResult, Protocol};
use yield_price_feed::HttpFetch;

/// Independent TVL figure used to sanity-check our own numbers
#[async_trait]
pub trait ReferenceTvl: Send + Sync {
    async fn protocol_tvl(&self, protocol: Protocol) -> FetchResult<f64>;
}

/// DeFiLlama `/tvl/{slug}` client
pub struct DefiLlamaClient {
    http: Arc<dyn HttpFetch>,
    base_url: String,
}

impl DefiLlamaClient {
    pub fn new(http: Arc<dyn HttpFetch>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ReferenceTvl for DefiLlamaClient {
    async fn protocol_tvl(&self, protocol: Protocol) -> FetchResult<f64> {
        let url = format!("{}/tvl/{}", self.base_url, protocol.defillama_slug());
        let body = self.http.get_json(&url).await?;

        let tvl = body
            .as_f64()
            .ok_or_else(|| FetchError::Decode(format!("expected a number from {}", url)))?;
        if !tvl.is_finite() || tvl < 0.0 {
            return Err(FetchError::Implausible { field: "reference_tvl", value: tvl });
        }

        debug!(protocol = %protocol, tvl, "Reference TVL");
        Ok(tvl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use yield_price_feed::MockHttp;

    #[tokio::test]
    async fn test_reads_plain_number() {
        let http = Arc::new(MockHttp::new());
        http.respond("https://llama.test/tvl/gogopool", json!(361_500_000.0));
        let client = DefiLlamaClient::new(http, "https://llama.test/");

        let tvl = client.protocol_tvl(Protocol::GoGoPool).await.unwrap();
        assert_eq!(tvl, 361_500_000.0);
    }

    #[tokio::test]
    async fn test_rejects_non_numeric() {
        let http = Arc::new(MockHttp::new());
        http.respond("https://llama.test/tvl", json!({ "message": "not found" }));
        let client = DefiLlamaClient::new(http, "https://llama.test");

        let err = client.protocol_tvl(Protocol::Silo).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }
}
