//! HTTP transport for REST and GraphQL endpoints

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use yield_core::{FetchError, FetchResult};

/// Read-only JSON transport
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get_json(&self, url: &str) -> FetchResult<Value>;
    async fn post_json(&self, url: &str, body: &Value) -> FetchResult<Value>;
}

/// Decode a JSON value into a typed response
pub fn decode_json<T: DeserializeOwned>(value: Value) -> FetchResult<T> {
    serde_json::from_value(value).map_err(|e| FetchError::Decode(e.to_string()))
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new(timeout: Duration) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("yield-dashboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Http(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn read(response: reqwest::Response, url: &str) -> FetchResult<Value> {
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(format!("{} returned {}", url, status)));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

fn map_err(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(0)
    } else {
        FetchError::Http(e.to_string())
    }
}

#[async_trait]
impl HttpFetch for ReqwestHttp {
    async fn get_json(&self, url: &str) -> FetchResult<Value> {
        debug!(url, "GET");
        let response = self.client.get(url).send().await.map_err(map_err)?;
        Self::read(response, url).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> FetchResult<Value> {
        debug!(url, "POST");
        let response = self.client.post(url).json(body).send().await.map_err(map_err)?;
        Self::read(response, url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        apr: f64,
    }

    #[test]
    fn test_decode_json() {
        let payload: Payload = decode_json(serde_json::json!({ "apr": 5.1 })).unwrap();
        assert_eq!(payload.apr, 5.1);

        let err = decode_json::<Payload>(serde_json::json!({ "apy": 5.1 })).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }
}
