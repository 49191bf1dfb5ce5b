//! Read-only contract calls over JSON-RPC

use alloy_primitives::{hex, Address};
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use yield_core::{one_share, FetchError, FetchResult, TokenAmount};
use yield_price_feed::HttpFetch;

sol! {
    /// BENQI lending market (Compound-style, timestamp based)
    #[derive(Debug)]
    interface IQiToken {
        function supplyRatePerTimestamp() external view returns (uint256 rate);
        function borrowRatePerTimestamp() external view returns (uint256 rate);
        function getCash() external view returns (uint256 cash);
        function totalBorrows() external view returns (uint256 borrows);
    }

    /// BENQI liquid staked AVAX
    #[derive(Debug)]
    interface IStakedAvax {
        function getPooledAvaxByShares(uint256 shareAmount) external view returns (uint256 amount);
        function totalPooledAvax() external view returns (uint256 total);
        function totalSupply() external view returns (uint256 supply);
    }

    /// ERC-4626 tokenized vault
    #[derive(Debug)]
    interface IERC4626 {
        function convertToAssets(uint256 shares) external view returns (uint256 assets);
        function totalAssets() external view returns (uint256 assets);
    }
}

/// Read-only chain access
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Execute a view call against the latest block and return the raw return data
    async fn call(&self, to: Address, calldata: Vec<u8>) -> FetchResult<Vec<u8>>;
}

/// Encode a typed view call, execute it and decode its return values
pub async fn read_call<C>(reader: &dyn ChainReader, to: Address, call: C) -> FetchResult<C::Return>
where
    C: SolCall + Send,
{
    let output = reader.call(to, call.abi_encode()).await?;
    C::abi_decode_returns(&output, true)
        .map_err(|e| FetchError::Decode(format!("{} at {}: {}", C::SIGNATURE, to, e)))
}

/// Share price (assets per whole share) and total assets of an ERC-4626 vault,
/// both in underlying units
pub async fn read_vault(
    reader: &dyn ChainReader,
    vault: Address,
    decimals: u8,
) -> (FetchResult<f64>, FetchResult<f64>) {
    let (share_price, total_assets) = tokio::join!(
        read_call(reader, vault, IERC4626::convertToAssetsCall { shares: one_share() }),
        read_call(reader, vault, IERC4626::totalAssetsCall {}),
    );
    (
        share_price.map(|r| TokenAmount::new(r.assets, decimals).to_human()),
        total_assets.map(|r| TokenAmount::new(r.assets, decimals).to_human()),
    )
}

/// `eth_call` over HTTP JSON-RPC
pub struct JsonRpcChainReader {
    http: Arc<dyn HttpFetch>,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcChainReader {
    pub fn new(http: Arc<dyn HttpFetch>, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl ChainReader for JsonRpcChainReader {
    async fn call(&self, to: Address, calldata: Vec<u8>) -> FetchResult<Vec<u8>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "eth_call",
            "params": [
                { "to": to.to_string(), "data": format!("0x{}", hex::encode(&calldata)) },
                "latest"
            ]
        });

        let response = self.http.post_json(&self.url, &request).await?;

        if let Some(error) = response.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error");
            return Err(FetchError::Rpc(message.to_string()));
        }

        let result = response
            .get("result")
            .and_then(|r| r.as_str())
            .ok_or(FetchError::MissingField("result"))?;

        let bytes = hex::decode(result.trim_start_matches("0x"))
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        if bytes.is_empty() {
            return Err(FetchError::Rpc(format!("empty return data from {}", to)));
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use tokio_test::assert_ok;
    use yield_price_feed::MockHttp;

    const RPC: &str = "https://rpc.test/ext/bc/C/rpc";

    fn word(value: u64) -> String {
        format!("0x{}", hex::encode(U256::from(value).to_be_bytes::<32>()))
    }

    #[tokio::test]
    async fn test_decodes_uint_result() {
        let http = Arc::new(MockHttp::new());
        http.respond(RPC, json!({ "jsonrpc": "2.0", "id": 1, "result": word(42) }));
        let reader = JsonRpcChainReader::new(http, RPC);

        let result = assert_ok!(read_call(&reader, Address::ZERO, IQiToken::getCashCall {}).await);
        assert_eq!(result.cash, U256::from(42u64));
    }

    #[tokio::test]
    async fn test_rpc_error_is_reported() {
        let http = Arc::new(MockHttp::new());
        http.respond(RPC, json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": 3, "message": "execution reverted" } }));
        let reader = JsonRpcChainReader::new(http, RPC);

        let err = read_call(&reader, Address::ZERO, IERC4626::totalAssetsCall {}).await.unwrap_err();
        assert_eq!(err, FetchError::Rpc("execution reverted".to_string()));
    }

    #[tokio::test]
    async fn test_empty_return_is_an_error() {
        let http = Arc::new(MockHttp::new());
        http.respond(RPC, json!({ "jsonrpc": "2.0", "id": 1, "result": "0x" }));
        let reader = JsonRpcChainReader::new(http, RPC);

        assert!(reader.call(Address::ZERO, vec![0u8; 4]).await.is_err());
    }
}
