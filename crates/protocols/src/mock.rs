//! In-memory chain reader for tests and offline runs

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use yield_core::{FetchError, FetchResult};

use crate::chain::ChainReader;

/// Canned return data keyed by contract and function selector.
/// Unregistered calls revert.
#[derive(Debug, Default)]
pub struct MockChain {
    returns: Mutex<HashMap<(Address, [u8; 4]), FetchResult<Vec<u8>>>>,
    calls: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a single uint256 for `C` on `to`
    pub fn set_uint<C: SolCall>(&self, to: Address, value: U256) -> &Self {
        self.returns
            .lock()
            .insert((to, C::SELECTOR), Ok(value.to_be_bytes::<32>().to_vec()));
        self
    }

    /// Return `value * 10^decimals` for `C` on `to`
    pub fn set_amount<C: SolCall>(&self, to: Address, value: f64, decimals: u8) -> &Self {
        let scaled = value * 10f64.powi(decimals as i32);
        self.set_uint::<C>(to, U256::from(scaled as u128))
    }

    /// Make `C` on `to` fail
    pub fn fail<C: SolCall>(&self, to: Address, error: FetchError) -> &Self {
        self.returns.lock().insert((to, C::SELECTOR), Err(error));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn call(&self, to: Address, calldata: Vec<u8>) -> FetchResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let selector: [u8; 4] = calldata
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| FetchError::Rpc("calldata shorter than a selector".to_string()))?;

        self.returns
            .lock()
            .get(&(to, selector))
            .cloned()
            .unwrap_or_else(|| Err(FetchError::Rpc("execution reverted".to_string())))
    }
}
