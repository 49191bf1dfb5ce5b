//! Concurrent fan-out over protocol fetchers

use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use yield_core::{
    AggregatedData, AggregatorError, AggregatorResult, FetchError, FetchResult, Protocol,
    ProtocolSnapshot,
};
use yield_protocols::ProtocolFetcher;

/// Outcome of one protocol fetch within a cycle
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub protocol: Protocol,
    pub elapsed: Duration,
    pub result: FetchResult<ProtocolSnapshot>,
}

pub struct YieldAggregator {
    fetchers: Vec<Arc<dyn ProtocolFetcher>>,
    fetch_timeout: Duration,
}

impl YieldAggregator {
    pub fn new(fetchers: Vec<Arc<dyn ProtocolFetcher>>, fetch_timeout: Duration) -> Self {
        Self {
            fetchers,
            fetch_timeout,
        }
    }

    pub fn protocols(&self) -> Vec<Protocol> {
        self.fetchers.iter().map(|f| f.protocol()).collect()
    }

    /// Run every fetcher concurrently, each bounded by the fetch timeout
    pub async fn fetch_each(&self) -> Vec<FetchOutcome> {
        join_all(self.fetchers.iter().map(|fetcher| {
            let fetcher = Arc::clone(fetcher);
            let timeout = self.fetch_timeout;
            async move {
                let protocol = fetcher.protocol();
                let start = Instant::now();
                let result = match tokio::time::timeout(timeout, fetcher.fetch_data()).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout(timeout.as_millis() as u64)),
                };
                FetchOutcome {
                    protocol,
                    elapsed: start.elapsed(),
                    result,
                }
            }
        }))
        .await
    }

    /// Snapshot of every protocol that fetched successfully.
    ///
    /// Failed protocols are left out. Errors only when nothing succeeded.
    pub async fn fetch_all_protocol_data(&self) -> AggregatorResult<AggregatedData> {
        if self.fetchers.is_empty() {
            return Err(AggregatorError::NoFetchers);
        }

        let outcomes = self.fetch_each().await;
        let attempted = outcomes.len();
        let mut snapshots = Vec::with_capacity(attempted);

        for outcome in outcomes {
            match outcome.result {
                Ok(snapshot) => {
                    debug!(
                        protocol = %outcome.protocol,
                        products = snapshot.products.len(),
                        live = snapshot.has_live_data(),
                        elapsed_ms = outcome.elapsed.as_millis() as u64,
                        "Protocol fetched"
                    );
                    snapshots.push(snapshot);
                }
                Err(e) => {
                    warn!(protocol = %outcome.protocol, error = %e, "Protocol fetch failed, omitting");
                }
            }
        }

        if snapshots.is_empty() {
            return Err(AggregatorError::AllProtocolsFailed { attempted });
        }

        info!(succeeded = snapshots.len(), attempted, "Aggregation complete");
        Ok(AggregatedData::new(snapshots))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use yield_core::{
        FetchError, FetchResult, ProductSnapshot, Protocol, ProtocolSnapshot, Rate, StakingPool,
    };
    use yield_protocols::ProtocolFetcher;

    pub fn staking(token: &str, apy: f64, tvl: f64) -> ProductSnapshot {
        ProductSnapshot::LiquidStaking(StakingPool {
            token: token.to_string(),
            underlying: "AVAX".to_string(),
            rate: Rate::apy(apy),
            tvl_usd: tvl,
            exchange_rate: 1.1,
            total_staked: tvl / 40.0,
            confidence: 0.9,
            live: true,
        })
    }

    /// Fetcher with scripted behaviour
    pub struct StubFetcher {
        pub protocol: Protocol,
        pub products: Vec<ProductSnapshot>,
        pub fail: AtomicBool,
        pub delay: Duration,
        pub calls: AtomicUsize,
    }

    impl StubFetcher {
        pub fn ok(protocol: Protocol, products: Vec<ProductSnapshot>) -> Self {
            Self {
                protocol,
                products,
                fail: AtomicBool::new(false),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing(protocol: Protocol) -> Self {
            let stub = Self::ok(protocol, vec![]);
            stub.set_failing(true);
            stub
        }

        pub fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProtocolFetcher for StubFetcher {
        fn protocol(&self) -> Protocol {
            self.protocol
        }

        async fn fetch_data(&self) -> FetchResult<ProtocolSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(FetchError::AllSourcesFailed(self.protocol));
            }
            Ok(ProtocolSnapshot::new(self.protocol, self.products.clone()))
        }
    }
}
