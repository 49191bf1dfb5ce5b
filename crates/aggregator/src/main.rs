//! Yield dashboard runner
//!
//! `yield-dashboard [--config <file>] [--once]`

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::signal;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use yield_aggregator::{load_settings, DashboardService, YieldAggregator};
use yield_core::DashboardConfig;
use yield_price_feed::{HttpFetch, PriceOracle, ReqwestHttp};
use yield_protocols::{build_fetchers, Clients, JsonRpcChainReader, RateHistory};
use yield_quality::{BaselineStore, DataMonitor, DefiLlamaClient, FileBaseline, MemoryBaseline};

struct Args {
    config: Option<PathBuf>,
    once: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        config: None,
        once: false,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--once" => args.once = true,
            "--config" => {
                let path = iter.next().context("--config needs a file path")?;
                args.config = Some(PathBuf::from(path));
            }
            other => bail!("unknown argument: {}", other),
        }
    }
    Ok(args)
}

fn build_service(config: &DashboardConfig) -> anyhow::Result<DashboardService> {
    let http: Arc<dyn HttpFetch> = Arc::new(ReqwestHttp::new(Duration::from_millis(
        config.rpc.request_timeout_ms,
    ))?);
    let price_http: Arc<dyn HttpFetch> = Arc::new(ReqwestHttp::new(Duration::from_millis(
        config.price.request_timeout_ms,
    ))?);

    let clients = Clients {
        chain: Arc::new(JsonRpcChainReader::new(Arc::clone(&http), config.rpc.http_url.clone())),
        http: Arc::clone(&http),
        prices: Arc::new(PriceOracle::new(price_http, config.price.clone())),
    };

    let fetchers = build_fetchers(config, &clients, Arc::new(RateHistory::new()));
    if fetchers.is_empty() {
        bail!("every protocol is disabled");
    }
    let aggregator = YieldAggregator::new(fetchers, config.refresh.fetch_timeout());

    let baseline: Arc<dyn BaselineStore> = match &config.monitor.baseline_path {
        Some(path) => Arc::new(FileBaseline::open(path)),
        None => Arc::new(MemoryBaseline::new()),
    };
    let monitor = Arc::new(DataMonitor::new(config.monitor.clone(), baseline));
    let reference = Arc::new(DefiLlamaClient::new(http, config.monitor.defillama_url.clone()));

    Ok(DashboardService::new(aggregator, monitor, config.refresh.clone()).with_reference(reference))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        }
        _ = terminate => {
            info!("Received termination signal");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting yield dashboard v{}", env!("CARGO_PKG_VERSION"));

    let args = parse_args()?;
    let config = load_settings(args.config.as_deref())?;
    let service = Arc::new(build_service(&config)?);

    if args.once {
        service.refresh().await;
        let state = service.state();
        println!("{}", serde_json::to_string_pretty(&*state)?);
        if let Some(e) = &state.error {
            bail!("refresh failed: {}", e);
        }
        return Ok(());
    }

    let watcher = {
        let mut updates = service.updates();
        tokio::spawn(async move {
            while let Some(state) = updates.next().await {
                if let Some(e) = &state.error {
                    warn!(cycle = state.cycle, error = %e, "Dashboard serving stale data");
                } else if state.cycle > 0 {
                    info!(
                        cycle = state.cycle,
                        status = ?state.status,
                        opportunities = state.opportunities.len(),
                        total_tvl = state.totals.total_tvl,
                        average_apy = state.totals.average_apy,
                        "Dashboard state"
                    );
                }
            }
        })
    };

    info!("Press Ctrl+C to shutdown");
    service.run(shutdown_signal()).await;
    watcher.abort();

    info!("Shutdown complete");
    Ok(())
}
