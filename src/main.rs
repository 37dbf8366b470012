//! Settlement service binary.
//!
//! Startup order: config → logging → metrics → core wiring → listener.
//! The payout signing key is read from the environment only; it never
//! appears in the config file or the logs.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use settlement_core::api::{ApiServer, AppState};
use settlement_core::blockchain::{
    BlockchainClient, ChainPayoutExecutor, DisabledExecutor, PayoutExecutor, PayoutSigner,
};
use settlement_core::config::{load_config, SettlementConfig};
use settlement_core::lifecycle::{signals, Shutdown};
use settlement_core::observability::{logging, metrics};
use settlement_core::oracle::{HttpPriceFeed, RateOracle};
use settlement_core::settlement::DecisionProcessor;
use settlement_core::store::MemoryStore;
use settlement_core::wallet::WalletValidator;

#[derive(Parser)]
#[command(name = "settlement-core")]
#[command(about = "Marketplace settlement service", long_about = None)]
struct Cli {
    /// Path to the TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => SettlementConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        chain_enabled = config.blockchain.enabled,
        currency = %config.payout.currency_code,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    // Core wiring
    let store = Arc::new(MemoryStore::new());
    let feed = Arc::new(HttpPriceFeed::new(
        config.oracle.feed_url.clone(),
        config.oracle.asset_id.clone(),
        config.oracle.currency.clone(),
        Duration::from_secs(config.oracle.feed_timeout_secs),
    ));
    let oracle = Arc::new(RateOracle::new(
        feed,
        Duration::from_secs(config.oracle.cache_ttl_secs),
        config.oracle.fallback_rate,
    ));
    let wallets = Arc::new(WalletValidator::new(store.clone()));

    let (executor, chain): (Arc<dyn PayoutExecutor>, Option<BlockchainClient>) =
        if config.blockchain.enabled {
            let signer = PayoutSigner::from_env(config.blockchain.chain_id)?;
            tracing::info!(
                sender = %signer.address(),
                chain_id = config.blockchain.chain_id,
                "Payout signer loaded"
            );
            let executor = ChainPayoutExecutor::new(config.blockchain.clone(), signer).await?;
            let chain = executor.client().clone();
            (Arc::new(executor), Some(chain))
        } else {
            tracing::warn!("Blockchain integration disabled; crypto payouts will be rejected");
            (Arc::new(DisabledExecutor), None)
        };

    let processor = Arc::new(DecisionProcessor::new(
        store,
        oracle.clone(),
        executor,
        config.payout.clone(),
    ));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    let server = ApiServer::new(
        AppState {
            processor,
            oracle,
            wallets,
            chain,
        },
        config.listener.clone(),
    );
    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
