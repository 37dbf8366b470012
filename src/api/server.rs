//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request timeout)
//! - Bind server to listener
//! - Graceful shutdown via the lifecycle broadcast

use axum::routing::{delete, get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::api::handlers;
use crate::blockchain::BlockchainClient;
use crate::config::ListenerConfig;
use crate::oracle::RateOracle;
use crate::settlement::DecisionProcessor;
use crate::wallet::WalletValidator;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<DecisionProcessor>,
    pub oracle: Arc<RateOracle>,
    pub wallets: Arc<WalletValidator>,
    /// Present only when blockchain integration is enabled.
    pub chain: Option<BlockchainClient>,
}

/// HTTP server for the settlement API.
pub struct ApiServer {
    router: Router,
    config: ListenerConfig,
}

impl ApiServer {
    /// Create a new API server over the assembled core.
    pub fn new(state: AppState, config: ListenerConfig) -> Self {
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ListenerConfig, state: AppState) -> Router {
        Router::new()
            .route("/api/decisions", post(handlers::process_decision))
            .route("/api/wallets", post(handlers::register_wallet))
            .route("/api/wallets/{account_id}", delete(handlers::remove_wallet))
            .route("/api/rate", get(handlers::current_rate))
            .route("/health", get(handlers::health))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.request_timeout_secs,
            )))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener until the
    /// shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "Settlement API starting"
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("Settlement API stopped");
        Ok(())
    }

    /// Get a reference to the listener config.
    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }
}
