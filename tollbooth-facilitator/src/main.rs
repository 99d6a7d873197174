//! x402 facilitator HTTP server.
//!
//! ```bash
//! # Run with config.toml from the working directory
//! cargo run -p tollbooth-facilitator --release
//!
//! # Custom config path and log filter
//! CONFIG=/etc/tollbooth/facilitator.toml RUST_LOG=debug cargo run -p tollbooth-facilitator
//! ```
//!
//! Environment:
//!
//! - `CONFIG` — path to the TOML configuration (default `config.toml`)
//! - `HOST` / `PORT` — bind overrides
//! - `RUST_LOG` — log filter (default `info`)

use std::net::SocketAddr;
use std::sync::Arc;

use alloy_network::EthereumWallet;
use alloy_provider::ProviderBuilder;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport_http::reqwest::Url;
use axum::http::Method;
use axum::{Json, Router};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_keypair::Keypair;
use tollbooth_evm::chain::Eip155ChainReference;
use tollbooth_evm::exact::{EvmFacilitatorConfig, ExactEvmFacilitator};
use tollbooth_hypercore::exact::ExactHypercoreFacilitator;
use tollbooth_svm::exact::ExactSvmFacilitator;
use tower_http::cors;
use tracing_subscriber::EnvFilter;

use tollbooth_facilitator::config::FacilitatorConfig;
use tollbooth_facilitator::handlers::{FacilitatorState, facilitator_router};
use tollbooth_facilitator::local::LocalFacilitator;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("facilitator failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = FacilitatorConfig::load()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        evm_chains = config.evm.len(),
        solana_chains = config.solana.len(),
        hypercore = config.hypercore,
        "loaded configuration"
    );

    let mut facilitator = LocalFacilitator::new();

    let evm_config = EvmFacilitatorConfig {
        allow_undeployed: config.allow_undeployed_wallets,
        ..EvmFacilitatorConfig::default()
    };

    for (network, chain_cfg) in &config.evm {
        let chain: Eip155ChainReference = match network.parse() {
            Ok(chain) => chain,
            Err(_) => {
                tracing::warn!(network, "skipping chain: not an eip155 CAIP-2 id");
                continue;
            }
        };

        let key = chain_cfg.signer_private_key.trim();
        if key.is_empty() || key.starts_with('$') {
            tracing::warn!(network, "skipping chain: signer key not resolved");
            continue;
        }
        let signer: PrivateKeySigner = key
            .parse()
            .map_err(|e| format!("invalid signer key for {network}: {e}"))?;
        let signer_address = signer.address();

        let rpc_url: Url = chain_cfg
            .rpc_url
            .parse()
            .map_err(|e| format!("invalid RPC URL for {network}: {e}"))?;
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(rpc_url);

        tracing::info!(network, signer = %signer_address, "registered EVM exact scheme");
        facilitator.register(
            vec![network.clone()],
            Arc::new(ExactEvmFacilitator::with_config(
                provider,
                chain,
                signer_address,
                evm_config,
            )),
        );
    }

    for (network, chain_cfg) in &config.solana {
        let key = chain_cfg.fee_payer_keypair.trim();
        if key.is_empty() || key.starts_with('$') {
            tracing::warn!(network, "skipping cluster: fee payer keypair not resolved");
            continue;
        }
        let fee_payer = Keypair::from_base58_string(key);
        let rpc = RpcClient::new(chain_cfg.rpc_url.clone());

        tracing::info!(network, "registered Solana exact scheme");
        facilitator.register(
            vec![network.clone()],
            Arc::new(ExactSvmFacilitator::new(rpc, fee_payer)),
        );
    }

    if config.hypercore {
        tracing::info!("registered Hypercore exact scheme");
        facilitator.register(
            vec!["hypercore:*".into()],
            Arc::new(ExactHypercoreFacilitator::new()),
        );
    }

    let state: FacilitatorState = Arc::new(facilitator);
    let app = Router::new()
        .merge(facilitator_router(Arc::clone(&state)))
        .route("/health", axum::routing::get(health))
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(cors::Any),
        );

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("facilitator listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("facilitator shut down");
    Ok(())
}

/// Liveness endpoint.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => tracing::info!("received Ctrl-C, shutting down"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl-C");
        tracing::info!("received Ctrl-C, shutting down");
    }
}
