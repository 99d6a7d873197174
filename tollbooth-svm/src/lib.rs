//! Solana support for the x402 payment protocol.
//!
//! Implements the `exact` scheme over SPL Token transfers: the payer builds
//! and partially signs a `transfer_checked` transaction whose fee payer is
//! nominated by the facilitator; the facilitator validates it, co-signs as
//! fee payer, and submits it.
//!
//! - [`exact::ExactSvmClient`] — builds and signs transfer transactions
//! - [`exact::ExactSvmServer`] — parses prices, nominates the fee payer
//! - [`exact::ExactSvmFacilitator`] — validates, co-signs, and submits

pub mod chain;
pub mod exact;
pub mod networks;
pub mod rpc;

pub use chain::SvmAddress;
pub use networks::{SOLANA_NETWORKS, SvmAssetInfo, SvmNetworkConfig, known_networks};
pub use rpc::SvmRpc;
