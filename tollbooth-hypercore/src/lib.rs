//! Hypercore (Hyperliquid) support for the x402 payment protocol.
//!
//! Implements the `exact` scheme over Hyperliquid `sendAsset` actions: the
//! payer signs a typed spot transfer of the required amount, and the
//! facilitator posts the signed action to the Hyperliquid exchange API.
//!
//! - [`exact::ExactHypercoreClient`] — builds and signs `sendAsset` actions
//! - [`exact::ExactHypercoreServer`] — parses prices, flags the target chain
//! - [`exact::ExactHypercoreFacilitator`] — verifies and submits actions

pub mod action;
pub mod exact;
pub mod networks;
pub mod signer;

pub use action::{ActionSignature, SendAssetAction};
pub use networks::{NETWORK_MAINNET, NETWORK_TESTNET};
pub use signer::HypercoreSigner;
