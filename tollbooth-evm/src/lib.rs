//! EVM (EIP-155) support for the x402 payment protocol.
//!
//! Implements the `exact` scheme over EIP-3009 `transferWithAuthorization`:
//! the payer signs an EIP-712 authorization moving an exact token amount to
//! the payee within a validity window, and the facilitator submits it
//! on-chain. Counterfactual smart accounts are supported through ERC-6492
//! wrapped signatures checked by the universal validator contract.
//!
//! - [`exact::ExactEvmClient`] — signs payment authorizations
//! - [`exact::ExactEvmServer`] — parses prices, enhances requirements
//! - [`exact::ExactEvmFacilitator`] — verifies and settles on-chain

pub mod chain;
pub mod exact;
pub mod networks;
pub mod signer;

pub use chain::{Eip155ChainReference, TokenAmount};
pub use networks::{AssetInfo, NetworkConfig, known_networks};
pub use signer::SignerLike;
