//! The `exact` payment scheme for EVM chains.
//!
//! The payer signs an EIP-3009 `transferWithAuthorization` moving exactly
//! the required amount; the authorization itself is the payment.

mod client;
pub mod facilitator;
mod server;
mod types;

pub use client::ExactEvmClient;
pub use facilitator::{EvmFacilitatorConfig, ExactEvmFacilitator};
pub use server::ExactEvmServer;
pub use types::{
    Eip3009Authorization, Eip3009Payload, RequirementsExtra, TransferWithAuthorization,
};

/// Scheme identifier shared by all `exact` implementations.
pub const SCHEME_EXACT: &str = "exact";

/// CAIP-2 family pattern for EVM chains.
pub const EIP155_FAMILY: &str = "eip155:*";
