//! The `exact` payment scheme for Solana.

mod client;
mod facilitator;
mod server;
mod types;

pub use client::ExactSvmClient;
pub use facilitator::{ExactSvmFacilitator, SvmExactError};
pub use server::ExactSvmServer;
pub use types::{ExactSolanaPayload, FeePayerExtra, TransferDetails};

/// Scheme identifier shared by all `exact` implementations.
pub const SCHEME_EXACT: &str = "exact";

/// CAIP-2 family pattern for Solana clusters.
pub const SOLANA_FAMILY: &str = "solana:*";
