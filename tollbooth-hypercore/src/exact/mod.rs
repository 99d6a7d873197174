//! The `exact` payment scheme for Hypercore.

mod client;
mod facilitator;
mod server;

pub use client::ExactHypercoreClient;
pub use facilitator::{ExactHypercoreFacilitator, HypercoreExactError};
pub use server::ExactHypercoreServer;

/// Scheme identifier shared by all `exact` implementations.
pub const SCHEME_EXACT: &str = "exact";

/// CAIP-2 family pattern for Hypercore networks.
pub const HYPERCORE_FAMILY: &str = "hypercore:*";

/// Display precision for action amounts.
pub(crate) const AMOUNT_PLACES: usize = 8;
