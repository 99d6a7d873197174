//! Server-side HTTP transport.

mod facilitator_client;
mod paygate;
mod replay;
mod routes;

pub use facilitator_client::{AuthHeaderProvider, FacilitatorClientError, HttpFacilitatorClient};
pub use paygate::{PaymentGate, PaymentGateLayer};
pub use replay::{CachedResponse, ReplayCache};
pub use routes::{RouteConfig, RouteTable};
