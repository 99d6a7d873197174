//! Core engine for the x402 payment protocol.
//!
//! The x402 protocol enables micropayments over HTTP through the 402 Payment
//! Required status code. A resource server advertises payment requirements,
//! the client signs a payment authorization and retries, and a facilitator
//! verifies and settles the authorization against the underlying chain.
//!
//! This crate holds the transport-agnostic engine:
//!
//! - [`client`] — client-side lifecycle: scheme registration, requirement
//!   selection, payload creation with abort/recover hooks
//! - [`server`] — server-side lifecycle: requirement building, facilitator
//!   delegation, verify/settle hooks
//! - [`scheme`] — the traits each `(scheme, network)` implementation provides
//! - [`hooks`] — lifecycle hook contexts and outcomes
//! - [`extensions`] — the protocol extension system plus the
//!   `payment-identifier` and `bazaar` extensions
//! - [`path`] — route path pattern matching (exact, glob, regex)
//! - [`amount`] — money string parsing and atomic unit conversion
//! - [`networks`] — registry mapping legacy network names to CAIP-2 ids
//!
//! HTTP transports live in `tollbooth-http`; chain-specific scheme
//! implementations live in `tollbooth-evm`, `tollbooth-svm`, and
//! `tollbooth-hypercore`.

pub mod amount;
pub mod client;
pub mod config;
pub mod error;
pub mod extensions;
pub mod hooks;
pub mod networks;
pub mod path;
pub mod scheme;
pub mod server;

pub use tollbooth_proto as proto;
