//! HTTP transport for the x402 payment protocol.
//!
//! - [`client`] — reqwest middleware that pays 402 responses automatically
//! - [`server`] — tower layer that gates routes behind payment, plus the
//!   facilitator HTTP client
//! - [`headers`] — the base64-wrapped JSON header codec
//! - [`constants`] — protocol header names

pub mod client;
pub mod constants;
pub mod error;
pub mod headers;
pub mod server;

pub use client::PaymentMiddleware;
pub use error::HttpError;
pub use server::{HttpFacilitatorClient, PaymentGateLayer, RouteConfig, RouteTable};
