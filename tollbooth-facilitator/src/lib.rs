//! x402 facilitator server library.
//!
//! A facilitator verifies payment payloads and settles them on-chain on
//! behalf of resource servers. This crate provides:
//!
//! - [`local::LocalFacilitator`] — routes payments to registered scheme
//!   facilitators, usable in-process or behind the HTTP surface
//! - [`handlers`] — the axum REST surface (`/verify`, `/settle`,
//!   `/supported` plus legacy V1 endpoints)
//! - [`config`] — TOML + environment configuration

pub mod config;
pub mod handlers;
pub mod local;

pub use config::FacilitatorConfig;
pub use local::LocalFacilitator;
