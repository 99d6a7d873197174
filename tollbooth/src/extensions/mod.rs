//! Protocol extensions.
//!
//! Extensions ride in the `extensions` maps on 402 responses and payment
//! payloads, keyed by name. Servers **declare** an extension (and may enrich
//! the declaration per request); clients **append** data only for extensions
//! the server declared.
//!
//! Two extensions ship with the engine:
//!
//! - [`payment_identifier`] — idempotency keys for safe retries
//! - [`bazaar`] — endpoint discovery metadata for aggregators

pub mod bazaar;
pub mod payment_identifier;
