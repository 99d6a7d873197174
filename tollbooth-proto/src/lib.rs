//! Wire format types for the x402 payment protocol.
//!
//! This crate defines the serialization-level data structures used by the
//! x402 protocol, covering both V1 (legacy) and V2 (current) formats, plus
//! the base64 codec used to carry them in HTTP headers. It has minimal
//! dependencies and is the shared vocabulary across the tollbooth stack.
//!
//! # Modules
//!
//! - [`v2`] — Current protocol types (`PaymentRequirements`, `PaymentPayload`, ...)
//! - [`v1`] — Legacy protocol types (`PaymentRequirementsV1`, ...)
//! - [`responses`] — Facilitator responses (`VerifyResponse`, `SettleResponse`, ...)
//! - [`helpers`] — Version detection, parsing, and network pattern matching
//! - [`encoding`] — Base64-wrapped JSON codec
//! - [`timestamp`] — Unix timestamps for authorization validity windows
//!
//! # Wire Format
//!
//! All types serialize to JSON with camelCase field names. Missing optional
//! fields are omitted, never serialized as `null`. The protocol version is
//! carried in the `x402Version` field.

pub mod encoding;
pub mod helpers;
pub mod responses;
pub mod timestamp;
pub mod v1;
pub mod v2;

pub use encoding::Base64Bytes;
pub use responses::{SettleResponse, SupportedKind, SupportedResponse, VerifyResponse};
pub use timestamp::UnixTimestamp;
pub use v1::{PaymentPayloadV1, PaymentRequiredV1, PaymentRequirementsV1};
pub use v2::{
    ExtensionMap, PaymentPayload, PaymentRequired, PaymentRequirements, ResourceInfo,
    SettleRequest, VerifyRequest,
};

/// Current protocol version.
pub const X402_VERSION: u32 = 2;

/// CAIP-2 format network identifier (e.g., `"eip155:8453"`, `"solana:mainnet"`).
pub type Network = String;

/// Errors that can occur when parsing x402 protocol messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The `x402Version` field is missing from the JSON data.
    #[error("missing x402Version field")]
    MissingVersion,

    /// The `x402Version` field has an unsupported value.
    #[error("invalid x402Version: {0}")]
    InvalidVersion(u32),

    /// A required field is missing from the JSON data.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A field failed the protocol invariants.
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// Which field failed validation.
        field: &'static str,
        /// Why it failed.
        reason: String,
    },

    /// JSON deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
