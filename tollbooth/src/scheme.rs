//! Payment scheme traits.
//!
//! A scheme is a named protocol variant keyed by `(scheme, network)`. Each
//! registered implementation provides up to three capabilities: a client
//! (sign payloads), a server (parse prices, build requirements), and a
//! facilitator (verify signatures, settle on-chain).
//!
//! All I/O-bound methods are async-first and return [`BoxFuture`] so the
//! traits stay dyn-compatible for dynamic registration. Server-side methods
//! are sync because they are pure computation.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::proto::v1::{PaymentPayloadV1, PaymentRequirementsV1};
use crate::proto::{PaymentPayload, PaymentRequirements, SettleResponse, SupportedKind,
    VerifyResponse};

/// Boxed, `Send` future — the dyn-compatible async return type used across
/// scheme and hook boundaries.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Boxed error type used across scheme trait boundaries.
pub type SchemeError = Box<dyn std::error::Error + Send + Sync>;

/// Client-side payment mechanism (V2).
///
/// Implementations produce the scheme-specific inner payload and signature
/// for a selected requirement. The engine wraps the result into a full
/// [`PaymentPayload`].
pub trait SchemeClient: Send + Sync {
    /// Payment scheme identifier (e.g., `"exact"`).
    fn scheme(&self) -> &str;

    /// Creates the scheme-specific inner payload.
    ///
    /// Async because signing may involve RPC calls or hardware wallets.
    /// Must be deterministic given the requirements, signer state, and wall
    /// clock: validity bounds derive from `max_timeout_seconds` plus now.
    fn create_payment_payload<'a>(
        &'a self,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<Value, SchemeError>>;
}

/// Client-side payment mechanism (V1, legacy).
pub trait SchemeClientV1: Send + Sync {
    /// Payment scheme identifier.
    fn scheme(&self) -> &str;

    /// Creates the scheme-specific inner payload for V1 requirements.
    fn create_payment_payload<'a>(
        &'a self,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, Result<Value, SchemeError>>;
}

/// Server-side payment mechanism.
///
/// Translates human price input into canonical requirements and attaches
/// scheme-specific `extra` data. Does not verify or settle; that is the
/// facilitator's job.
pub trait SchemeServer: Send + Sync {
    /// Payment scheme identifier (e.g., `"exact"`).
    fn scheme(&self) -> &str;

    /// Converts a human-friendly price into an atomic [`AssetAmount`].
    ///
    /// Accepts a money string (`"$0.01"`, `"1.50"`), a bare number, or a
    /// structured `AssetAmount` object which passes through unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the price format is invalid or the network is
    /// unsupported.
    fn parse_price(&self, price: &Value, network: &str) -> Result<AssetAmount, SchemeError>;

    /// Adds scheme-specific fields to payment requirements.
    ///
    /// For EVM this injects EIP-712 domain parameters into `extra`; for
    /// Solana the facilitator's fee payer; for Hypercore the signature chain.
    fn enhance_payment_requirements(
        &self,
        requirements: PaymentRequirements,
        supported_kind: &SupportedKind,
        extensions: &[String],
    ) -> PaymentRequirements;
}

/// Facilitator-side payment mechanism (V2).
///
/// Implementations verify and settle payments for a specific scheme. Both
/// operations report failure through the response object (`is_valid=false`,
/// `success=false`) rather than returning errors: a malformed payload or a
/// failed chain call is a rejection, not a crash.
pub trait SchemeFacilitator: Send + Sync {
    /// Payment scheme identifier (e.g., `"exact"`).
    fn scheme(&self) -> &str;

    /// CAIP family pattern (e.g., `"eip155:*"`).
    fn caip_family(&self) -> &str;

    /// Extra data advertised in [`SupportedKind`] for a network, if any.
    fn get_extra(&self, network: &str) -> Option<Value>;

    /// Signer addresses this facilitator settles with on a network.
    fn get_signers(&self, network: &str) -> Vec<String>;

    /// Verifies a payment without touching funds.
    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, VerifyResponse>;

    /// Settles a payment on-chain.
    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, SettleResponse>;
}

/// Facilitator-side payment mechanism (V1, legacy).
pub trait SchemeFacilitatorV1: Send + Sync {
    /// Payment scheme identifier.
    fn scheme(&self) -> &str;

    /// CAIP family pattern.
    fn caip_family(&self) -> &str;

    /// Verifies a V1 payment.
    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayloadV1,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, VerifyResponse>;

    /// Settles a V1 payment on-chain.
    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayloadV1,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, SettleResponse>;
}

/// Amount in atomic units paired with its asset identifier.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAmount {
    /// Amount in the asset's smallest unit (e.g., `"1500000"` for 1.5 USDC).
    pub amount: String,

    /// Asset address/identifier.
    pub asset: String,

    /// Optional scheme-specific metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}
