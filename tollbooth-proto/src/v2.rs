//! Protocol version 2 (current) wire types.
//!
//! V2 uses CAIP-2 chain identifiers (e.g., `"eip155:8453"`), a top-level
//! [`ResourceInfo`] object on 402 responses, and an `extensions` map for
//! optional protocol features.
//!
//! # Key Types
//!
//! - [`PaymentRequirements`] — one payment option advertised by the seller
//! - [`PaymentRequired`] — the HTTP 402 response body
//! - [`PaymentPayload`] — the buyer's signed authorization
//! - [`VerifyRequest`] / [`SettleRequest`] — facilitator request wrappers

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Network, ProtocolError};

/// Protocol extension data attached to 402 responses and payment payloads.
///
/// Keys are extension names (e.g., `"bazaar"`, `"payment-identifier"`);
/// values are extension-specific JSON objects.
pub type ExtensionMap = serde_json::Map<String, Value>;

/// One payment option advertised by the seller.
///
/// # JSON Format
///
/// ```json
/// {
///   "scheme": "exact",
///   "network": "eip155:84532",
///   "amount": "1000",
///   "payTo": "0x...",
///   "maxTimeoutSeconds": 300,
///   "asset": "0x...",
///   "extra": {"name": "USDC", "version": "2"}
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme identifier (e.g., `"exact"`).
    pub scheme: String,

    /// CAIP-2 network identifier (e.g., `"eip155:8453"`).
    pub network: Network,

    /// Amount in the asset's atomic units, as a decimal string.
    pub amount: String,

    /// Recipient address, interpreted by the scheme.
    pub pay_to: String,

    /// Maximum validity window for the payment authorization, in seconds.
    pub max_timeout_seconds: u64,

    /// Asset identifier, interpreted by the scheme (token address, mint, ...).
    pub asset: String,

    /// Scheme-specific extra data (e.g., EIP-712 domain parameters).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl PaymentRequirements {
    /// Returns the payment amount as a string.
    #[must_use]
    pub fn amount(&self) -> &str {
        &self.amount
    }

    /// Checks the protocol invariants on this requirement.
    ///
    /// - `amount` must parse as a non-negative integer;
    /// - `network` must be of the form `<namespace>:<reference>` with both
    ///   parts non-empty and colon-free;
    /// - `max_timeout_seconds` must be positive.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidField`] naming the offending field.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.amount.is_empty() || !self.amount.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProtocolError::InvalidField {
                field: "amount",
                reason: format!("'{}' is not a non-negative integer", self.amount),
            });
        }
        if !is_caip2_network(&self.network) {
            return Err(ProtocolError::InvalidField {
                field: "network",
                reason: format!("'{}' is not a <namespace>:<reference> id", self.network),
            });
        }
        if self.max_timeout_seconds == 0 {
            return Err(ProtocolError::InvalidField {
                field: "maxTimeoutSeconds",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}

/// Returns `true` for strings matching `^[^:]+:[^:]+$`.
fn is_caip2_network(network: &str) -> bool {
    match network.split_once(':') {
        Some((ns, reference)) => {
            !ns.is_empty() && !reference.is_empty() && !reference.contains(':')
        }
        None => false,
    }
}

/// Metadata about the resource being paid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    /// URL of the resource.
    pub url: String,

    /// Human-readable description of the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// MIME type of the resource content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ResourceInfo {
    /// Creates resource info with just a URL.
    #[must_use]
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: None,
            mime_type: None,
        }
    }
}

/// HTTP 402 Payment Required response body (V2).
///
/// The order of `accepts` encodes server preference: earlier entries are
/// preferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Protocol version (always 2 for this type).
    #[serde(default = "default_v2")]
    pub x402_version: u32,

    /// Optional error message if a previous payment attempt failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Information about the resource being paid for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,

    /// Acceptable payment options, in server preference order.
    pub accepts: Vec<PaymentRequirements>,

    /// Extension declarations offered by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,
}

/// A signed payment authorization from the buyer (V2).
///
/// `accepted` echoes the exact [`PaymentRequirements`] the buyer agreed to,
/// letting the server match it against its advertised options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version (always 2 for this type).
    #[serde(default = "default_v2")]
    pub x402_version: u32,

    /// The payment requirements the buyer accepted.
    pub accepted: PaymentRequirements,

    /// The scheme-specific signed payload.
    pub payload: Value,

    /// Resource info echoed from the 402 response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,

    /// Extension data appended by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,
}

impl PaymentPayload {
    /// Returns the payment scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.accepted.scheme
    }

    /// Returns the network.
    #[must_use]
    pub fn network(&self) -> &str {
        &self.accepted.network
    }
}

/// Request body for a facilitator `POST /verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// Protocol version.
    #[serde(default = "default_v2")]
    pub x402_version: u32,

    /// The payment payload to verify.
    pub payment_payload: PaymentPayload,

    /// The requirements to verify against.
    pub payment_requirements: PaymentRequirements,
}

/// Request body for a facilitator `POST /settle`.
///
/// Structurally identical to [`VerifyRequest`] on the wire, but a distinct
/// type so a verify request cannot be passed where a settle request is
/// expected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleRequest {
    /// Protocol version.
    #[serde(default = "default_v2")]
    pub x402_version: u32,

    /// The payment payload to settle.
    pub payment_payload: PaymentPayload,

    /// The requirements for settlement.
    pub payment_requirements: PaymentRequirements,
}

impl From<VerifyRequest> for SettleRequest {
    fn from(req: VerifyRequest) -> Self {
        Self {
            x402_version: req.x402_version,
            payment_payload: req.payment_payload,
            payment_requirements: req.payment_requirements,
        }
    }
}

const fn default_v2() -> u32 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: "eip155:84532".into(),
            amount: "1000".into(),
            pay_to: "0x1111111111111111111111111111111111111111".into(),
            max_timeout_seconds: 300,
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
            extra: None,
        }
    }

    #[test]
    fn requirements_roundtrip() {
        let req = requirements();
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["payTo"], req.pay_to);
        assert_eq!(json["maxTimeoutSeconds"], 300);
        assert!(json.get("extra").is_none());
        let back: PaymentRequirements = serde_json::from_value(json).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn payment_required_roundtrip() {
        let required = PaymentRequired {
            x402_version: 2,
            error: None,
            resource: Some(ResourceInfo {
                url: "https://api.example.com/weather".into(),
                description: Some("Weather data".into()),
                mime_type: Some("application/json".into()),
            }),
            accepts: vec![requirements()],
            extensions: None,
        };
        let json = serde_json::to_string(&required).unwrap();
        let back: PaymentRequired = serde_json::from_str(&json).unwrap();
        assert_eq!(back, required);
        assert!(!json.contains("null"));
    }

    #[test]
    fn validate_accepts_well_formed() {
        assert!(requirements().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_amount() {
        let mut req = requirements();
        req.amount = "-5".into();
        assert!(req.validate().is_err());
        req.amount = "1.5".into();
        assert!(req.validate().is_err());
        req.amount = String::new();
        assert!(req.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_network() {
        let mut req = requirements();
        req.network = "base-sepolia".into();
        assert!(req.validate().is_err());
        req.network = "eip155:84532:extra".into();
        assert!(req.validate().is_err());
        req.network = ":84532".into();
        assert!(req.validate().is_err());
    }

    #[test]
    fn payload_exposes_accepted_scheme_and_network() {
        let json = serde_json::json!({
            "x402Version": 2,
            "accepted": serde_json::to_value(requirements()).unwrap(),
            "payload": {"signature": "0xabc"},
        });
        let payload: PaymentPayload = serde_json::from_value(json).unwrap();
        assert_eq!(payload.scheme(), "exact");
        assert_eq!(payload.network(), "eip155:84532");
    }
}
