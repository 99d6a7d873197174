//! Protocol version 1 (legacy) wire types.
//!
//! V1 uses human-readable network names (e.g., `"base-sepolia"`), a
//! `maxAmountRequired` field instead of V2's `amount`, and embeds resource
//! information inline in each requirement rather than in a separate object.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Network;
use crate::v2;

/// V1 payment requirements (legacy).
///
/// # JSON Format
///
/// ```json
/// {
///   "scheme": "exact",
///   "network": "base-sepolia",
///   "maxAmountRequired": "1000000",
///   "resource": "https://api.example.com/data",
///   "payTo": "0x...",
///   "maxTimeoutSeconds": 300,
///   "asset": "0x..."
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirementsV1 {
    /// Payment scheme identifier (e.g., `"exact"`).
    pub scheme: String,

    /// Network identifier (legacy name format, e.g., `"base-sepolia"`).
    pub network: Network,

    /// Maximum amount in atomic units, as a decimal string.
    pub max_amount_required: String,

    /// Resource URL, inline in V1.
    pub resource: String,

    /// Optional resource description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Optional MIME type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Recipient address.
    pub pay_to: String,

    /// Maximum validity window in seconds.
    pub max_timeout_seconds: u64,

    /// Asset address/identifier.
    pub asset: String,

    /// Optional output schema advertised for the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,

    /// Additional scheme-specific data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl PaymentRequirementsV1 {
    /// Returns the payment amount (V1 uses `maxAmountRequired`).
    #[must_use]
    pub fn amount(&self) -> &str {
        &self.max_amount_required
    }

    /// Builds a V1 requirement from a V2 one plus the resource metadata V1
    /// carries inline.
    ///
    /// The caller supplies the V1 network name since V2 requirements carry
    /// CAIP-2 ids; name resolution is the caller's concern.
    #[must_use]
    pub fn from_v2(
        req: &v2::PaymentRequirements,
        network_name: impl Into<Network>,
        resource: &v2::ResourceInfo,
    ) -> Self {
        Self {
            scheme: req.scheme.clone(),
            network: network_name.into(),
            max_amount_required: req.amount.clone(),
            resource: resource.url.clone(),
            description: resource.description.clone(),
            mime_type: resource.mime_type.clone(),
            pay_to: req.pay_to.clone(),
            max_timeout_seconds: req.max_timeout_seconds,
            asset: req.asset.clone(),
            output_schema: None,
            extra: req.extra.clone(),
        }
    }
}

/// V1 402 response body (legacy). Body-only on the wire; V1 has no
/// `PAYMENT-REQUIRED` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredV1 {
    /// Protocol version (always 1 for this type).
    #[serde(default = "default_v1")]
    pub x402_version: u32,

    /// Optional error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Accepted payment options, in server preference order.
    pub accepts: Vec<PaymentRequirementsV1>,
}

/// V1 payment payload (legacy).
///
/// `scheme` and `network` sit at the top level rather than nested inside an
/// `accepted` requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayloadV1 {
    /// Protocol version (always 1 for this type).
    #[serde(default = "default_v1")]
    pub x402_version: u32,

    /// Payment scheme identifier.
    pub scheme: String,

    /// Network identifier (legacy name format).
    pub network: Network,

    /// Scheme-specific payload data.
    pub payload: Value,
}

impl PaymentPayloadV1 {
    /// Returns the payment scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Returns the network.
    #[must_use]
    pub fn network(&self) -> &str {
        &self.network
    }
}

/// V1 request to verify a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequestV1 {
    /// The payment payload to verify.
    pub payment_payload: PaymentPayloadV1,

    /// The requirements to verify against.
    pub payment_requirements: PaymentRequirementsV1,
}

/// V1 request to settle a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleRequestV1 {
    /// The payment payload to settle.
    pub payment_payload: PaymentPayloadV1,

    /// The requirements for settlement.
    pub payment_requirements: PaymentRequirementsV1,
}

const fn default_v1() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_requirements_roundtrip() {
        let req = PaymentRequirementsV1 {
            scheme: "exact".into(),
            network: "base-sepolia".into(),
            max_amount_required: "1000".into(),
            resource: "https://api.example.com/weather".into(),
            description: Some("Weather".into()),
            mime_type: None,
            pay_to: "0x1111111111111111111111111111111111111111".into(),
            max_timeout_seconds: 300,
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
            output_schema: None,
            extra: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["maxAmountRequired"], "1000");
        assert!(json.get("mimeType").is_none());
        let back: PaymentRequirementsV1 = serde_json::from_value(json).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn v1_from_v2_maps_amount_and_resource() {
        let v2_req = v2::PaymentRequirements {
            scheme: "exact".into(),
            network: "eip155:84532".into(),
            amount: "1000".into(),
            pay_to: "0xpay".into(),
            max_timeout_seconds: 60,
            asset: "0xasset".into(),
            extra: None,
        };
        let resource = v2::ResourceInfo {
            url: "https://api.example.com/weather".into(),
            description: Some("Weather".into()),
            mime_type: Some("application/json".into()),
        };
        let v1 = PaymentRequirementsV1::from_v2(&v2_req, "base-sepolia", &resource);
        assert_eq!(v1.max_amount_required, "1000");
        assert_eq!(v1.network, "base-sepolia");
        assert_eq!(v1.resource, resource.url);
        assert_eq!(v1.mime_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn v1_payload_defaults_version() {
        let payload: PaymentPayloadV1 = serde_json::from_value(serde_json::json!({
            "scheme": "exact",
            "network": "base-sepolia",
            "payload": {"signature": "0xabc"},
        }))
        .unwrap();
        assert_eq!(payload.x402_version, 1);
    }
}
