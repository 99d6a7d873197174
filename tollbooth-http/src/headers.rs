//! Base64-wrapped JSON codec for x402 headers.
//!
//! Every header value is `base64(JSON(entity))` with the standard alphabet
//! and padding. Decoders are bilingual (they accept V1 and V2); encoders
//! emit exactly the version asked for.

use tollbooth::proto::helpers::{self, PaymentPayloadEnum, PaymentRequiredEnum};
use tollbooth::proto::v1::{PaymentPayloadV1, PaymentRequiredV1};
use tollbooth::proto::{Base64Bytes, PaymentPayload, PaymentRequired, SettleResponse};

use crate::error::HttpError;

/// Encodes a V2 payment payload for the `PAYMENT-SIGNATURE` header.
///
/// # Errors
///
/// Returns [`HttpError::Serialize`] if JSON serialization fails.
pub fn encode_payment_signature(payload: &PaymentPayload) -> Result<String, HttpError> {
    Ok(Base64Bytes::encode_json(payload)?.to_string())
}

/// Encodes a V1 payment payload for the `X-PAYMENT` header.
///
/// # Errors
///
/// Returns [`HttpError::Serialize`] if JSON serialization fails.
pub fn encode_x_payment(payload: &PaymentPayloadV1) -> Result<String, HttpError> {
    Ok(Base64Bytes::encode_json(payload)?.to_string())
}

/// Decodes a `PAYMENT-SIGNATURE` or `X-PAYMENT` header value into a
/// version-tagged payload.
///
/// # Errors
///
/// Returns [`HttpError`] on base64, JSON, or version failure.
pub fn decode_payment_payload(header_value: &str) -> Result<PaymentPayloadEnum, HttpError> {
    let value: serde_json::Value = Base64Bytes::from(header_value).decode_json()?;
    Ok(helpers::parse_payment_payload(&value)?)
}

/// Encodes a V2 402 body for the `PAYMENT-REQUIRED` header.
///
/// # Errors
///
/// Returns [`HttpError::Serialize`] if JSON serialization fails.
pub fn encode_payment_required(required: &PaymentRequired) -> Result<String, HttpError> {
    Ok(Base64Bytes::encode_json(required)?.to_string())
}

/// Decodes a `PAYMENT-REQUIRED` header value into a version-tagged 402 body.
///
/// # Errors
///
/// Returns [`HttpError`] on base64, JSON, or version failure.
pub fn decode_payment_required(header_value: &str) -> Result<PaymentRequiredEnum, HttpError> {
    let value: serde_json::Value = Base64Bytes::from(header_value).decode_json()?;
    Ok(helpers::parse_payment_required(&value)?)
}

/// Parses a 402 response body (either version) into a version-tagged value.
///
/// # Errors
///
/// Returns [`HttpError`] on JSON or version failure.
pub fn decode_payment_required_body(body: &[u8]) -> Result<PaymentRequiredEnum, HttpError> {
    Ok(helpers::parse_payment_required_bytes(body)?)
}

/// Encodes a settlement receipt for the `PAYMENT-RESPONSE` /
/// `X-PAYMENT-RESPONSE` header.
///
/// # Errors
///
/// Returns [`HttpError::Serialize`] if JSON serialization fails.
pub fn encode_payment_response(response: &SettleResponse) -> Result<String, HttpError> {
    Ok(Base64Bytes::encode_json(response)?.to_string())
}

/// Decodes a settlement receipt header.
///
/// # Errors
///
/// Returns [`HttpError`] on base64 or JSON failure.
pub fn decode_payment_response(header_value: &str) -> Result<SettleResponse, HttpError> {
    Ok(Base64Bytes::from(header_value).decode_json()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollbooth::proto::{PaymentRequirements, ResourceInfo};

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
    fn v2_payment_required_header_roundtrip() {
        let required = PaymentRequired {
            x402_version: 2,
            error: None,
            resource: Some(ResourceInfo::from_url("https://api.example.com/weather")),
            accepts: vec![requirements()],
            extensions: None,
        };
        let encoded = encode_payment_required(&required).unwrap();
        let decoded = decode_payment_required(&encoded).unwrap();
        match decoded {
            PaymentRequiredEnum::V2(back) => assert_eq!(*back, required),
            PaymentRequiredEnum::V1(_) => panic!("decoded as V1"),
        }
    }

    #[test]
    fn v2_payload_header_roundtrip() {
        let payload = PaymentPayload {
            x402_version: 2,
            accepted: requirements(),
            payload: serde_json::json!({"signature": "0xsig"}),
            resource: None,
            extensions: None,
        };
        let encoded = encode_payment_signature(&payload).unwrap();
        let decoded = decode_payment_payload(&encoded).unwrap();
        match decoded {
            PaymentPayloadEnum::V2(back) => assert_eq!(*back, payload),
            PaymentPayloadEnum::V1(_) => panic!("decoded as V1"),
        }
    }

    #[test]
    fn v1_payload_header_roundtrip() {
        let payload = PaymentPayloadV1 {
            x402_version: 1,
            scheme: "exact".into(),
            network: "base-sepolia".into(),
            payload: serde_json::json!({"signature": "0xsig"}),
        };
        let encoded = encode_x_payment(&payload).unwrap();
        let decoded = decode_payment_payload(&encoded).unwrap();
        match decoded {
            PaymentPayloadEnum::V1(back) => assert_eq!(*back, payload),
            PaymentPayloadEnum::V2(_) => panic!("decoded as V2"),
        }
    }

    #[test]
    fn settlement_receipt_roundtrip() {
        let receipt = SettleResponse::success(
            format!("0x{}", "cd".repeat(32)),
            "eip155:84532",
            "0x1234567890123456789012345678901234567890",
        );
        let encoded = encode_payment_response(&receipt).unwrap();
        assert_eq!(decode_payment_response(&encoded).unwrap(), receipt);
    }

    #[test]
    fn garbage_header_is_an_error() {
        assert!(decode_payment_payload("!!!not-base64!!!").is_err());
        assert!(decode_payment_required("aGVsbG8=").is_err());
    }

    #[test]
    fn unknown_version_is_rejected() {
        let bogus = Base64Bytes::encode_json(&serde_json::json!({
            "x402Version": 9,
            "accepts": [],
        }))
        .unwrap();
        assert!(decode_payment_required(&bogus.to_string()).is_err());
    }
}
