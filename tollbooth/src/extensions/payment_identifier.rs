//! The `payment-identifier` extension: idempotency keys for retries.
//!
//! The client mints an opaque identifier and attaches it to the payload;
//! servers that recognize the extension replay the cached response of the
//! first fully-settled request with the same identifier instead of
//! re-verifying and re-settling. Identifiers carry no cryptographic binding;
//! servers must scope them by the verified payer.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::BeforePaymentHook;
use crate::proto::ExtensionMap;

/// Extension key.
pub const PAYMENT_IDENTIFIER: &str = "payment-identifier";

/// Minimum identifier length.
pub const PAYMENT_ID_MIN_LENGTH: usize = 16;

/// Maximum identifier length.
pub const PAYMENT_ID_MAX_LENGTH: usize = 128;

/// The `info` sub-object of the extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIdentifierInfo {
    /// Whether the server requires an identifier on every payment.
    pub required: bool,

    /// The caller-minted identifier, present on client payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Full extension object as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIdentifierExtension {
    /// Extension payload data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<PaymentIdentifierInfo>,

    /// JSON schema describing `info`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

/// An identifier failed validation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid payment ID: {0}")]
pub struct InvalidPaymentIdError(pub String);

/// Checks an identifier against the charset and length rules:
/// 16–128 characters from `[A-Za-z0-9_-]`.
#[must_use]
pub fn is_valid_payment_id(id: &str) -> bool {
    (PAYMENT_ID_MIN_LENGTH..=PAYMENT_ID_MAX_LENGTH).contains(&id.len())
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Generates a fresh identifier: `prefix` followed by 32 hex characters.
///
/// The default prefix is `"pay_"`; pass `""` for a bare identifier.
#[must_use]
pub fn generate_payment_id(prefix: &str) -> String {
    let bytes: [u8; 16] = rand::rng().random();
    format!("{prefix}{}", hex::encode(bytes))
}

/// Builds the server-side declaration emitted in 402 responses.
#[must_use]
pub fn declare_payment_identifier_extension(required: bool) -> Value {
    serde_json::json!({
        "info": { "required": required },
        "schema": {
            "type": "object",
            "properties": {
                "id": {
                    "type": "string",
                    "minLength": PAYMENT_ID_MIN_LENGTH,
                    "maxLength": PAYMENT_ID_MAX_LENGTH,
                    "pattern": "^[A-Za-z0-9_-]+$",
                },
                "required": { "type": "boolean" },
            },
        },
    })
}

/// Writes an identifier into a declared `payment-identifier` extension.
///
/// No-op when the server did not declare the extension or the declaration
/// has no `info` object: clients must not fabricate undeclared extensions.
/// Without a `custom_id`, a fresh `pay_…` identifier is minted. The server's
/// `required` flag is preserved.
///
/// Returns the identifier that was attached, if any.
///
/// # Errors
///
/// Returns [`InvalidPaymentIdError`] when a custom id fails validation while
/// the extension is declared.
pub fn append_payment_identifier(
    extensions: &mut ExtensionMap,
    custom_id: Option<&str>,
) -> Result<Option<String>, InvalidPaymentIdError> {
    let Some(declaration) = extensions.get_mut(PAYMENT_IDENTIFIER) else {
        return Ok(None);
    };
    let Some(info) = declaration.get_mut("info").and_then(Value::as_object_mut) else {
        return Ok(None);
    };

    let id = match custom_id {
        Some(id) => {
            if !is_valid_payment_id(id) {
                return Err(InvalidPaymentIdError(id.to_owned()));
            }
            id.to_owned()
        }
        None => generate_payment_id("pay_"),
    };

    info.insert("id".into(), Value::String(id.clone()));
    Ok(Some(id))
}

/// Reads the identifier out of a payload's extension map, validating it.
#[must_use]
pub fn extract_payment_id(extensions: Option<&ExtensionMap>) -> Option<&str> {
    let id = extensions?
        .get(PAYMENT_IDENTIFIER)?
        .get("info")?
        .get("id")?
        .as_str()?;
    is_valid_payment_id(id).then_some(id)
}

/// A before-payment-creation hook that appends an identifier whenever the
/// server declares the extension.
#[must_use]
pub fn payment_identifier_hook() -> BeforePaymentHook {
    Box::new(|ctx| {
        Box::pin(async move {
            if let Some(extensions) = ctx.extensions.as_mut() {
                // Invalid custom ids cannot occur here; a minted id always passes.
                let _ = append_payment_identifier(extensions, None);
            }
            None
        })
    })
}
