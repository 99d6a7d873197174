//! HTTP header names for the x402 protocol.

/// V2 request header carrying the signed payment payload.
pub const PAYMENT_SIGNATURE_HEADER: &str = "PAYMENT-SIGNATURE";

/// V2 response header mirroring the 402 body.
///
/// When both are present, the header takes precedence on parse, which
/// disambiguates non-JSON 402 bodies.
pub const PAYMENT_REQUIRED_HEADER: &str = "PAYMENT-REQUIRED";

/// V2 response header carrying the settlement receipt.
pub const PAYMENT_RESPONSE_HEADER: &str = "PAYMENT-RESPONSE";

/// V1 legacy request header carrying the payment payload.
pub const X_PAYMENT_HEADER: &str = "X-PAYMENT";

/// V1 legacy response header carrying the settlement receipt.
pub const X_PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";
