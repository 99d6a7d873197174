//! Errors for the HTTP transport layer.

use tollbooth::proto::ProtocolError;
use tollbooth::proto::encoding::HeaderDecodeError;

/// Errors that can occur while encoding or decoding x402 HTTP traffic.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A header value did not decode as base64-wrapped JSON.
    #[error("invalid header encoding: {0}")]
    HeaderEncoding(#[from] HeaderDecodeError),

    /// Protocol-level failure: unknown version, missing fields.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The request could not be cloned for the payment retry.
    #[error("request body is not cloneable; payment retry impossible")]
    RequestNotCloneable,
}
