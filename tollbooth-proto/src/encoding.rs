//! Base64-wrapped JSON codec for x402 HTTP headers.
//!
//! Every x402 header carries `base64(JSON(entity))` using the standard
//! alphabet with padding. [`Base64Bytes`] holds the encoded form and the
//! `*_json` helpers do the full entity round trip.

use std::fmt::{self, Display, Formatter};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;

/// Errors from decoding a base64-wrapped JSON header value.
#[derive(Debug, thiserror::Error)]
pub enum HeaderDecodeError {
    /// The value is not valid base64.
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The decoded bytes are not the expected JSON shape.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A wrapper for base64-encoded byte data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes(pub Vec<u8>);

impl Base64Bytes {
    /// Encodes raw binary data into base64 string bytes.
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Self {
        let encoded = b64.encode(input.as_ref());
        Self(encoded.into_bytes())
    }

    /// Decodes the base64 string bytes to raw binary data.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64.decode(&self.0)
    }

    /// Serializes a value to JSON and base64-encodes the result.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode_json<T: serde::Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_vec(value)?;
        Ok(Self::encode(json))
    }

    /// Decodes the base64 string bytes and deserializes the JSON within.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderDecodeError`] on base64 or JSON failure; no partial
    /// data escapes.
    pub fn decode_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, HeaderDecodeError> {
        let bytes = self.decode()?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl AsRef<[u8]> for Base64Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Base64Bytes {
    fn from(slice: &[u8]) -> Self {
        Self(slice.to_vec())
    }
}

impl From<&str> for Base64Bytes {
    fn from(s: &str) -> Self {
        Self(s.trim().as_bytes().to_vec())
    }
}

impl Display for Base64Bytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let data = b"hello x402";
        let encoded = Base64Bytes::encode(data);
        assert_eq!(encoded.decode().unwrap(), data);
    }

    #[test]
    fn json_roundtrip() {
        let value = serde_json::json!({"x402Version": 2, "accepts": []});
        let encoded = Base64Bytes::encode_json(&value).unwrap();
        let back: serde_json::Value = encoded.decode_json().unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn garbage_is_an_error_not_a_panic() {
        let bogus = Base64Bytes::from("not-base64!!!");
        assert!(bogus.decode_json::<serde_json::Value>().is_err());

        // Valid base64 wrapping invalid JSON is still an error.
        let not_json = Base64Bytes::encode(b"{{{{");
        assert!(not_json.decode_json::<serde_json::Value>().is_err());
    }

    #[test]
    fn uses_standard_alphabet_with_padding() {
        let encoded = Base64Bytes::encode(b"a");
        assert_eq!(encoded.to_string(), "YQ==");
    }
}
