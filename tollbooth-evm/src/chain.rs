//! EVM chain identifiers and amount types.

use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A numeric EIP-155 chain id extracted from a CAIP-2 identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Eip155ChainReference(u64);

impl Eip155ChainReference {
    /// Creates a chain reference from a raw chain id.
    #[must_use]
    pub const fn new(chain_id: u64) -> Self {
        Self(chain_id)
    }

    /// Returns the numeric chain id.
    #[must_use]
    pub const fn inner(&self) -> u64 {
        self.0
    }

    /// Returns the CAIP-2 identifier, `eip155:<id>`.
    #[must_use]
    pub fn caip2(&self) -> String {
        format!("eip155:{}", self.0)
    }
}

/// The string is not an `eip155:<id>` identifier.
#[derive(Debug, thiserror::Error)]
#[error("not an eip155 network id: {0}")]
pub struct NotEip155Error(String);

impl FromStr for Eip155ChainReference {
    type Err = NotEip155Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let reference = s
            .strip_prefix("eip155:")
            .ok_or_else(|| NotEip155Error(s.to_owned()))?;
        let chain_id = reference
            .parse::<u64>()
            .map_err(|_| NotEip155Error(s.to_owned()))?;
        Ok(Self(chain_id))
    }
}

impl fmt::Display for Eip155ChainReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "eip155:{}", self.0)
    }
}

/// A token amount carried on the wire as a decimal string.
///
/// EIP-3009 values are `uint256` on-chain but decimal strings in JSON so
/// JavaScript consumers keep precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TokenAmount(pub U256);

impl From<U256> for TokenAmount {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<TokenAmount> for U256 {
    fn from(value: TokenAmount) -> Self {
        value.0
    }
}

impl FromStr for TokenAmount {
    type Err = <U256 as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // U256::from_str accepts hex with 0x prefix; wire amounts are decimal.
        U256::from_str_radix(s, 10).map(Self)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_reference_parsing() {
        let chain: Eip155ChainReference = "eip155:84532".parse().unwrap();
        assert_eq!(chain.inner(), 84532);
        assert_eq!(chain.caip2(), "eip155:84532");
        assert!("solana:mainnet".parse::<Eip155ChainReference>().is_err());
        assert!("eip155:abc".parse::<Eip155ChainReference>().is_err());
    }

    #[test]
    fn token_amount_decimal_wire_format() {
        let amount: TokenAmount = "1000".parse().unwrap();
        assert_eq!(serde_json::to_string(&amount).unwrap(), "\"1000\"");
        let back: TokenAmount = serde_json::from_str("\"1000\"").unwrap();
        assert_eq!(back, amount);
        assert!(serde_json::from_str::<TokenAmount>("\"0x10\"").is_err());
    }
}
