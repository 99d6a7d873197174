//! Known Hypercore networks and spot assets.

use tollbooth::networks::NetworkInfo;

/// CAIP-2 identifier for Hyperliquid mainnet.
pub const NETWORK_MAINNET: &str = "hypercore:mainnet";

/// CAIP-2 identifier for Hyperliquid testnet.
pub const NETWORK_TESTNET: &str = "hypercore:testnet";

/// Exchange API endpoint for mainnet.
pub const API_MAINNET: &str = "https://api.hyperliquid.xyz/exchange";

/// Exchange API endpoint for testnet.
pub const API_TESTNET: &str = "https://api.hyperliquid-testnet.xyz/exchange";

/// A spot asset on Hypercore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HypercoreAssetInfo {
    /// Token identifier, `SYMBOL:0x<token-id>`.
    pub token: &'static str,
    /// Atomic unit precision (wei decimals).
    pub decimals: u8,
    /// Human-readable symbol.
    pub symbol: &'static str,
}

/// The default USDH deployment used for money-string prices.
pub const USDH: HypercoreAssetInfo = HypercoreAssetInfo {
    token: "USDH:0x54e00a5988577cb0b0c9ab0cb6ef7f4b",
    decimals: 8,
    symbol: "usdh",
};

/// Returns `Some(is_mainnet)` for a Hypercore network id, `None` otherwise.
#[must_use]
pub fn is_mainnet(network: &str) -> Option<bool> {
    match network {
        NETWORK_MAINNET => Some(true),
        NETWORK_TESTNET => Some(false),
        _ => None,
    }
}

/// Exchange API endpoint for a Hypercore network.
#[must_use]
pub fn api_endpoint(network: &str) -> Option<&'static str> {
    match is_mainnet(network)? {
        true => Some(API_MAINNET),
        false => Some(API_TESTNET),
    }
}

/// Legacy V1 network names for Hypercore.
pub const HYPERCORE_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        name: "hypercore",
        namespace: "hypercore",
        reference: "mainnet",
    },
    NetworkInfo {
        name: "hypercore-testnet",
        namespace: "hypercore",
        reference: "testnet",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_classification() {
        assert_eq!(is_mainnet(NETWORK_MAINNET), Some(true));
        assert_eq!(is_mainnet(NETWORK_TESTNET), Some(false));
        assert_eq!(is_mainnet("eip155:1"), None);
        assert_eq!(api_endpoint(NETWORK_MAINNET), Some(API_MAINNET));
    }
}
