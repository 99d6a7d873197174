//! Known EVM networks and their token deployments.
//!
//! The chain/asset catalog is an input to the engine, not a fixed part of
//! it: [`known_networks`] covers the deployments the stack ships with, and
//! applications can supply their own [`NetworkConfig`] lists.

use alloy_primitives::{Address, address};
use tollbooth::networks::NetworkInfo;

use crate::chain::Eip155ChainReference;

/// A token deployment on one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo {
    /// Token contract address.
    pub address: Address,
    /// Atomic unit precision.
    pub decimals: u8,
    /// EIP-712 domain name, exactly as the contract's `name()` returns it.
    pub name: &'static str,
    /// EIP-712 domain version.
    pub version: &'static str,
    /// Human-readable symbol (e.g., `"usdc"`).
    pub symbol: &'static str,
}

/// One EVM network with its default assets.
///
/// The first asset is the default used for money-string prices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// CAIP-2 identifier.
    pub network: &'static str,
    /// Numeric chain id.
    pub chain: Eip155ChainReference,
    /// Token deployments, default first.
    pub assets: Vec<AssetInfo>,
}

impl NetworkConfig {
    /// Finds an asset by contract address.
    #[must_use]
    pub fn find_asset(&self, address: Address) -> Option<&AssetInfo> {
        self.assets.iter().find(|a| a.address == address)
    }

    /// Returns the default asset, if any are configured.
    #[must_use]
    pub fn default_asset(&self) -> Option<&AssetInfo> {
        self.assets.first()
    }
}

/// The EVM networks this stack knows out of the box.
#[must_use]
pub fn known_networks() -> Vec<NetworkConfig> {
    vec![
        NetworkConfig {
            network: "eip155:84532",
            chain: Eip155ChainReference::new(84532),
            assets: vec![AssetInfo {
                address: address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
                decimals: 6,
                name: "USDC",
                version: "2",
                symbol: "usdc",
            }],
        },
        NetworkConfig {
            network: "eip155:8453",
            chain: Eip155ChainReference::new(8453),
            assets: vec![AssetInfo {
                address: address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
                decimals: 6,
                name: "USD Coin",
                version: "2",
                symbol: "usdc",
            }],
        },
        NetworkConfig {
            network: "eip155:43113",
            chain: Eip155ChainReference::new(43113),
            assets: vec![AssetInfo {
                address: address!("0x5425890298aed601595a70AB815c96711a31Bc65"),
                decimals: 6,
                name: "USD Coin",
                version: "2",
                symbol: "usdc",
            }],
        },
        NetworkConfig {
            network: "eip155:43114",
            chain: Eip155ChainReference::new(43114),
            assets: vec![AssetInfo {
                address: address!("0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E"),
                decimals: 6,
                name: "USDC",
                version: "2",
                symbol: "usdc",
            }],
        },
    ]
}

/// Legacy V1 network names for the known EVM networks.
pub const EVM_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        name: "base-sepolia",
        namespace: "eip155",
        reference: "84532",
    },
    NetworkInfo {
        name: "base",
        namespace: "eip155",
        reference: "8453",
    },
    NetworkInfo {
        name: "avalanche-fuji",
        namespace: "eip155",
        reference: "43113",
    },
    NetworkInfo {
        name: "avalanche",
        namespace: "eip155",
        reference: "43114",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_sepolia_usdc_is_default() {
        let networks = known_networks();
        let base_sepolia = networks
            .iter()
            .find(|n| n.network == "eip155:84532")
            .unwrap();
        let usdc = base_sepolia.default_asset().unwrap();
        assert_eq!(usdc.decimals, 6);
        assert_eq!(usdc.name, "USDC");
        assert_eq!(
            usdc.address,
            address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e")
        );
    }

    #[test]
    fn v1_names_line_up_with_configs() {
        let networks = known_networks();
        for info in EVM_NETWORKS {
            let caip2 = format!("{}:{}", info.namespace, info.reference);
            assert!(networks.iter().any(|n| n.network == caip2), "{caip2}");
        }
    }
}
