//! Known Solana networks and token mints.

use solana_pubkey::{Pubkey, pubkey};
use tollbooth::networks::NetworkInfo;

/// A token mint deployment on one Solana cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvmAssetInfo {
    /// Token mint address.
    pub mint: Pubkey,
    /// Atomic unit precision.
    pub decimals: u8,
    /// Human-readable symbol.
    pub symbol: &'static str,
    /// Whether the mint lives under the Token-2022 program.
    pub token_2022: bool,
}

impl SvmAssetInfo {
    /// Returns the owning token program id.
    #[must_use]
    pub fn token_program(&self) -> Pubkey {
        if self.token_2022 {
            spl_token_2022::id()
        } else {
            spl_token::id()
        }
    }
}

/// One Solana cluster with its default assets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvmNetworkConfig {
    /// CAIP-2 identifier (`solana:<genesis-hash-prefix>`).
    pub network: &'static str,
    /// Token deployments, default first.
    pub assets: Vec<SvmAssetInfo>,
}

impl SvmNetworkConfig {
    /// Finds an asset by mint address.
    #[must_use]
    pub fn find_asset(&self, mint: &Pubkey) -> Option<&SvmAssetInfo> {
        self.assets.iter().find(|a| a.mint == *mint)
    }

    /// Returns the default asset, if any are configured.
    #[must_use]
    pub fn default_asset(&self) -> Option<&SvmAssetInfo> {
        self.assets.first()
    }
}

/// The Solana clusters this stack knows out of the box.
#[must_use]
pub fn known_networks() -> Vec<SvmNetworkConfig> {
    vec![
        SvmNetworkConfig {
            network: "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
            assets: vec![SvmAssetInfo {
                mint: pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"),
                decimals: 6,
                symbol: "usdc",
                token_2022: false,
            }],
        },
        SvmNetworkConfig {
            network: "solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1",
            assets: vec![SvmAssetInfo {
                mint: pubkey!("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU"),
                decimals: 6,
                symbol: "usdc",
                token_2022: false,
            }],
        },
    ]
}

/// Legacy V1 network names for the known Solana clusters.
pub const SOLANA_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        name: "solana",
        namespace: "solana",
        reference: "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
    },
    NetworkInfo {
        name: "solana-devnet",
        namespace: "solana",
        reference: "EtWTRABZaYq6iMfeYKouRu166VU2xqa1",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_usdc_is_default() {
        let networks = known_networks();
        let mainnet = networks
            .iter()
            .find(|n| n.network.starts_with("solana:5eykt4"))
            .unwrap();
        let usdc = mainnet.default_asset().unwrap();
        assert_eq!(usdc.decimals, 6);
        assert_eq!(usdc.token_program(), spl_token::id());
    }
}
