//! Facilitator server configuration.
//!
//! Loads a TOML file with `$VAR` / `${VAR}` environment expansion in string
//! values. `HOST` and `PORT` environment variables override the file.
//!
//! # Example
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 4021
//! allow_undeployed_wallets = true
//! hypercore = true
//!
//! [evm."eip155:84532"]
//! rpc_url = "https://sepolia.base.org"
//! signer_private_key = "$SIGNER_KEY_BASE_SEPOLIA"
//!
//! [solana."solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp"]
//! rpc_url = "https://api.mainnet-beta.solana.com"
//! fee_payer_keypair = "$SOLANA_FEE_PAYER"
//! ```

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level facilitator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilitatorConfig {
    /// Bind address (default `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port (default `4021`).
    #[serde(default = "default_port")]
    pub port: u16,

    /// EVM chains keyed by CAIP-2 id.
    #[serde(default)]
    pub evm: HashMap<String, EvmChainConfig>,

    /// Solana clusters keyed by CAIP-2 id.
    #[serde(default)]
    pub solana: HashMap<String, SolanaChainConfig>,

    /// Serve the Hypercore scheme.
    #[serde(default)]
    pub hypercore: bool,

    /// Accept ERC-6492 signatures from undeployed smart accounts.
    #[serde(default = "default_true")]
    pub allow_undeployed_wallets: bool,
}

/// Per-chain configuration for an EVM network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmChainConfig {
    /// HTTP RPC endpoint.
    pub rpc_url: String,

    /// Settlement signer key (hex). Supports `$VAR` expansion.
    pub signer_private_key: String,
}

/// Per-cluster configuration for Solana.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolanaChainConfig {
    /// HTTP RPC endpoint.
    pub rpc_url: String,

    /// Fee payer keypair (base58). Supports `$VAR` expansion.
    pub fee_payer_keypair: String,
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0))
}

const fn default_port() -> u16 {
    4021
}

const fn default_true() -> bool {
    true
}

impl FacilitatorConfig {
    /// Loads configuration from `$CONFIG`, falling back to `config.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = std::env::var("CONFIG").unwrap_or_else(|_| "config.toml".to_owned());
        Self::load_from(&path)
    }

    /// Loads configuration from a specific path. A missing file yields the
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = if Path::new(path).exists() {
            std::fs::read_to_string(path)?
        } else {
            String::new()
        };

        let expanded = expand_env_vars(&content);
        let mut config: Self = toml::from_str(&expanded)?;

        if let Ok(host) = std::env::var("HOST")
            && let Ok(addr) = host.parse()
        {
            config.host = addr;
        }
        if let Ok(port) = std::env::var("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }

        Ok(config)
    }
}

/// Expands `$VAR` and `${VAR}` from the process environment. Unresolved
/// variables stay as-is.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }

        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }

        let mut var_name = String::new();
        while let Some(&c) = chars.peek() {
            if braced {
                if c == '}' {
                    chars.next();
                    break;
                }
            } else if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            var_name.push(c);
            chars.next();
        }

        if var_name.is_empty() {
            result.push('$');
            if braced {
                result.push('{');
            }
        } else if let Ok(value) = std::env::var(&var_name) {
            result.push_str(&value);
        } else {
            result.push('$');
            if braced {
                result.push('{');
            }
            result.push_str(&var_name);
            if braced {
                result.push('}');
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_input() {
        let config: FacilitatorConfig = toml::from_str("").unwrap();
        assert_eq!(config.port, 4021);
        assert!(config.evm.is_empty());
        assert!(config.allow_undeployed_wallets);
        assert!(!config.hypercore);
    }

    #[test]
    fn parses_chain_tables() {
        let config: FacilitatorConfig = toml::from_str(
            r#"
            port = 9000
            hypercore = true

            [evm."eip155:84532"]
            rpc_url = "https://sepolia.base.org"
            signer_private_key = "0xabc"
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.hypercore);
        assert_eq!(
            config.evm["eip155:84532"].rpc_url,
            "https://sepolia.base.org"
        );
    }

    #[test]
    fn env_expansion() {
        // SAFETY: test-local variable name, no concurrent readers care.
        unsafe { std::env::set_var("TOLLBOOTH_TEST_KEY", "0xsecret") };
        assert_eq!(expand_env_vars("key = \"$TOLLBOOTH_TEST_KEY\""), "key = \"0xsecret\"");
        assert_eq!(
            expand_env_vars("key = \"${TOLLBOOTH_TEST_KEY}\""),
            "key = \"0xsecret\""
        );
        assert_eq!(expand_env_vars("$UNSET_VAR_XYZ"), "$UNSET_VAR_XYZ");
    }
}
