//! Server-side price parsing and requirement enhancement for EVM.

use serde_json::Value;
use tollbooth::amount::parse_price_value;
use tollbooth::proto::{PaymentRequirements, SupportedKind};
use tollbooth::scheme::{AssetAmount, SchemeError, SchemeServer};

use super::SCHEME_EXACT;
use crate::networks::{NetworkConfig, known_networks};

/// Server implementation of the `exact` scheme for EVM networks.
///
/// Converts money-string prices into atomic USDC amounts and injects the
/// EIP-712 domain parameters clients need to sign without an RPC call.
pub struct ExactEvmServer {
    networks: Vec<NetworkConfig>,
}

impl ExactEvmServer {
    /// Creates a server scheme covering the known EVM networks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            networks: known_networks(),
        }
    }

    /// Creates a server scheme with custom network configurations.
    #[must_use]
    pub const fn with_networks(networks: Vec<NetworkConfig>) -> Self {
        Self { networks }
    }

    fn find_network(&self, network: &str) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.network == network)
    }
}

impl Default for ExactEvmServer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExactEvmServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactEvmServer")
            .field("networks", &self.networks.len())
            .finish_non_exhaustive()
    }
}

impl SchemeServer for ExactEvmServer {
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn parse_price(&self, price: &Value, network: &str) -> Result<AssetAmount, SchemeError> {
        let config = self
            .find_network(network)
            .ok_or_else(|| -> SchemeError { format!("unknown network: {network}").into() })?;
        let asset = config
            .default_asset()
            .ok_or_else(|| -> SchemeError { format!("no default asset for {network}").into() })?;

        let parsed = parse_price_value(price, &format!("{:?}", asset.address), asset.decimals)?;
        Ok(parsed)
    }

    fn enhance_payment_requirements(
        &self,
        mut requirements: PaymentRequirements,
        _supported_kind: &SupportedKind,
        _extensions: &[String],
    ) -> PaymentRequirements {
        let Some(config) = self.find_network(&requirements.network) else {
            return requirements;
        };

        if requirements.asset.is_empty()
            && let Some(default_asset) = config.default_asset()
        {
            requirements.asset = format!("{:?}", default_asset.address);
        }

        let asset_info = requirements
            .asset
            .parse()
            .ok()
            .and_then(|addr| config.find_asset(addr));

        // Inject EIP-712 domain params without clobbering explicit values.
        if let Some(info) = asset_info {
            let extra = requirements
                .extra
                .get_or_insert_with(|| Value::Object(serde_json::Map::new()));
            if let Some(extra) = extra.as_object_mut() {
                extra
                    .entry("name")
                    .or_insert_with(|| Value::String(info.name.to_owned()));
                extra
                    .entry("version")
                    .or_insert_with(|| Value::String(info.version.to_owned()));
            }
        }

        requirements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dollar_price_on_base_sepolia() {
        let server = ExactEvmServer::new();
        let parsed = server.parse_price(&json!("$0.001"), "eip155:84532").unwrap();
        assert_eq!(parsed.amount, "1000");
        assert_eq!(parsed.asset, "0x036CbD53842c5426634e7929541eC2318f3dCF7e");
    }

    #[test]
    fn unknown_network_is_an_error() {
        let server = ExactEvmServer::new();
        assert!(server.parse_price(&json!("$1.00"), "eip155:999999").is_err());
    }

    #[test]
    fn enhancement_adds_domain_params() {
        let server = ExactEvmServer::new();
        let requirements = PaymentRequirements {
            scheme: "exact".into(),
            network: "eip155:84532".into(),
            amount: "1000".into(),
            pay_to: "0x1111111111111111111111111111111111111111".into(),
            max_timeout_seconds: 300,
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
            extra: None,
        };
        let kind = SupportedKind {
            x402_version: 2,
            scheme: "exact".into(),
            network: "eip155:84532".into(),
            extra: None,
        };

        let enhanced = server.enhance_payment_requirements(requirements, &kind, &[]);
        let extra = enhanced.extra.unwrap();
        assert_eq!(extra["name"], "USDC");
        assert_eq!(extra["version"], "2");
    }

    #[test]
    fn enhancement_preserves_existing_extra() {
        let server = ExactEvmServer::new();
        let requirements = PaymentRequirements {
            scheme: "exact".into(),
            network: "eip155:84532".into(),
            amount: "1000".into(),
            pay_to: "0x1111111111111111111111111111111111111111".into(),
            max_timeout_seconds: 300,
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
            extra: Some(json!({"name": "Custom", "other": 1})),
        };
        let kind = SupportedKind {
            x402_version: 2,
            scheme: "exact".into(),
            network: "eip155:84532".into(),
            extra: None,
        };

        let enhanced = server.enhance_payment_requirements(requirements, &kind, &[]);
        let extra = enhanced.extra.unwrap();
        assert_eq!(extra["name"], "Custom");
        assert_eq!(extra["other"], 1);
        assert_eq!(extra["version"], "2");
    }
}
