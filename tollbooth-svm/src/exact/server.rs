//! Server-side price parsing and requirement enhancement for Solana.

use serde_json::Value;
use tollbooth::amount::parse_price_value;
use tollbooth::proto::{PaymentRequirements, SupportedKind};
use tollbooth::scheme::{AssetAmount, SchemeError, SchemeServer};

use super::SCHEME_EXACT;
use crate::networks::{SvmNetworkConfig, known_networks};

/// Server implementation of the `exact` scheme for Solana clusters.
///
/// Prices resolve against the cluster's default USDC mint; enhancement
/// copies the facilitator's nominated fee payer into requirement `extra` so
/// clients can compile the transaction.
pub struct ExactSvmServer {
    networks: Vec<SvmNetworkConfig>,
}

impl ExactSvmServer {
    /// Creates a server scheme covering the known Solana clusters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            networks: known_networks(),
        }
    }

    /// Creates a server scheme with custom network configurations.
    #[must_use]
    pub const fn with_networks(networks: Vec<SvmNetworkConfig>) -> Self {
        Self { networks }
    }
}

impl Default for ExactSvmServer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExactSvmServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactSvmServer")
            .field("networks", &self.networks.len())
            .finish_non_exhaustive()
    }
}

impl SchemeServer for ExactSvmServer {
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn parse_price(&self, price: &Value, network: &str) -> Result<AssetAmount, SchemeError> {
        let config = self
            .networks
            .iter()
            .find(|n| n.network == network)
            .ok_or_else(|| -> SchemeError { format!("unknown network: {network}").into() })?;
        let asset = config
            .default_asset()
            .ok_or_else(|| -> SchemeError { format!("no default asset for {network}").into() })?;

        let parsed = parse_price_value(price, &asset.mint.to_string(), asset.decimals)?;
        Ok(parsed)
    }

    fn enhance_payment_requirements(
        &self,
        mut requirements: PaymentRequirements,
        supported_kind: &SupportedKind,
        _extensions: &[String],
    ) -> PaymentRequirements {
        // Propagate the facilitator's fee payer into the client-visible extra.
        let fee_payer = supported_kind
            .extra
            .as_ref()
            .and_then(|v| v.get("feePayer"))
            .cloned();
        if let Some(fee_payer) = fee_payer {
            let extra = requirements
                .extra
                .get_or_insert_with(|| Value::Object(serde_json::Map::new()));
            if let Some(extra) = extra.as_object_mut() {
                extra.entry("feePayer").or_insert(fee_payer);
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
    fn price_resolves_against_mainnet_usdc() {
        let server = ExactSvmServer::new();
        let parsed = server
            .parse_price(&json!("$0.01"), "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp")
            .unwrap();
        assert_eq!(parsed.amount, "10000");
        assert_eq!(parsed.asset, "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");
    }

    #[test]
    fn enhancement_copies_fee_payer() {
        let server = ExactSvmServer::new();
        let requirements = PaymentRequirements {
            scheme: "exact".into(),
            network: "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp".into(),
            amount: "10000".into(),
            pay_to: "11111111111111111111111111111111".into(),
            max_timeout_seconds: 60,
            asset: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".into(),
            extra: None,
        };
        let kind = SupportedKind {
            x402_version: 2,
            scheme: "exact".into(),
            network: "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp".into(),
            extra: Some(json!({"feePayer": "FeePayer1111111111111111111111111111111111"})),
        };

        let enhanced = server.enhance_payment_requirements(requirements, &kind, &[]);
        assert_eq!(
            enhanced.extra.unwrap()["feePayer"],
            "FeePayer1111111111111111111111111111111111"
        );
    }
}
