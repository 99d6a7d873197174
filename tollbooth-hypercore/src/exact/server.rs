//! Server-side price parsing and requirement enhancement for Hypercore.

use serde_json::Value;
use tollbooth::amount::parse_price_value;
use tollbooth::proto::{PaymentRequirements, SupportedKind};
use tollbooth::scheme::{AssetAmount, SchemeError, SchemeServer};

use super::SCHEME_EXACT;
use crate::action::SIGNATURE_CHAIN_ID;
use crate::networks::{USDH, is_mainnet};

/// Server implementation of the `exact` scheme for Hypercore.
///
/// Prices resolve against USDH (8 wei-decimals); enhancement flags the
/// signature chain and whether the target is mainnet.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactHypercoreServer;

impl ExactHypercoreServer {
    /// Creates the server scheme.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SchemeServer for ExactHypercoreServer {
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn parse_price(&self, price: &Value, network: &str) -> Result<AssetAmount, SchemeError> {
        if is_mainnet(network).is_none() {
            return Err(format!("unknown network: {network}").into());
        }
        let parsed = parse_price_value(price, USDH.token, USDH.decimals)
            .map_err(|e| -> SchemeError { format!("Invalid money format: {e}").into() })?;
        Ok(parsed)
    }

    fn enhance_payment_requirements(
        &self,
        mut requirements: PaymentRequirements,
        _supported_kind: &SupportedKind,
        _extensions: &[String],
    ) -> PaymentRequirements {
        let Some(mainnet) = is_mainnet(&requirements.network) else {
            return requirements;
        };
        let extra = requirements
            .extra
            .get_or_insert_with(|| Value::Object(serde_json::Map::new()));
        if let Some(extra) = extra.as_object_mut() {
            extra.insert("signatureChainId".into(), SIGNATURE_CHAIN_ID.into());
            extra.insert("isMainnet".into(), mainnet.into());
        }
        requirements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networks::{NETWORK_MAINNET, NETWORK_TESTNET};
    use serde_json::json;

    fn requirements(network: &str) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: network.into(),
            amount: "100000".into(),
            pay_to: "0x0987654321098765432109876543210987654321".into(),
            max_timeout_seconds: 3600,
            asset: USDH.token.into(),
            extra: None,
        }
    }

    fn kind(network: &str) -> SupportedKind {
        SupportedKind {
            x402_version: 2,
            scheme: "exact".into(),
            network: network.into(),
            extra: None,
        }
    }

    #[test]
    fn parses_dollar_string() {
        let server = ExactHypercoreServer::new();
        let result = server.parse_price(&json!("$0.01"), NETWORK_MAINNET).unwrap();
        assert_eq!(result.amount, "1000000");
        assert_eq!(result.asset, USDH.token);
    }

    #[test]
    fn parses_numeric_inputs() {
        let server = ExactHypercoreServer::new();
        assert_eq!(
            server.parse_price(&json!("0.05"), NETWORK_MAINNET).unwrap().amount,
            "5000000"
        );
        assert_eq!(
            server.parse_price(&json!(0.1), NETWORK_MAINNET).unwrap().amount,
            "10000000"
        );
    }

    #[test]
    fn structured_amount_passes_through() {
        let server = ExactHypercoreServer::new();
        let price = json!({"amount": "123456", "asset": USDH.token});
        let result = server.parse_price(&price, NETWORK_MAINNET).unwrap();
        assert_eq!(result.amount, "123456");
        assert_eq!(result.asset, USDH.token);
    }

    #[test]
    fn rejects_invalid_format() {
        let server = ExactHypercoreServer::new();
        let err = server.parse_price(&json!("invalid"), NETWORK_MAINNET).unwrap_err();
        assert!(err.to_string().contains("Invalid money format"));
    }

    #[test]
    fn enhancement_flags_mainnet() {
        let server = ExactHypercoreServer::new();
        let enhanced = server.enhance_payment_requirements(
            requirements(NETWORK_MAINNET),
            &kind(NETWORK_MAINNET),
            &[],
        );
        let extra = enhanced.extra.unwrap();
        assert_eq!(extra["signatureChainId"], 999);
        assert_eq!(extra["isMainnet"], true);
    }

    #[test]
    fn enhancement_detects_testnet() {
        let server = ExactHypercoreServer::new();
        let enhanced = server.enhance_payment_requirements(
            requirements(NETWORK_TESTNET),
            &kind(NETWORK_TESTNET),
            &[],
        );
        let extra = enhanced.extra.unwrap();
        assert_eq!(extra["signatureChainId"], 999);
        assert_eq!(extra["isMainnet"], false);
    }

    #[test]
    fn enhancement_preserves_existing_extra() {
        let server = ExactHypercoreServer::new();
        let mut req = requirements(NETWORK_MAINNET);
        req.extra = Some(json!({"customField": "customValue"}));
        let enhanced =
            server.enhance_payment_requirements(req, &kind(NETWORK_MAINNET), &[]);
        let extra = enhanced.extra.unwrap();
        assert_eq!(extra["customField"], "customValue");
        assert_eq!(extra["signatureChainId"], 999);
        assert_eq!(extra["isMainnet"], true);
    }
}
