//! Client-side signing for the EVM `exact` scheme.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{SolStruct, eip712_domain};
use rand::Rng;
use serde_json::Value;
use tollbooth::networks::NetworkRegistry;
use tollbooth::proto::v1::PaymentRequirementsV1;
use tollbooth::proto::{PaymentRequirements, UnixTimestamp};
use tollbooth::scheme::{BoxFuture, SchemeClient, SchemeClientV1, SchemeError};

use super::types::{Eip3009Authorization, Eip3009Payload, RequirementsExtra,
    TransferWithAuthorization};
use super::SCHEME_EXACT;
use crate::chain::{Eip155ChainReference, TokenAmount};
use crate::networks::EVM_NETWORKS;
use crate::signer::SignerLike;

/// Everything needed to sign one ERC-3009 authorization.
#[derive(Debug, Clone)]
struct SigningParams {
    chain_id: u64,
    asset: Address,
    pay_to: Address,
    amount: U256,
    max_timeout_seconds: u64,
    extra: Option<RequirementsExtra>,
}

impl SigningParams {
    fn from_v2(requirements: &PaymentRequirements) -> Result<Self, SchemeError> {
        let chain: Eip155ChainReference = requirements.network.parse()?;
        Ok(Self {
            chain_id: chain.inner(),
            asset: requirements.asset.parse()?,
            pay_to: requirements.pay_to.parse()?,
            amount: requirements.amount.parse::<TokenAmount>()?.into(),
            max_timeout_seconds: requirements.max_timeout_seconds,
            extra: parse_extra(requirements.extra.as_ref()),
        })
    }

    fn from_v1(
        requirements: &PaymentRequirementsV1,
        registry: &NetworkRegistry,
    ) -> Result<Self, SchemeError> {
        let caip2 = registry
            .caip2_by_name(&requirements.network)
            .ok_or_else(|| -> SchemeError {
                format!("unknown network name: {}", requirements.network).into()
            })?;
        let chain: Eip155ChainReference = caip2.parse()?;
        Ok(Self {
            chain_id: chain.inner(),
            asset: requirements.asset.parse()?,
            pay_to: requirements.pay_to.parse()?,
            amount: requirements
                .max_amount_required
                .parse::<TokenAmount>()?
                .into(),
            max_timeout_seconds: requirements.max_timeout_seconds,
            extra: parse_extra(requirements.extra.as_ref()),
        })
    }
}

fn parse_extra(extra: Option<&Value>) -> Option<RequirementsExtra> {
    extra.and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// Signs an ERC-3009 `TransferWithAuthorization` under the token's EIP-712
/// domain.
///
/// The authorization is valid immediately (`validAfter = 0`) and expires
/// `max_timeout_seconds` from now. The nonce is 32 random bytes.
///
/// # Errors
///
/// Returns an error if signing fails.
async fn sign_authorization<S: SignerLike>(
    signer: &S,
    params: &SigningParams,
) -> Result<Eip3009Payload, SchemeError> {
    let (name, version) = params.extra.as_ref().map_or_else(
        || (String::new(), String::new()),
        |extra| (extra.name.clone(), extra.version.clone()),
    );

    let domain = eip712_domain! {
        name: name,
        version: version,
        chain_id: params.chain_id,
        verifying_contract: params.asset,
    };

    let valid_after = UnixTimestamp::from_secs(0);
    let valid_before = UnixTimestamp::now() + params.max_timeout_seconds;
    let nonce: [u8; 32] = rand::rng().random();
    let nonce = B256::from(nonce);

    let authorization = Eip3009Authorization {
        from: signer.address(),
        to: params.pay_to,
        value: TokenAmount(params.amount),
        valid_after,
        valid_before,
        nonce,
    };

    // The facilitator rebuilds this struct from the authorization fields to
    // verify the signature, so the two must agree byte for byte.
    let typed = TransferWithAuthorization {
        from: authorization.from,
        to: authorization.to,
        value: params.amount,
        validAfter: U256::from(valid_after.as_secs()),
        validBefore: U256::from(valid_before.as_secs()),
        nonce,
    };

    let hash = typed.eip712_signing_hash(&domain);
    let signature = signer
        .sign_hash(&hash)
        .await
        .map_err(|e| -> SchemeError { format!("signing failed: {e}").into() })?;

    Ok(Eip3009Payload {
        signature: signature.as_bytes().into(),
        authorization,
    })
}

/// Client for the EVM `exact` scheme.
///
/// Register it on a `PaymentClient` under `"eip155:*"` (or a specific
/// network) to pay EIP-3009 requirements.
#[derive(Debug)]
pub struct ExactEvmClient<S> {
    signer: S,
    registry: NetworkRegistry,
}

impl<S> ExactEvmClient<S> {
    /// Creates a new client with the given signer.
    #[must_use]
    pub fn new(signer: S) -> Self {
        Self {
            signer,
            registry: NetworkRegistry::from_networks(EVM_NETWORKS),
        }
    }

    /// Replaces the V1 network-name registry.
    #[must_use]
    pub fn with_registry(mut self, registry: NetworkRegistry) -> Self {
        self.registry = registry;
        self
    }
}

impl<S> SchemeClient for ExactEvmClient<S>
where
    S: SignerLike + 'static,
{
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn create_payment_payload<'a>(
        &'a self,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<Value, SchemeError>> {
        Box::pin(async move {
            let params = SigningParams::from_v2(requirements)?;
            let payload = sign_authorization(&self.signer, &params).await?;
            Ok(serde_json::to_value(payload)?)
        })
    }
}

impl<S> SchemeClientV1 for ExactEvmClient<S>
where
    S: SignerLike + 'static,
{
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn create_payment_payload<'a>(
        &'a self,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, Result<Value, SchemeError>> {
        Box::pin(async move {
            let params = SigningParams::from_v1(requirements, &self.registry)?;
            let payload = sign_authorization(&self.signer, &params).await?;
            Ok(serde_json::to_value(payload)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Signature;
    use alloy_signer_local::PrivateKeySigner;
    use alloy_sol_types::SolStruct;

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: "eip155:84532".into(),
            amount: "1000".into(),
            pay_to: "0x1111111111111111111111111111111111111111".into(),
            max_timeout_seconds: 300,
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
            extra: Some(serde_json::json!({"name": "USDC", "version": "2"})),
        }
    }

    #[tokio::test]
    async fn signed_authorization_recovers_to_signer() {
        let signer = PrivateKeySigner::random();
        let expected = SignerLike::address(&signer);
        let client = ExactEvmClient::new(signer);

        let value = SchemeClient::create_payment_payload(&client, &requirements())
            .await
            .unwrap();
        let payload: Eip3009Payload = serde_json::from_value(value).unwrap();

        assert_eq!(payload.authorization.from, expected);
        assert_eq!(
            payload.authorization.to,
            requirements().pay_to.parse::<Address>().unwrap()
        );
        assert_eq!(payload.authorization.valid_after.as_secs(), 0);
        assert!(payload.authorization.valid_before > UnixTimestamp::now());
        assert_eq!(payload.signature.len(), 65);

        // Recover the signer from the typed-data hash the facilitator builds.
        let domain = eip712_domain! {
            name: "USDC",
            version: "2",
            chain_id: 84532u64,
            verifying_contract: requirements().asset.parse().unwrap(),
        };
        let typed = TransferWithAuthorization {
            from: payload.authorization.from,
            to: payload.authorization.to,
            value: payload.authorization.value.into(),
            validAfter: U256::from(payload.authorization.valid_after.as_secs()),
            validBefore: U256::from(payload.authorization.valid_before.as_secs()),
            nonce: payload.authorization.nonce,
        };
        let hash = typed.eip712_signing_hash(&domain);
        let signature = Signature::from_raw(&payload.signature).unwrap();
        let recovered = signature.recover_address_from_prehash(&hash).unwrap();
        assert_eq!(recovered, expected);
    }

    #[tokio::test]
    async fn nonces_are_unique_per_payload() {
        let client = ExactEvmClient::new(PrivateKeySigner::random());
        let a = SchemeClient::create_payment_payload(&client, &requirements())
            .await
            .unwrap();
        let b = SchemeClient::create_payment_payload(&client, &requirements())
            .await
            .unwrap();
        assert_ne!(a["authorization"]["nonce"], b["authorization"]["nonce"]);
    }

    #[tokio::test]
    async fn rejects_non_evm_network() {
        let client = ExactEvmClient::new(PrivateKeySigner::random());
        let mut req = requirements();
        req.network = "solana:mainnet".into();
        assert!(
            SchemeClient::create_payment_payload(&client, &req)
                .await
                .is_err()
        );
    }
}
