//! Facilitator-side verification and settlement for the EVM `exact` scheme.
//!
//! Capabilities:
//!
//! - signature verification: EOA recovery, ERC-1271 contract signatures,
//!   and ERC-6492 wrapped signatures for counterfactual smart accounts
//! - precondition checks: requirements match, chain, recipient, validity
//!   window (with clock-skew tolerance), value, balance, nonce replay
//! - on-chain settlement via `transferWithAuthorization`

mod contract;
mod error;
mod settle;
mod signature;
mod verify;

pub use contract::{IEIP3009, Sig6492, UniversalSigValidator};
pub use error::EvmExactError;
pub use signature::{EIP6492_MAGIC_SUFFIX, MalformedErc6492Error, StructuredSignature};

use alloy_primitives::{Address, address};
use alloy_provider::Provider;
use serde_json::Value;
use tollbooth::proto::v1::{PaymentPayloadV1, PaymentRequirementsV1};
use tollbooth::proto::{
    PaymentPayload, PaymentRequirements, SettleResponse, VerifyResponse,
};
use tollbooth::scheme::{BoxFuture, SchemeFacilitator, SchemeFacilitatorV1};

use super::{EIP155_FAMILY, SCHEME_EXACT};
use crate::chain::Eip155ChainReference;
use crate::exact::types::Eip3009Payload;
use crate::networks::EVM_NETWORKS;

/// Universal signature validator (EOA, ERC-1271, ERC-6492), deployed at the
/// same address across supported EVM chains. Verification fails closed on
/// chains where it is absent.
pub const VALIDATOR_ADDRESS: Address = address!("0xdAcD51A54883eb67D95FAEb2BBfdC4a9a6BD2a3B");

/// Tunables for the EVM facilitator.
#[derive(Debug, Clone, Copy)]
pub struct EvmFacilitatorConfig {
    /// Accept ERC-6492 wrapped signatures from undeployed smart accounts.
    pub allow_undeployed: bool,
    /// Clock drift tolerated on validity window checks, in seconds.
    pub clock_skew_seconds: u64,
}

impl Default for EvmFacilitatorConfig {
    fn default() -> Self {
        Self {
            allow_undeployed: true,
            clock_skew_seconds: 6,
        }
    }
}

/// Facilitator for the EVM `exact` scheme on one chain.
///
/// The provider must carry a funded wallet: settlement submits the
/// `transferWithAuthorization` transaction and pays its gas.
pub struct ExactEvmFacilitator<P> {
    provider: P,
    chain: Eip155ChainReference,
    signer_address: Address,
    config: EvmFacilitatorConfig,
}

impl<P> std::fmt::Debug for ExactEvmFacilitator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactEvmFacilitator")
            .field("chain", &self.chain)
            .field("signer", &self.signer_address)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<P> ExactEvmFacilitator<P> {
    /// Creates a facilitator for one chain with default config.
    pub fn new(provider: P, chain: Eip155ChainReference, signer_address: Address) -> Self {
        Self::with_config(provider, chain, signer_address, EvmFacilitatorConfig::default())
    }

    /// Creates a facilitator with explicit config.
    pub const fn with_config(
        provider: P,
        chain: Eip155ChainReference,
        signer_address: Address,
        config: EvmFacilitatorConfig,
    ) -> Self {
        Self {
            provider,
            chain,
            signer_address,
            config,
        }
    }

    /// The chain this facilitator settles on.
    #[must_use]
    pub const fn chain(&self) -> Eip155ChainReference {
        self.chain
    }
}

impl<P> ExactEvmFacilitator<P>
where
    P: Provider,
{
    async fn verify_inner(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<Address, EvmExactError> {
        let eip3009: Eip3009Payload = serde_json::from_value(payload.payload.clone())
            .map_err(|e| EvmExactError::InvalidFormat(e.to_string()))?;
        let (payer, _domain) = verify::assert_valid_payment(
            &self.provider,
            self.chain,
            &eip3009,
            payload,
            requirements,
            self.config.clock_skew_seconds,
            self.config.allow_undeployed,
        )
        .await?;
        Ok(payer)
    }

    async fn settle_inner(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, EvmExactError> {
        let eip3009: Eip3009Payload = serde_json::from_value(payload.payload.clone())
            .map_err(|e| EvmExactError::InvalidFormat(e.to_string()))?;
        let (payer, _domain) = verify::assert_valid_payment(
            &self.provider,
            self.chain,
            &eip3009,
            payload,
            requirements,
            self.config.clock_skew_seconds,
            self.config.allow_undeployed,
        )
        .await?;

        let asset: Address = payload
            .accepted
            .asset
            .parse()
            .map_err(|_| EvmExactError::InvalidFormat("asset is not an address".into()))?;
        let tx = settle::settle_payment(&self.provider, asset, &eip3009).await?;

        Ok(SettleResponse::success(
            tx.to_string(),
            payload.accepted.network.clone(),
            payer.to_string(),
        ))
    }
}

impl<P> SchemeFacilitator for ExactEvmFacilitator<P>
where
    P: Provider + Send + Sync + 'static,
{
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn caip_family(&self) -> &str {
        EIP155_FAMILY
    }

    fn get_extra(&self, _network: &str) -> Option<Value> {
        None
    }

    fn get_signers(&self, _network: &str) -> Vec<String> {
        vec![self.signer_address.to_string()]
    }

    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, VerifyResponse> {
        Box::pin(async move {
            match self.verify_inner(payload, requirements).await {
                Ok(payer) => VerifyResponse::valid(payer.to_string()),
                Err(err) => {
                    tracing::debug!(reason = err.reason(), "EVM payment failed verification");
                    err.into_verify_response()
                }
            }
        })
    }

    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, SettleResponse> {
        Box::pin(async move {
            match self.settle_inner(payload, requirements).await {
                Ok(receipt) => receipt,
                Err(err) => SettleResponse::error(err.reason(), payload.network())
                    .with_message(err.to_string()),
            }
        })
    }
}

impl<P> SchemeFacilitatorV1 for ExactEvmFacilitator<P>
where
    P: Provider + Send + Sync + 'static,
{
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn caip_family(&self) -> &str {
        EIP155_FAMILY
    }

    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayloadV1,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, VerifyResponse> {
        Box::pin(async move {
            let (payload, requirements) = match upgrade_v1(payload, requirements) {
                Ok(pair) => pair,
                Err(err) => return err.into_verify_response(),
            };
            SchemeFacilitator::verify(self, &payload, &requirements).await
        })
    }

    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayloadV1,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, SettleResponse> {
        Box::pin(async move {
            let network = payload.network.clone();
            let (payload, requirements) = match upgrade_v1(payload, requirements) {
                Ok(pair) => pair,
                Err(err) => {
                    return SettleResponse::error(err.reason(), network)
                        .with_message(err.to_string());
                }
            };
            SchemeFacilitator::settle(self, &payload, &requirements).await
        })
    }
}

/// Lifts a V1 payment into the V2 in-memory model so one verification path
/// serves both wire formats.
fn upgrade_v1(
    payload: &PaymentPayloadV1,
    requirements: &PaymentRequirementsV1,
) -> Result<(PaymentPayload, PaymentRequirements), EvmExactError> {
    let caip2 = EVM_NETWORKS
        .iter()
        .find(|n| n.name == requirements.network)
        .map(|n| format!("{}:{}", n.namespace, n.reference))
        .ok_or_else(|| {
            EvmExactError::InvalidFormat(format!("unknown network name: {}", requirements.network))
        })?;

    let v2_requirements = PaymentRequirements {
        scheme: requirements.scheme.clone(),
        network: caip2,
        amount: requirements.max_amount_required.clone(),
        pay_to: requirements.pay_to.clone(),
        max_timeout_seconds: requirements.max_timeout_seconds,
        asset: requirements.asset.clone(),
        extra: requirements.extra.clone(),
    };

    let v2_payload = PaymentPayload {
        x402_version: 2,
        accepted: v2_requirements.clone(),
        payload: payload.payload.clone(),
        resource: None,
        extensions: None,
    };

    Ok((v2_payload, v2_requirements))
}
