//! Verification preconditions and signature checking.

use alloy_primitives::{Address, B256, U256};
use alloy_provider::Provider;
use alloy_sol_types::{Eip712Domain, SolStruct, eip712_domain};
use tollbooth::proto::{PaymentPayload, PaymentRequirements, UnixTimestamp};

use super::contract::{IEIP3009, UniversalSigValidator};
use super::error::EvmExactError;
use super::signature::StructuredSignature;
use super::VALIDATOR_ADDRESS;
use crate::chain::Eip155ChainReference;
use crate::exact::types::{Eip3009Payload, RequirementsExtra, TransferWithAuthorization};

/// Checks the five protocol-critical fields between the payload's accepted
/// requirements and the server's.
///
/// `maxTimeoutSeconds` and `extra` are deliberately excluded so facilitator
/// enrichment never causes a false-negative rejection.
pub(super) fn assert_requirements_match(
    accepted: &PaymentRequirements,
    requirements: &PaymentRequirements,
) -> Result<(), EvmExactError> {
    if accepted.scheme == requirements.scheme
        && accepted.network == requirements.network
        && accepted.amount == requirements.amount
        && accepted.asset == requirements.asset
        && accepted.pay_to == requirements.pay_to
    {
        Ok(())
    } else {
        Err(EvmExactError::RequirementsMismatch)
    }
}

/// Checks the authorization validity window against the current time,
/// allowing `clock_skew` seconds of drift on both bounds.
pub(super) fn assert_time(
    valid_after: UnixTimestamp,
    valid_before: UnixTimestamp,
    clock_skew: u64,
) -> Result<(), EvmExactError> {
    let now = UnixTimestamp::now();
    if valid_before < now + clock_skew {
        return Err(EvmExactError::Expired);
    }
    if valid_after > now + clock_skew {
        return Err(EvmExactError::Early);
    }
    Ok(())
}

/// Checks that the authorized value covers the required amount.
pub(super) fn assert_enough_value(sent: U256, required: U256) -> Result<(), EvmExactError> {
    if sent < required {
        Err(EvmExactError::InsufficientValue)
    } else {
        Ok(())
    }
}

/// Checks the payer's on-chain token balance.
pub(super) async fn assert_enough_balance<P: Provider>(
    contract: &IEIP3009::IEIP3009Instance<P>,
    payer: Address,
    required: U256,
) -> Result<(), EvmExactError> {
    let balance = contract.balanceOf(payer).call().await?;
    if balance < required {
        Err(EvmExactError::InsufficientFunds)
    } else {
        Ok(())
    }
}

/// Checks that the authorization nonce is still unspent on-chain.
pub(super) async fn assert_nonce_unused<P: Provider>(
    contract: &IEIP3009::IEIP3009Instance<P>,
    authorizer: Address,
    nonce: B256,
) -> Result<(), EvmExactError> {
    let used = contract.authorizationState(authorizer, nonce).call().await?;
    if used {
        Err(EvmExactError::NonceAlreadyUsed)
    } else {
        Ok(())
    }
}

/// Builds the token's EIP-712 domain.
///
/// Uses the name/version the requirement's `extra` carries; falls back to
/// on-chain `name()`/`version()` queries when absent.
pub(super) async fn resolve_domain<P: Provider>(
    chain: Eip155ChainReference,
    contract: &IEIP3009::IEIP3009Instance<P>,
    asset: Address,
    extra: Option<&RequirementsExtra>,
) -> Result<Eip712Domain, EvmExactError> {
    let (name, version) = match extra {
        Some(extra) => (extra.name.clone(), extra.version.clone()),
        None => {
            let name = contract.name().call().await?;
            let version = contract.version().call().await?;
            (name, version)
        }
    };
    Ok(eip712_domain! {
        name: name,
        version: version,
        chain_id: chain.inner(),
        verifying_contract: asset,
    })
}

/// Recomputes the typed-data hash the payer signed.
#[must_use]
pub(super) fn authorization_hash(payment: &Eip3009Payload, domain: &Eip712Domain) -> B256 {
    let auth = &payment.authorization;
    let typed = TransferWithAuthorization {
        from: auth.from,
        to: auth.to,
        value: auth.value.into(),
        validAfter: U256::from(auth.valid_after.as_secs()),
        validBefore: U256::from(auth.valid_before.as_secs()),
        nonce: auth.nonce,
    };
    typed.eip712_signing_hash(domain)
}

/// Verifies the signature against the recomputed typed-data hash.
///
/// EOA signatures are checked by recovery. ERC-6492 wrapped and ERC-1271
/// signatures go to the universal validator contract via `eth_call`; a call
/// failure or a non-true return is a rejection, never a propagated error.
///
/// ERC-6492 wrappers are only attempted when `allow_undeployed` is set.
pub(super) async fn verify_signature<P: Provider>(
    provider: &P,
    payment: &Eip3009Payload,
    domain: &Eip712Domain,
    allow_undeployed: bool,
) -> Result<Address, EvmExactError> {
    let payer = payment.authorization.from;
    let hash = authorization_hash(payment, domain);
    let structured = StructuredSignature::classify(payment.signature.clone(), payer, &hash)?;

    match structured {
        StructuredSignature::Eoa(_) => Ok(payer),
        StructuredSignature::Erc6492 { original, .. } => {
            if !allow_undeployed {
                return Err(EvmExactError::UndeployedWalletRejected);
            }
            validator_says_valid(provider, payer, hash, original).await?;
            Ok(payer)
        }
        StructuredSignature::Erc1271(bytes) => {
            validator_says_valid(provider, payer, hash, bytes).await?;
            Ok(payer)
        }
    }
}

/// Calls the universal validator. Any failure mode — revert, transport
/// error, or a `false` return — yields [`EvmExactError::InvalidSignature`].
async fn validator_says_valid<P: Provider>(
    provider: &P,
    signer: Address,
    hash: B256,
    signature: alloy_primitives::Bytes,
) -> Result<(), EvmExactError> {
    let validator = UniversalSigValidator::new(VALIDATOR_ADDRESS, provider);
    let verdict = validator
        .isValidSigWithSideEffects(signer, hash, signature)
        .call()
        .await;
    match verdict {
        Ok(true) => Ok(()),
        Ok(false) => Err(EvmExactError::InvalidSignature(
            "chain reported signature to be invalid".into(),
        )),
        Err(err) => {
            tracing::debug!(error = %err, "universal validator call failed");
            Err(EvmExactError::InvalidSignature(
                "validator call failed".into(),
            ))
        }
    }
}

/// Runs every precondition for an EIP-3009 payment and returns the verified
/// payer plus the resolved domain.
pub(super) async fn assert_valid_payment<P: Provider>(
    provider: &P,
    chain: Eip155ChainReference,
    eip3009: &Eip3009Payload,
    payload: &PaymentPayload,
    requirements: &PaymentRequirements,
    clock_skew: u64,
    allow_undeployed: bool,
) -> Result<(Address, Eip712Domain), EvmExactError> {
    let accepted = &payload.accepted;
    assert_requirements_match(accepted, requirements)?;

    if accepted.network != chain.caip2() {
        return Err(EvmExactError::ChainMismatch);
    }

    let pay_to: Address = accepted
        .pay_to
        .parse()
        .map_err(|_| EvmExactError::InvalidFormat("payTo is not an address".into()))?;
    if eip3009.authorization.to != pay_to {
        return Err(EvmExactError::RecipientMismatch);
    }

    assert_time(
        eip3009.authorization.valid_after,
        eip3009.authorization.valid_before,
        clock_skew,
    )?;

    let required: U256 = accepted
        .amount
        .parse::<crate::chain::TokenAmount>()
        .map_err(|_| EvmExactError::InvalidFormat("amount is not an integer".into()))?
        .into();
    assert_enough_value(eip3009.authorization.value.into(), required)?;

    let asset: Address = accepted
        .asset
        .parse()
        .map_err(|_| EvmExactError::InvalidFormat("asset is not an address".into()))?;
    let contract = IEIP3009::new(asset, provider);

    assert_nonce_unused(&contract, eip3009.authorization.from, eip3009.authorization.nonce)
        .await?;
    assert_enough_balance(&contract, eip3009.authorization.from, required).await?;

    let extra: Option<RequirementsExtra> = accepted
        .extra
        .as_ref()
        .and_then(|v| serde_json::from_value(v.clone()).ok());
    let domain = resolve_domain(chain, &contract, asset, extra.as_ref()).await?;

    let payer = verify_signature(provider, eip3009, &domain, allow_undeployed).await?;
    Ok((payer, domain))
}
