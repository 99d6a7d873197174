//! On-chain settlement for the EVM `exact` scheme.

use alloy_primitives::{Address, TxHash, U256};
use alloy_provider::Provider;

use super::contract::IEIP3009;
use super::error::EvmExactError;
use crate::exact::types::Eip3009Payload;

/// Submits `transferWithAuthorization` for a verified payment and waits for
/// the receipt.
///
/// Uses the bytes-signature overload so EOA, ERC-1271, and unwrapped
/// ERC-6492 signatures all settle through the same call.
pub(super) async fn settle_payment<P: Provider>(
    provider: &P,
    asset: Address,
    payment: &Eip3009Payload,
) -> Result<TxHash, EvmExactError> {
    let auth = &payment.authorization;
    let contract = IEIP3009::new(asset, provider);

    let pending = contract
        .transferWithAuthorization_0(
            auth.from,
            auth.to,
            auth.value.into(),
            U256::from(auth.valid_after.as_secs()),
            U256::from(auth.valid_before.as_secs()),
            auth.nonce,
            payment.signature.clone(),
        )
        .send()
        .await
        .map_err(|e| EvmExactError::Settlement(e.to_string()))?;

    let receipt = pending
        .get_receipt()
        .await
        .map_err(|e| EvmExactError::Settlement(e.to_string()))?;

    if !receipt.status() {
        return Err(EvmExactError::Settlement(format!(
            "transaction {} reverted",
            receipt.transaction_hash
        )));
    }

    tracing::info!(
        tx = %receipt.transaction_hash,
        from = %auth.from,
        to = %auth.to,
        value = %auth.value,
        "settled EIP-3009 payment"
    );

    Ok(receipt.transaction_hash)
}
