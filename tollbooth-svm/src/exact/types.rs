//! Wire types for the Solana `exact` scheme.

use serde::{Deserialize, Serialize};
use solana_message::VersionedMessage;
use solana_pubkey::Pubkey;
use solana_transaction::versioned::VersionedTransaction;

use crate::chain::SvmAddress;

/// Inner payload of a Solana `exact` payment: the serialized, payer-signed
/// transaction awaiting the facilitator's fee-payer signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactSolanaPayload {
    /// Base64-encoded bincode serialization of the transaction.
    pub transaction: String,
}

/// Requirement `extra` for Solana: the facilitator nominates who pays fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeePayerExtra {
    /// Account that signs for and pays the transaction fee.
    pub fee_payer: SvmAddress,
}

/// A `transfer_checked` instruction decoded out of a payment transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferDetails {
    /// Source token account.
    pub source: Pubkey,
    /// Token mint.
    pub mint: Pubkey,
    /// Destination token account.
    pub destination: Pubkey,
    /// Transfer authority (the payer's wallet).
    pub authority: Pubkey,
    /// Amount in atomic units.
    pub amount: u64,
    /// Mint decimals as asserted by the instruction.
    pub decimals: u8,
}

/// SPL Token `TransferChecked` instruction discriminator.
const TRANSFER_CHECKED_TAG: u8 = 12;

/// Finds and decodes the `transfer_checked` instruction in a transaction.
///
/// Scans compiled instructions for one owned by `token_program` whose data
/// starts with the `TransferChecked` tag, then resolves its accounts.
#[must_use]
pub fn find_transfer_checked(
    tx: &VersionedTransaction,
    token_program: &Pubkey,
) -> Option<TransferDetails> {
    let message: &VersionedMessage = &tx.message;
    let keys = message.static_account_keys();

    for instruction in message.instructions() {
        let program = keys.get(instruction.program_id_index as usize)?;
        if program != token_program {
            continue;
        }
        if instruction.data.first().copied() != Some(TRANSFER_CHECKED_TAG) {
            continue;
        }
        // Layout: tag (1) + amount u64 LE (8) + decimals (1).
        if instruction.data.len() < 10 || instruction.accounts.len() < 4 {
            continue;
        }
        let amount = u64::from_le_bytes(instruction.data[1..9].try_into().ok()?);
        let decimals = instruction.data[9];

        let account = |i: usize| -> Option<Pubkey> {
            keys.get(*instruction.accounts.get(i)? as usize).copied()
        };

        return Some(TransferDetails {
            source: account(0)?,
            mint: account(1)?,
            destination: account(2)?,
            authority: account(3)?,
            amount,
            decimals,
        });
    }
    None
}
