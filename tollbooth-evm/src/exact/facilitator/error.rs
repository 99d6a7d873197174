//! Facilitator error taxonomy for the EVM `exact` scheme.

use tollbooth::proto::VerifyResponse;

use super::signature::MalformedErc6492Error;

/// Reasons an EVM `exact` payment fails verification or settlement.
///
/// At the scheme boundary every variant folds into a response object;
/// nothing here escapes as an exception.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EvmExactError {
    /// The inner payload did not parse as an EIP-3009 payment.
    #[error("invalid payload format: {0}")]
    InvalidFormat(String),

    /// The payload's accepted requirements do not match the server's.
    #[error("accepted does not match payment requirements")]
    RequirementsMismatch,

    /// The payment targets a different chain than this facilitator serves.
    #[error("payment chain does not match requirements")]
    ChainMismatch,

    /// The authorization recipient is not the required `payTo`.
    #[error("payment recipient does not match requirements")]
    RecipientMismatch,

    /// The authorization window has expired.
    #[error("payment authorization is expired")]
    Expired,

    /// The authorization window has not opened yet.
    #[error("payment authorization is not yet valid")]
    Early,

    /// The authorized value is below the required amount.
    #[error("payment amount is insufficient")]
    InsufficientValue,

    /// The payer's on-chain balance cannot cover the amount.
    #[error("onchain balance is not enough to cover the payment amount")]
    InsufficientFunds,

    /// The authorization nonce was already consumed on-chain.
    #[error("authorization nonce already used")]
    NonceAlreadyUsed,

    /// The signature failed every verification path.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// The signature is ERC-6492 wrapped but undeployed wallets are not
    /// accepted by this facilitator.
    #[error("undeployed smart account signatures are not accepted")]
    UndeployedWalletRejected,

    /// An RPC call failed.
    #[error("rpc failure: {0}")]
    Rpc(String),

    /// The settlement transaction reverted or was rejected.
    #[error("settlement failed: {0}")]
    Settlement(String),
}

impl EvmExactError {
    /// Machine-readable reason code for response objects.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidFormat(_) => "invalid_format",
            Self::RequirementsMismatch => "accepted_requirements_mismatch",
            Self::ChainMismatch => "chain_id_mismatch",
            Self::RecipientMismatch => "recipient_mismatch",
            Self::Expired => "invalid_payment_expired",
            Self::Early => "invalid_payment_early",
            Self::InsufficientValue => "invalid_payment_amount",
            Self::InsufficientFunds => "insufficient_funds",
            Self::NonceAlreadyUsed => "nonce_already_used",
            Self::InvalidSignature(_) | Self::UndeployedWalletRejected => "invalid_signature",
            Self::Rpc(_) => "unexpected_error",
            Self::Settlement(_) => "settlement_failed",
        }
    }

    /// Folds this error into a verification verdict.
    #[must_use]
    pub fn into_verify_response(self) -> VerifyResponse {
        VerifyResponse::invalid_with_message(self.reason(), self.to_string())
    }
}

impl From<MalformedErc6492Error> for EvmExactError {
    fn from(err: MalformedErc6492Error) -> Self {
        Self::InvalidSignature(err.to_string())
    }
}

impl From<alloy_contract::Error> for EvmExactError {
    fn from(err: alloy_contract::Error) -> Self {
        Self::Rpc(err.to_string())
    }
}
