//! Error types for the x402 payment lifecycle.

use std::fmt;

/// Top-level error type for x402 payment operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PaymentError {
    /// Error during payment verification.
    #[error("{0}")]
    Verify(#[from] VerifyError),

    /// Error during payment settlement.
    #[error("{0}")]
    Settle(#[from] SettleError),

    /// No registered scheme found for a scheme/network combination.
    #[error("{0}")]
    SchemeNotFound(#[from] SchemeNotFoundError),

    /// No payment requirements match the registered schemes.
    #[error("{0}")]
    NoMatchingRequirements(#[from] NoMatchingRequirementsError),

    /// Payment was aborted by a before hook.
    #[error("{0}")]
    Aborted(#[from] PaymentAbortedError),

    /// A payment was already attempted for this request.
    #[error("{0}")]
    AlreadyAttempted(#[from] PaymentAlreadyAttemptedError),

    /// Scheme-level failure (signing, price parsing, transport).
    #[error("{0}")]
    Scheme(#[from] crate::scheme::SchemeError),
}

/// Facilitator declared the payment invalid.
#[derive(Debug, Clone)]
pub struct VerifyError {
    /// Machine-readable reason.
    pub invalid_reason: String,
    /// Human-readable message.
    pub invalid_message: Option<String>,
    /// The payer's address, if known.
    pub payer: Option<String>,
}

impl VerifyError {
    /// Creates a new verification error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            invalid_reason: reason.into(),
            invalid_message: None,
            payer: None,
        }
    }

    /// Sets the human-readable message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.invalid_message = Some(message.into());
        self
    }
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.invalid_message {
            Some(msg) => write!(f, "{}: {}", self.invalid_reason, msg),
            None => write!(f, "{}", self.invalid_reason),
        }
    }
}

impl std::error::Error for VerifyError {}

/// Settlement failed or was rejected on-chain.
#[derive(Debug, Clone)]
pub struct SettleError {
    /// Machine-readable reason.
    pub error_reason: String,
    /// Human-readable message.
    pub error_message: Option<String>,
    /// Transaction identifier, if one was produced before failure.
    pub transaction: Option<String>,
    /// The payer's address, if known.
    pub payer: Option<String>,
}

impl SettleError {
    /// Creates a new settlement error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            error_reason: reason.into(),
            error_message: None,
            transaction: None,
            payer: None,
        }
    }

    /// Sets the human-readable message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

impl fmt::Display for SettleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_message {
            Some(msg) => write!(f, "{}: {}", self.error_reason, msg),
            None => write!(f, "{}", self.error_reason),
        }
    }
}

impl std::error::Error for SettleError {}

/// No scheme registered for a scheme/network combination.
#[derive(Debug, Clone)]
pub struct SchemeNotFoundError {
    /// The requested scheme.
    pub scheme: String,
    /// The requested network.
    pub network: String,
}

impl SchemeNotFoundError {
    /// Creates a new scheme-not-found error.
    #[must_use]
    pub fn new(scheme: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            network: network.into(),
        }
    }
}

impl fmt::Display for SchemeNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no scheme '{}' registered for network '{}'",
            self.scheme, self.network
        )
    }
}

impl std::error::Error for SchemeNotFoundError {}

/// The intersection between server offers and registered schemes is empty.
#[derive(Debug, Clone)]
pub struct NoMatchingRequirementsError {
    /// Reason for the error.
    pub reason: String,
}

impl NoMatchingRequirementsError {
    /// Creates a new no-matching-requirements error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for NoMatchingRequirementsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl std::error::Error for NoMatchingRequirementsError {}

/// A before hook aborted the payment.
#[derive(Debug, Clone)]
pub struct PaymentAbortedError {
    /// The reason the hook gave.
    pub reason: String,
}

impl PaymentAbortedError {
    /// Creates a new payment-aborted error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for PaymentAbortedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "payment aborted: {}", self.reason)
    }
}

impl std::error::Error for PaymentAbortedError {}

/// The retry carrying a payment header was answered with another 402.
///
/// The client never loops: one payment attempt per request.
#[derive(Debug, Clone, Default)]
pub struct PaymentAlreadyAttemptedError;

impl fmt::Display for PaymentAlreadyAttemptedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "server returned 402 after a payment was already attached")
    }
}

impl std::error::Error for PaymentAlreadyAttemptedError {}
