//! Signing abstraction for EVM payment clients.

use std::future::Future;
use std::sync::Arc;

use alloy_primitives::{Address, B256, Signature};
use alloy_signer_local::PrivateKeySigner;

/// Abstracts hash signing so both owned signers and `Arc`-shared signers
/// work with the payment client.
///
/// Alloy's `Signer` trait is not implemented for `Arc<T>`, but callers
/// routinely share one signer across clients.
pub trait SignerLike: Send + Sync {
    /// The signer's address.
    fn address(&self) -> Address;

    /// Signs a 32-byte digest (typically an EIP-712 hash).
    fn sign_hash(
        &self,
        hash: &B256,
    ) -> impl Future<Output = Result<Signature, alloy_signer::Error>> + Send;
}

impl SignerLike for PrivateKeySigner {
    fn address(&self) -> Address {
        Self::address(self)
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error> {
        alloy_signer::Signer::sign_hash(self, hash).await
    }
}

impl<T: SignerLike> SignerLike for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error> {
        (**self).sign_hash(hash).await
    }
}
