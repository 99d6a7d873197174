//! Minimal RPC surface the Solana scheme needs.
//!
//! Implemented for `solana_client`'s nonblocking client; tests stub it.

use solana_message::Hash;
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;
use tollbooth::scheme::{BoxFuture, SchemeError};

/// The RPC operations used by the Solana client and facilitator.
pub trait SvmRpc: Send + Sync {
    /// Fetches a recent blockhash for transaction construction.
    fn get_latest_blockhash(&self) -> BoxFuture<'_, Result<Hash, SchemeError>>;

    /// Submits a transaction and waits for confirmation.
    fn send_and_confirm<'a>(
        &'a self,
        transaction: &'a VersionedTransaction,
    ) -> BoxFuture<'a, Result<Signature, SchemeError>>;
}

impl SvmRpc for solana_client::nonblocking::rpc_client::RpcClient {
    fn get_latest_blockhash(&self) -> BoxFuture<'_, Result<Hash, SchemeError>> {
        Box::pin(async move {
            let hash = self
                .get_latest_blockhash()
                .await
                .map_err(|e| -> SchemeError { format!("blockhash fetch failed: {e}").into() })?;
            Ok(hash)
        })
    }

    fn send_and_confirm<'a>(
        &'a self,
        transaction: &'a VersionedTransaction,
    ) -> BoxFuture<'a, Result<Signature, SchemeError>> {
        Box::pin(async move {
            let signature = self
                .send_and_confirm_transaction(transaction)
                .await
                .map_err(|e| -> SchemeError { format!("transaction submit failed: {e}").into() })?;
            Ok(signature)
        })
    }
}
