//! The RPC capability the payment engine runs on.
//!
//! [`RpcGateway`] is the only way the engine touches the chain. Production
//! code uses [`ProviderGateway`] over an alloy provider with a wallet; tests
//! inject in-memory doubles.

use alloy::primitives::{Address, Bytes, TxHash, U256};

use crate::PayError;

/// Read and write access to the chain.
pub trait RpcGateway: Send + Sync {
    /// Read-only contract call (`eth_call`). Returns the raw return data.
    fn call(
        &self,
        to: Address,
        data: Bytes,
    ) -> impl std::future::Future<Output = Result<Bytes, PayError>> + Send;

    /// Submit a provider-signed transaction. Resolves with the transaction
    /// id once the provider acknowledges it, or with the provider's error.
    fn send_transaction(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
        value: U256,
    ) -> impl std::future::Future<Output = Result<TxHash, PayError>> + Send;
}

#[cfg(feature = "full")]
pub use provider::ProviderGateway;

#[cfg(feature = "full")]
mod provider {
    use std::time::Duration;

    use alloy::network::TransactionBuilder;
    use alloy::primitives::{Address, Bytes, TxHash, U256};
    use alloy::providers::Provider;
    use alloy::rpc::types::TransactionRequest;

    use super::RpcGateway;
    use crate::PayError;

    const SEND_TIMEOUT: Duration = Duration::from_secs(30);
    const RECEIPT_TIMEOUT: Duration = Duration::from_secs(60);

    /// [`RpcGateway`] backed by an alloy provider. Writes go through the
    /// provider's wallet filler, so the provider must be built with a signer
    /// for `from`.
    pub struct ProviderGateway<P> {
        provider: P,
    }

    impl<P> ProviderGateway<P> {
        pub fn new(provider: P) -> Self {
            Self { provider }
        }

        pub fn provider(&self) -> &P {
            &self.provider
        }
    }

    impl<P> RpcGateway for ProviderGateway<P>
    where
        P: Provider + Send + Sync,
    {
        async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, PayError> {
            let request = TransactionRequest::default().with_to(to).with_input(data);
            self.provider
                .call(request)
                .await
                .map_err(|e| PayError::Rpc(format!("eth_call to {to} failed: {e}")))
        }

        /// Waits for the receipt so that a follow-up allowance read sees the
        /// new state. Timeouts only guard the transport; a timed out
        /// transaction is reported as failed and never resubmitted.
        async fn send_transaction(
            &self,
            from: Address,
            to: Address,
            data: Bytes,
            value: U256,
        ) -> Result<TxHash, PayError> {
            let request = TransactionRequest::default()
                .with_from(from)
                .with_to(to)
                .with_input(data)
                .with_value(value);

            let send = self.provider.send_transaction(request);
            let pending = tokio::time::timeout(SEND_TIMEOUT, send)
                .await
                .map_err(|_| PayError::Rpc("send timed out after 30s".to_string()))?
                .map_err(|e| PayError::Rpc(format!("send failed: {e}")))?;

            let tx_hash = *pending.tx_hash();
            tracing::debug!(tx = %tx_hash, "transaction submitted, awaiting receipt");

            let receipt = tokio::time::timeout(RECEIPT_TIMEOUT, pending.get_receipt())
                .await
                .map_err(|_| PayError::Rpc(format!("receipt for {tx_hash} timed out after 60s")))?
                .map_err(|e| PayError::Rpc(format!("receipt for {tx_hash} failed: {e}")))?;

            if !receipt.status() {
                return Err(PayError::Rpc(format!("transaction {tx_hash} reverted")));
            }

            Ok(receipt.transaction_hash)
        }
    }
}
