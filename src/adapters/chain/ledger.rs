//! Alloy Ledger - `LedgerTransport` over an alloy-rs provider
//!
//! Submits encoded contract calls as signed transactions, waits for
//! receipts through alloy's pending-transaction watcher, and serves
//! read-only `eth_call`s. Concurrent reads share the provider's connection
//! pool.
//!
//! Confirmation waits forever unless `rpc.confirmation_timeout_secs` is set.
//! When the deadline passes the wait fails; the transaction itself stays in
//! the mempool and may still be included.

use std::sync::Arc;
use std::time::Duration;

use alloy::network::ReceiptResponse as _;
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::PendingTransactionBuilder;
use alloy::rpc::types::TransactionRequest;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::config::RpcConfig;
use crate::domain::calls::ContractCall;
use crate::domain::position::{TransactionOutcome, TxStatus};
use crate::ports::ledger::LedgerTransport;

use super::provider::ChainProvider;

/// Implements the ledger port via alloy-rs 0.9.
pub struct AlloyLedger {
    /// Shared wallet-enabled provider.
    provider: Arc<ChainProvider>,
    /// Optional bound on the confirmation wait.
    confirmation_timeout: Option<Duration>,
}

impl AlloyLedger {
    pub fn new(provider: Arc<ChainProvider>, config: &RpcConfig) -> Self {
        Self {
            provider,
            confirmation_timeout: config.confirmation_timeout_secs.map(Duration::from_secs),
        }
    }

    fn request(call: &ContractCall) -> TransactionRequest {
        TransactionRequest::default()
            .to(call.to)
            .input(call.data.clone().into())
    }
}

#[async_trait]
impl LedgerTransport for AlloyLedger {
    fn account(&self) -> Address {
        self.provider.account()
    }

    #[instrument(skip(self, call), fields(to = %call.to, method = call.method))]
    async fn submit(&self, call: &ContractCall) -> Result<TxHash> {
        let pending = self
            .provider
            .inner()
            .send_transaction(Self::request(call))
            .await
            .with_context(|| format!("{} was not accepted by the node", call.method))?;

        let tx_hash = *pending.tx_hash();
        info!(tx_hash = %tx_hash, "Transaction broadcast");
        Ok(tx_hash)
    }

    #[instrument(skip(self), fields(tx_hash = %tx_hash))]
    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<TransactionOutcome> {
        // Block polling runs at the client's poll interval, set on connect.
        let root = self.provider.inner().root().clone();
        let receipt = PendingTransactionBuilder::new(root, tx_hash)
            .with_timeout(self.confirmation_timeout)
            .get_receipt()
            .await
            .with_context(|| format!("No receipt for {tx_hash}"))?;

        debug!(block = ?receipt.block_number(), "Receipt received");

        let status = if receipt.status() {
            TxStatus::Success
        } else {
            TxStatus::Reverted
        };

        Ok(TransactionOutcome { tx_hash, status })
    }

    #[instrument(skip(self, call), fields(to = %call.to, method = call.method))]
    async fn read(&self, call: &ContractCall) -> Result<Bytes> {
        self.provider
            .inner()
            .call(&Self::request(call))
            .await
            .with_context(|| format!("{} call failed", call.method))
    }

    async fn has_code(&self, address: Address) -> Result<bool> {
        let code = self
            .provider
            .inner()
            .get_code_at(address)
            .await
            .with_context(|| format!("Failed to query code at {address}"))?;
        Ok(!code.is_empty())
    }

    async fn is_healthy(&self) -> bool {
        self.provider.is_healthy().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use alloy::signers::local::PrivateKeySigner;

    // Well-known development key; never funded outside local nodes.
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn rpc(url: &str, timeout_secs: Option<u64>) -> RpcConfig {
        RpcConfig {
            url: url.to_string(),
            poll_interval_ms: 50,
            confirmation_timeout_secs: timeout_secs,
        }
    }

    async fn ledger(config: &RpcConfig) -> AlloyLedger {
        let signer: PrivateKeySigner = DEV_KEY.parse().unwrap();
        let provider = ChainProvider::without_chain_check(config, signer).await.unwrap();
        AlloyLedger::new(Arc::new(provider), config)
    }

    #[tokio::test]
    async fn test_rpc_settings_reach_the_provider() {
        let config = rpc("http://127.0.0.1:1", Some(7));
        let ledger = ledger(&config).await;

        assert_eq!(ledger.confirmation_timeout, Some(Duration::from_secs(7)));
        assert_eq!(
            ledger.provider.inner().client().poll_interval(),
            Duration::from_millis(50)
        );
    }

    #[tokio::test]
    async fn test_confirmation_fails_when_endpoint_is_down() {
        let config = rpc("http://127.0.0.1:1", Some(1));
        let ledger = ledger(&config).await;

        let result = tokio::time::timeout(
            Duration::from_secs(30),
            ledger.wait_for_confirmation(TxHash::ZERO),
        )
        .await
        .unwrap();

        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("No receipt for"));
    }
}
