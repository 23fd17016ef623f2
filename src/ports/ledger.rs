//! Ledger Transport Port - Transaction Submission Interface
//!
//! Defines the trait the workflow uses to reach the chain: submit a signed
//! contract call, block until it is included, and issue read-only calls.
//! Signing, nonces, gas and request batching live behind the port.

use alloy::primitives::{Address, Bytes, TxHash};
use async_trait::async_trait;

use crate::domain::calls::ContractCall;
use crate::domain::position::TransactionOutcome;

/// Trait for on-chain access from a single signer.
///
/// Calls from one workflow run are issued strictly one after another;
/// implementations may still serve independent runs and reads concurrently.
#[async_trait]
pub trait LedgerTransport: Send + Sync + 'static {
  /// Address of the signing account.
  fn account(&self) -> Address;

  /// Sign and broadcast `call`, returning its transaction hash.
  ///
  /// # Errors
  /// The ledger refused the transaction (bad signature, nonce conflict,
  /// gas estimation revert, ...). Nothing was broadcast.
  async fn submit(&self, call: &ContractCall) -> anyhow::Result<TxHash>;

  /// Block until `tx_hash` is included and report its execution status.
  ///
  /// # Errors
  /// Transport failure or an elapsed confirmation deadline. The transaction
  /// may still land later.
  async fn wait_for_confirmation(&self, tx_hash: TxHash) -> anyhow::Result<TransactionOutcome>;

  /// Execute `call` read-only against the latest block.
  async fn read(&self, call: &ContractCall) -> anyhow::Result<Bytes>;

  /// Whether contract code is deployed at `address`.
  async fn has_code(&self, address: Address) -> anyhow::Result<bool>;

  /// Check if the transport connection is healthy.
  async fn is_healthy(&self) -> bool;
}
