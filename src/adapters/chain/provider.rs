//! Chain RPC Provider - alloy-rs 0.9 Connection Management
//!
//! Connects to the configured RPC endpoint with a signing wallet attached
//! (nonce, gas and chain-id fillers included), validates the chain id at
//! startup and exposes a shared, type-erased provider for the ledger adapter.
//! `rpc.poll_interval_ms` drives alloy's block heartbeat, which paces
//! receipt waits.

use std::sync::Arc;
use std::time::Duration;

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::config::RpcConfig;
use crate::domain::market::Chain;

/// Environment variable holding the signer's private key.
pub const PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";

/// Load the signing key from `PRIVATE_KEY`.
///
/// The key never comes from `config.toml` and is never logged.
pub fn signer_from_env() -> Result<PrivateKeySigner> {
    let key = std::env::var(PRIVATE_KEY_ENV).context("PRIVATE_KEY not set")?;
    key.trim()
        .parse::<PrivateKeySigner>()
        .context("PRIVATE_KEY is not a valid secp256k1 private key")
}

/// Shared RPC provider with the operator wallet attached.
///
/// Uses `dyn Provider` for type erasure because alloy 0.9's filler stack
/// is a deeply-nested generic type that would leak into every signature.
pub struct ChainProvider {
    /// The alloy provider (type-erased).
    provider: Arc<dyn Provider + Send + Sync>,
    /// Address of the attached signer.
    account: Address,
}

impl ChainProvider {
    /// Connect and validate that the endpoint serves `chain`.
    #[instrument(skip_all, fields(chain = %chain))]
    pub async fn connect(config: &RpcConfig, chain: Chain, signer: PrivateKeySigner) -> Result<Self> {
        let account = signer.address();
        let provider = Self::build(config, signer).await?;

        let chain_id = provider
            .get_chain_id()
            .await
            .context("Failed to query chain ID")?;

        anyhow::ensure!(
            chain_id == chain.id(),
            "RPC endpoint serves chain_id={chain_id}, expected {chain}"
        );

        info!(chain_id, account = %account, "Connected to RPC");

        Ok(Self { provider, account })
    }

    /// Build the wallet-filled provider without touching the network
    /// beyond what the transport needs to open.
    async fn build(config: &RpcConfig, signer: PrivateKeySigner) -> Result<Arc<dyn Provider + Send + Sync>> {
        let wallet = EthereumWallet::from(signer);

        // on_builtin picks http/ws/ipc from the URL scheme
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_builtin(&config.url)
            .await
            .context("Failed to connect to RPC endpoint")?;

        provider
            .client()
            .set_poll_interval(Duration::from_millis(config.poll_interval_ms));

        Ok(Arc::new(provider))
    }

    /// Same provider as `connect`, minus the chain-id round trip.
    #[cfg(test)]
    pub(crate) async fn without_chain_check(config: &RpcConfig, signer: PrivateKeySigner) -> Result<Self> {
        let account = signer.address();
        let provider = Self::build(config, signer).await?;
        Ok(Self { provider, account })
    }

    /// Get a shared reference to the alloy provider (type-erased).
    pub fn inner(&self) -> Arc<dyn Provider + Send + Sync> {
        Arc::clone(&self.provider)
    }

    pub const fn account(&self) -> Address {
        self.account
    }

    /// Check if the RPC connection is healthy via a lightweight call.
    pub async fn is_healthy(&self) -> bool {
        self.provider.get_block_number().await.is_ok()
    }
}
