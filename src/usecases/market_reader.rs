//! Market Reader Use Case - Read-only Market and Wallet Queries
//!
//! Lists registry markets with their metadata, verifies that every listed
//! market has code deployed on-chain, and reads the signer's collateral
//! balance. Reads carry no ordering constraint, so deployment checks for a
//! chain are issued concurrently and left to the transport to batch.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use futures_util::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::calls;
use crate::domain::market::{Asset, Chain, Currency};
use crate::domain::position::from_ufixed6;
use crate::domain::registry::{MarketRegistry, ProtocolContracts};
use crate::ports::ledger::LedgerTransport;

/// A registry market with display metadata.
#[derive(Debug, Clone, Serialize)]
pub struct MarketListing {
  pub chain: Chain,
  pub asset: Asset,
  pub symbol: &'static str,
  pub name: &'static str,
  pub address: Address,
  pub pyth_feed_id: &'static str,
}

/// Result of checking one market address on-chain.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentCheck {
  pub asset: Asset,
  pub address: Address,
  /// `Some(true)` when code exists; `None` when the query itself failed.
  pub has_code: Option<bool>,
  pub error: Option<String>,
}

impl DeploymentCheck {
  pub fn is_deployed(&self) -> bool {
    self.has_code == Some(true)
  }
}

/// Collateral held by the signer.
#[derive(Debug, Clone, Serialize)]
pub struct CollateralBalance {
  pub account: Address,
  pub currency: Currency,
  pub raw: U256,
  pub amount: Decimal,
}

/// Registry listings, deployment checks and balance reads.
pub struct MarketReader<L: LedgerTransport> {
  ledger: Arc<L>,
  registry: Arc<MarketRegistry>,
}

impl<L: LedgerTransport> MarketReader<L> {
  pub fn new(ledger: Arc<L>, registry: Arc<MarketRegistry>) -> Self {
    Self { ledger, registry }
  }

  /// Markets deployed on `chain` with metadata, in asset order.
  pub fn listings(&self, chain: Chain) -> Vec<MarketListing> {
    market_listings(&self.registry, chain)
  }

  /// Check every registry market on `chain` for deployed code.
  ///
  /// Failed queries are reported per market rather than aborting the sweep.
  pub async fn verify_deployments(&self, chain: Chain) -> Vec<DeploymentCheck> {
    let markets = self.registry.list_deployed_markets(chain);

    let checks = markets.iter().map(|market| {
      let ledger = Arc::clone(&self.ledger);
      async move {
        let result = ledger.has_code(market.address).await;
        match result {
          Ok(has_code) => DeploymentCheck {
            asset: market.asset,
            address: market.address,
            has_code: Some(has_code),
            error: None,
          },
          Err(e) => DeploymentCheck {
            asset: market.asset,
            address: market.address,
            has_code: None,
            error: Some(format!("{e:#}")),
          },
        }
      }
    });

    let results = join_all(checks).await;

    for check in &results {
      if check.is_deployed() {
        info!(asset = %check.asset, address = %check.address, "Market code verified");
      } else {
        warn!(
          asset = %check.asset,
          address = %check.address,
          error = check.error.as_deref().unwrap_or("no code at address"),
          "Market not verified"
        );
      }
    }

    results
  }

  /// Read the signer's collateral balance.
  pub async fn collateral_balance(&self, contracts: &ProtocolContracts) -> Result<CollateralBalance> {
    let account = self.ledger.account();
    let call = calls::collateral_balance_of(contracts.collateral_token, account);

    let data = self
      .ledger
      .read(&call)
      .await
      .context("Collateral balanceOf call failed")?;
    let raw = calls::decode_balance(&data).context("Malformed balanceOf return data")?;

    Ok(CollateralBalance {
      account,
      currency: contracts.collateral_currency,
      raw,
      amount: from_ufixed6(raw),
    })
  }
}

/// Registry listings without a transport, for offline commands.
pub fn market_listings(registry: &MarketRegistry, chain: Chain) -> Vec<MarketListing> {
  registry
    .list_deployed_markets(chain)
    .into_iter()
    .map(|m| {
      let meta = m.asset.metadata();
      MarketListing {
        chain,
        asset: m.asset,
        symbol: meta.symbol,
        name: meta.name,
        address: m.address,
        pyth_feed_id: m.asset.pyth_feed_id(chain),
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_listings_carry_metadata() {
    let listings = market_listings(&MarketRegistry::builtin(), Chain::ArbitrumGoerli);
    assert_eq!(listings.len(), 2);
    assert_eq!(listings[0].symbol, "BTC-USD");
    assert_eq!(listings[1].symbol, "ETH-USD");
    assert_eq!(listings[1].pyth_feed_id, Asset::Eth.metadata().pyth_feed_id_testnet);
  }

  #[test]
  fn test_listings_empty_chain() {
    assert!(market_listings(&MarketRegistry::builtin(), Chain::Arbitrum).is_empty());
  }

  #[test]
  fn test_deployment_check_flags() {
    let check = DeploymentCheck {
      asset: Asset::Btc,
      address: Address::ZERO,
      has_code: None,
      error: Some("timeout".to_string()),
    };
    assert!(!check.is_deployed());
  }
}
