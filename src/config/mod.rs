//! Configuration Module - TOML-based Operator Configuration
//!
//! Loads and validates configuration from `config.toml` with
//! environment variable overrides via `.env` files.
//! Protocol contract addresses are externalized here; only the V2 market
//! table ships with the binary.

pub mod loader;

use std::collections::BTreeMap;
use std::path::PathBuf;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::market::{Chain, Currency};
use crate::domain::registry::ProtocolContracts;
use crate::usecases::position_workflow::AllowancePolicy;

/// Top-level operator configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before any RPC connection is made.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Operator identity and target network.
  pub app: OperatorConfig,
  /// RPC endpoint and confirmation polling.
  pub rpc: RpcConfig,
  /// Workflow behaviour.
  #[serde(default)]
  pub workflow: WorkflowConfig,
  /// Protocol contracts, one set per chain.
  #[serde(default)]
  pub contracts: Vec<ContractsConfig>,
  /// Metrics export.
  #[serde(default)]
  pub metrics: MetricsConfig,
}

/// Operator identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OperatorConfig {
  /// Human-readable operator name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// EIP-155 chain id to operate on. Overridden by `CHAIN_ID`.
  #[serde(default = "default_chain_id")]
  pub chain_id: u64,
}

/// RPC endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
  /// HTTP(S), WS(S) or IPC endpoint. Overridden by `RPC_URL`.
  pub url: String,
  /// Receipt polling interval (milliseconds).
  #[serde(default = "default_poll_interval")]
  pub poll_interval_ms: u64,
  /// Give up waiting for a receipt after this many seconds. Unset waits forever.
  #[serde(default)]
  pub confirmation_timeout_secs: Option<u64>,
}

/// Workflow configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
  /// Grant an unlimited collateral allowance instead of the exact deposit.
  #[serde(default = "default_true")]
  pub max_allowance: bool,
}

impl Default for WorkflowConfig {
  fn default() -> Self {
    Self {
      max_allowance: default_true(),
    }
  }
}

impl WorkflowConfig {
  pub const fn allowance_policy(&self) -> AllowancePolicy {
    if self.max_allowance {
      AllowancePolicy::Unlimited
    } else {
      AllowancePolicy::ExactDeposit
    }
  }
}

/// Protocol contracts deployed on one chain.
///
/// Addresses are kept as strings until validation so that a bad entry is
/// reported with its chain id.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractsConfig {
  pub chain_id: u64,
  /// Collateral token.
  pub collateral_token: String,
  /// `USDC` or `DSU`; defaults to `USDC`.
  #[serde(default)]
  pub collateral_currency: Currency,
  /// Market factory holding operator approvals.
  pub market_factory: String,
  /// Position manager approved as operator.
  pub operator: String,
}

impl ContractsConfig {
  /// Parse into a chain and its non-zero contract addresses.
  pub fn resolve(&self) -> Result<(Chain, ProtocolContracts)> {
    let chain = Chain::try_from(self.chain_id)
      .with_context(|| format!("[[contracts]] entry for chain_id={}", self.chain_id))?;

    let parse = |field: &str, raw: &str| -> Result<Address> {
      let address: Address = raw
        .parse()
        .with_context(|| format!("{chain}: invalid {field} address {raw:?}"))?;
      anyhow::ensure!(!address.is_zero(), "{chain}: {field} address must not be zero");
      Ok(address)
    };

    Ok((
      chain,
      ProtocolContracts {
        collateral_token: parse("collateral_token", &self.collateral_token)?,
        collateral_currency: self.collateral_currency,
        market_factory: parse("market_factory", &self.market_factory)?,
        operator: parse("operator", &self.operator)?,
      },
    ))
  }
}

/// Metrics configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
  /// Write Prometheus text exposition here after each command.
  #[serde(default)]
  pub textfile_path: Option<PathBuf>,
}

impl AppConfig {
  /// Contract sets keyed by chain.
  ///
  /// # Errors
  /// Unsupported chain ids, malformed or zero addresses, and a chain listed
  /// more than once.
  pub fn contracts_by_chain(&self) -> Result<BTreeMap<Chain, ProtocolContracts>> {
    let mut by_chain = BTreeMap::new();
    for entry in &self.contracts {
      let (chain, contracts) = entry.resolve()?;
      anyhow::ensure!(
        by_chain.insert(chain, contracts).is_none(),
        "Contracts for {chain} configured more than once"
      );
    }
    Ok(by_chain)
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_chain_id() -> u64 {
  Chain::default().id()
}

fn default_poll_interval() -> u64 {
  1_000
}

fn default_true() -> bool {
  true
}
