//! Position Workflow Use Case - Ordered, Fail-fast Position Changes
//!
//! Drives a position change against a V2 market from a single signer:
//! 1. Resolve the chain id and the market address (no transaction yet)
//! 2. Fund collateral from the testnet faucet (optional)
//! 3. Approve the collateral token for the market
//! 4. Approve the position manager as operator on the market factory
//! 5. Submit the market update
//!
//! Every transactional step is submitted and then confirmed before the next
//! one starts. The first rejection or revert halts the run; the failure names
//! the step and carries the receipts of the steps that already landed, since
//! nothing on-chain can be rolled back.
//!
//! Approvals are submitted unconditionally. The workflow never reads the
//! current allowance or operator flag first, so it keeps no state and has no
//! read-before-write race.
//!
//! The collateral spender is the market itself, since the update goes to the
//! market directly. Flows routed through the position manager (MultiInvoker)
//! approve that contract as spender instead.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use alloy::primitives::{Address, TxHash, U256};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{Instrument, info, info_span, instrument, warn};
use uuid::Uuid;

use crate::domain::calls::{self, ContractCall};
use crate::domain::market::{Asset, Chain};
use crate::domain::position::PositionModificationRequest;
use crate::domain::registry::{MarketRegistry, ProtocolContracts};
use crate::ports::ledger::LedgerTransport;

/// Named transactional steps, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowStep {
  FundCollateral,
  ApproveCollateral,
  ApproveOperator,
  ModifyPosition,
}

impl WorkflowStep {
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::FundCollateral => "fund-collateral",
      Self::ApproveCollateral => "approve-collateral",
      Self::ApproveOperator => "approve-operator",
      Self::ModifyPosition => "modify-position",
    }
  }
}

impl fmt::Display for WorkflowStep {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Errors surfaced by the workflow. None are retried.
#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("unsupported chain id {0}")]
  UnsupportedChain(u64),

  #[error("no {asset} market deployed on {chain}")]
  MarketNotDeployed { chain: Chain, asset: Asset },

  #[error("market address is zero; market unavailable")]
  MarketUnavailable,

  #[error("no protocol contracts configured for {0}")]
  MissingContracts(Chain),

  #[error("collateral faucet is only available on testnets, not {0}")]
  FaucetUnavailable(Chain),

  #[error("{step} submission rejected: {reason}")]
  SubmissionRejected { step: WorkflowStep, reason: String },

  #[error("{step} transaction {tx_hash} reverted")]
  TransactionReverted { step: WorkflowStep, tx_hash: TxHash },

  #[error("{step} confirmation of {tx_hash} failed: {reason}")]
  ConfirmationFailed {
    step: WorkflowStep,
    tx_hash: TxHash,
    reason: String,
  },
}

impl WorkflowError {
  /// The transactional step that failed, if the failure happened in one.
  pub fn step(&self) -> Option<WorkflowStep> {
    match self {
      Self::SubmissionRejected { step, .. }
      | Self::TransactionReverted { step, .. }
      | Self::ConfirmationFailed { step, .. } => Some(*step),
      _ => None,
    }
  }
}

/// How much collateral allowance to grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllowancePolicy {
  /// `U256::MAX`, so later runs never run short.
  #[default]
  Unlimited,
  /// Exactly the collateral this run deposits.
  ExactDeposit,
}

/// Input of a full workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOrder {
  pub chain_id: u64,
  pub asset: Asset,
  pub request: PositionModificationRequest,
  /// Testnet faucet mint submitted before the approvals.
  pub fund_amount: Option<U256>,
}

/// A confirmed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepReceipt {
  pub step: WorkflowStep,
  pub tx_hash: TxHash,
  /// Submit-to-confirmation wall time.
  pub elapsed_ms: u64,
}

/// Summary of a run in which every step succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
  pub run_id: Uuid,
  pub chain: Chain,
  pub asset: Asset,
  pub market: Address,
  pub steps: Vec<StepReceipt>,
  pub started_at: DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
}

impl WorkflowReport {
  /// Hash of the position modification transaction.
  pub fn position_tx(&self) -> Option<TxHash> {
    self
      .steps
      .iter()
      .find(|r| r.step == WorkflowStep::ModifyPosition)
      .map(|r| r.tx_hash)
  }
}

/// A halted run: what landed, where, and why the next step did not.
#[derive(Debug, Error)]
#[error(
  "workflow {run_id} for {asset} {} halted after {} confirmed step(s)",
  target_label(.chain, .market),
  .completed.len()
)]
pub struct WorkflowFailure {
  pub run_id: Uuid,
  pub asset: Asset,
  /// Set once the chain id is resolved.
  pub chain: Option<Chain>,
  /// Set once the market is resolved.
  pub market: Option<Address>,
  pub completed: Vec<StepReceipt>,
  #[source]
  pub error: WorkflowError,
}

fn target_label(chain: &Option<Chain>, market: &Option<Address>) -> String {
  match (chain, market) {
    (Some(chain), Some(market)) => format!("on {chain} (market {market})"),
    (Some(chain), None) => format!("on {chain}"),
    (None, _) => "on an unresolved chain".to_string(),
  }
}

impl WorkflowFailure {
  pub fn failed_step(&self) -> Option<WorkflowStep> {
    self.error.step()
  }
}

/// One element of the pipeline, built before anything is submitted.
#[derive(Debug, Clone)]
struct PlannedStep {
  step: WorkflowStep,
  call: ContractCall,
}

/// Orchestrates registry resolution and the ordered transaction pipeline.
pub struct PositionWorkflow<L: LedgerTransport> {
  ledger: Arc<L>,
  registry: Arc<MarketRegistry>,
  contracts: BTreeMap<Chain, ProtocolContracts>,
  allowance: AllowancePolicy,
}

impl<L: LedgerTransport> PositionWorkflow<L> {
  /// Create a workflow with the unlimited allowance policy.
  pub fn new(
    ledger: Arc<L>,
    registry: Arc<MarketRegistry>,
    contracts: BTreeMap<Chain, ProtocolContracts>,
  ) -> Self {
    Self {
      ledger,
      registry,
      contracts,
      allowance: AllowancePolicy::Unlimited,
    }
  }

  /// Override the allowance policy.
  #[must_use]
  pub fn with_allowance_policy(mut self, allowance: AllowancePolicy) -> Self {
    self.allowance = allowance;
    self
  }

  fn contracts_for(&self, chain: Chain) -> Result<&ProtocolContracts, WorkflowError> {
    self
      .contracts
      .get(&chain)
      .ok_or(WorkflowError::MissingContracts(chain))
  }

  /// Resolve the chain id and the market for `asset` on it.
  ///
  /// # Errors
  /// `UnsupportedChain` or `MarketNotDeployed`; no transaction is built.
  pub fn resolve_market(&self, chain_id: u64, asset: Asset) -> Result<(Chain, Address), WorkflowError> {
    let chain = Chain::try_from(chain_id).map_err(|e| WorkflowError::UnsupportedChain(e.0))?;
    let market = self
      .registry
      .address_for_asset(chain, asset)
      .ok_or(WorkflowError::MarketNotDeployed { chain, asset })?;
    Ok((chain, market))
  }

  // Call builders shared by the single-step operations and `plan`.

  fn allowance_call(&self, chain: Chain, spender: Address, amount: U256) -> Result<ContractCall, WorkflowError> {
    let token = self.contracts_for(chain)?.collateral_token;
    Ok(calls::approve_collateral(token, spender, amount))
  }

  fn operator_call(&self, chain: Chain, operator: Address) -> Result<ContractCall, WorkflowError> {
    let factory = self.contracts_for(chain)?.market_factory;
    Ok(calls::approve_operator(factory, operator))
  }

  fn faucet_call(&self, chain: Chain, amount: U256) -> Result<ContractCall, WorkflowError> {
    if !chain.is_testnet() {
      return Err(WorkflowError::FaucetUnavailable(chain));
    }
    let token = self.contracts_for(chain)?.collateral_token;
    Ok(calls::mint_collateral(token, self.ledger.account(), amount))
  }

  fn position_call(&self, market: Address, request: &PositionModificationRequest) -> ContractCall {
    calls::modify_position(market, self.ledger.account(), request)
  }

  /// Submit `approve(spender, amount)` on the chain's collateral token.
  ///
  /// Pass `U256::MAX` to avoid repeated approvals.
  pub async fn ensure_collateral_allowance(
    &self,
    chain: Chain,
    spender: Address,
    amount: U256,
  ) -> Result<TxHash, WorkflowError> {
    let call = self.allowance_call(chain, spender, amount)?;
    self.submit_step(WorkflowStep::ApproveCollateral, &call).await
  }

  /// Submit `updateOperator(operator, true)` on the chain's market factory.
  pub async fn ensure_operator_approval(
    &self,
    chain: Chain,
    operator: Address,
  ) -> Result<TxHash, WorkflowError> {
    let call = self.operator_call(chain, operator)?;
    self.submit_step(WorkflowStep::ApproveOperator, &call).await
  }

  /// Submit a faucet mint of collateral to the signer. Testnets only.
  pub async fn mint_collateral(&self, chain: Chain, amount: U256) -> Result<TxHash, WorkflowError> {
    let call = self.faucet_call(chain, amount)?;
    self.submit_step(WorkflowStep::FundCollateral, &call).await
  }

  /// Submit the market update for `request`.
  ///
  /// Returns `Ok(None)` when the ledger refuses the transaction outright. A
  /// transaction that is accepted but later reverts is only visible through
  /// [`Self::confirm`].
  ///
  /// # Errors
  /// `MarketUnavailable` for the zero address; the caller is expected to
  /// have resolved the market through the registry first.
  pub async fn modify_position(
    &self,
    chain: Chain,
    market: Address,
    request: &PositionModificationRequest,
  ) -> Result<Option<TxHash>, WorkflowError> {
    if market.is_zero() {
      return Err(WorkflowError::MarketUnavailable);
    }
    let call = self.position_call(market, request);
    match self.submit_step(WorkflowStep::ModifyPosition, &call).await {
      Ok(tx_hash) => Ok(Some(tx_hash)),
      Err(WorkflowError::SubmissionRejected { reason, .. }) => {
        warn!(chain = %chain, market = %market, reason = %reason, "Position update not accepted");
        Ok(None)
      }
      Err(e) => Err(e),
    }
  }

  /// Block until `tx_hash` is included; a revert is an error attributed to `step`.
  pub async fn confirm(&self, step: WorkflowStep, tx_hash: TxHash) -> Result<(), WorkflowError> {
    let outcome = self
      .ledger
      .wait_for_confirmation(tx_hash)
      .await
      .map_err(|e| WorkflowError::ConfirmationFailed {
        step,
        tx_hash,
        reason: format!("{e:#}"),
      })?;

    if outcome.is_success() {
      info!(step = %step, tx_hash = %tx_hash, "Transaction confirmed");
      Ok(())
    } else {
      warn!(step = %step, tx_hash = %tx_hash, "Transaction reverted");
      Err(WorkflowError::TransactionReverted { step, tx_hash })
    }
  }

  /// Run the full pipeline for `order`.
  ///
  /// # Errors
  /// A [`WorkflowFailure`] naming the failed step and the steps already
  /// confirmed. Resolution failures carry no completed steps.
  pub async fn execute(&self, order: &PositionOrder) -> Result<WorkflowReport, WorkflowFailure> {
    let run_id = Uuid::new_v4();
    let span = info_span!(
      "position_workflow",
      %run_id,
      chain_id = order.chain_id,
      asset = %order.asset,
      side = %order.request.side,
    );
    self.run(run_id, order).instrument(span).await
  }

  async fn run(&self, run_id: Uuid, order: &PositionOrder) -> Result<WorkflowReport, WorkflowFailure> {
    let started_at = Utc::now();
    let mut completed = Vec::new();

    let fail = |chain: Option<Chain>, market: Option<Address>, completed: Vec<StepReceipt>, error: WorkflowError| {
      WorkflowFailure {
        run_id,
        asset: order.asset,
        chain,
        market,
        completed,
        error,
      }
    };

    let (chain, market) = self
      .resolve_market(order.chain_id, order.asset)
      .map_err(|e| {
        let chain = match &e {
          WorkflowError::MarketNotDeployed { chain, .. } => Some(*chain),
          _ => None,
        };
        fail(chain, None, Vec::new(), e)
      })?;
    let plan = self
      .plan(chain, market, order)
      .map_err(|e| fail(Some(chain), Some(market), Vec::new(), e))?;

    info!(market = %market, steps = plan.len(), "Market resolved, starting pipeline");

    for planned in &plan {
      match self.run_step(planned).await {
        Ok(receipt) => completed.push(receipt),
        Err(error) => {
          warn!(
            step = %planned.step,
            confirmed = completed.len(),
            error = %error,
            "Workflow halted"
          );
          return Err(fail(Some(chain), Some(market), completed, error));
        }
      }
    }

    info!(steps = completed.len(), "Position workflow complete");

    Ok(WorkflowReport {
      run_id,
      chain,
      asset: order.asset,
      market,
      steps: completed,
      started_at,
      finished_at: Utc::now(),
    })
  }

  /// Build every call up front, in execution order.
  fn plan(
    &self,
    chain: Chain,
    market: Address,
    order: &PositionOrder,
  ) -> Result<Vec<PlannedStep>, WorkflowError> {
    let mut plan = Vec::with_capacity(4);

    if let Some(amount) = order.fund_amount {
      plan.push(PlannedStep {
        step: WorkflowStep::FundCollateral,
        call: self.faucet_call(chain, amount)?,
      });
    }

    let allowance = match self.allowance {
      AllowancePolicy::Unlimited => U256::MAX,
      AllowancePolicy::ExactDeposit => order.request.collateral_deposit(),
    };
    let operator = self.contracts_for(chain)?.operator;

    plan.push(PlannedStep {
      step: WorkflowStep::ApproveCollateral,
      call: self.allowance_call(chain, market, allowance)?,
    });
    plan.push(PlannedStep {
      step: WorkflowStep::ApproveOperator,
      call: self.operator_call(chain, operator)?,
    });
    plan.push(PlannedStep {
      step: WorkflowStep::ModifyPosition,
      call: self.position_call(market, &order.request),
    });

    Ok(plan)
  }

  async fn run_step(&self, planned: &PlannedStep) -> Result<StepReceipt, WorkflowError> {
    let started = Instant::now();
    let tx_hash = self.submit_step(planned.step, &planned.call).await?;
    self.confirm(planned.step, tx_hash).await?;

    Ok(StepReceipt {
      step: planned.step,
      tx_hash,
      elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    })
  }

  #[instrument(skip(self, call), fields(to = %call.to, method = call.method))]
  async fn submit_step(&self, step: WorkflowStep, call: &ContractCall) -> Result<TxHash, WorkflowError> {
    match self.ledger.submit(call).await {
      Ok(tx_hash) => {
        info!(step = %step, tx_hash = %tx_hash, "Transaction submitted");
        Ok(tx_hash)
      }
      Err(e) => Err(WorkflowError::SubmissionRejected {
        step,
        reason: format!("{e:#}"),
      }),
    }
  }
}
