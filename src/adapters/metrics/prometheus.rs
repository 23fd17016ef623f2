//! Prometheus Metrics Registry - Workflow Observability
//!
//! Counts submissions, reverts and rejections per pipeline step, records
//! submit-to-confirmation latency, and tracks run outcomes. The operator is
//! a one-shot process, so metrics are written in text exposition format to
//! a file picked up by node-exporter's textfile collector.

use std::path::Path;

use anyhow::{Context, Result};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::{debug, instrument};

use crate::domain::market::Chain;
use crate::usecases::position_workflow::{WorkflowError, WorkflowFailure, WorkflowReport};

/// Centralized Prometheus metrics for the operator.
///
/// All metrics follow the naming convention `perennial_operator_*` and
/// carry chain/asset labels for filtering.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Transactions accepted by the node, per step.
    pub tx_submitted: IntCounterVec,
    /// Transactions mined with a failed status, per step.
    pub tx_reverted: IntCounterVec,
    /// Transactions the node refused, per step.
    pub tx_rejected: IntCounterVec,
    /// Submit-to-confirmation latency (milliseconds).
    pub confirmation_latency_ms: HistogramVec,
    /// Workflow runs by outcome (`success` or the failure kind).
    pub workflow_runs: IntCounterVec,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let tx_submitted = IntCounterVec::new(
            Opts::new(
                "perennial_operator_tx_submitted_total",
                "Transactions accepted by the node",
            ),
            &["chain", "step"],
        )?;

        let tx_reverted = IntCounterVec::new(
            Opts::new(
                "perennial_operator_tx_reverted_total",
                "Transactions mined with a failed status",
            ),
            &["chain", "step"],
        )?;

        let tx_rejected = IntCounterVec::new(
            Opts::new(
                "perennial_operator_tx_rejected_total",
                "Transactions refused at submission",
            ),
            &["chain", "step"],
        )?;

        let confirmation_latency_ms = HistogramVec::new(
            HistogramOpts::new(
                "perennial_operator_confirmation_latency_ms",
                "Submit-to-confirmation latency in milliseconds",
            )
            .buckets(vec![
                250.0, 500.0, 1000.0, 2000.0, 5000.0, 15000.0, 60000.0, 300_000.0,
            ]),
            &["chain", "step"],
        )?;

        let workflow_runs = IntCounterVec::new(
            Opts::new(
                "perennial_operator_workflow_runs_total",
                "Position workflow runs by outcome",
            ),
            &["asset", "outcome"],
        )?;

        registry.register(Box::new(tx_submitted.clone()))?;
        registry.register(Box::new(tx_reverted.clone()))?;
        registry.register(Box::new(tx_rejected.clone()))?;
        registry.register(Box::new(confirmation_latency_ms.clone()))?;
        registry.register(Box::new(workflow_runs.clone()))?;

        Ok(Self {
            registry,
            tx_submitted,
            tx_reverted,
            tx_rejected,
            confirmation_latency_ms,
            workflow_runs,
        })
    }

    /// Record a fully confirmed run.
    pub fn observe_report(&self, report: &WorkflowReport) {
        let chain = report.chain.name();
        for receipt in &report.steps {
            let step = receipt.step.as_str();
            self.tx_submitted.with_label_values(&[chain, step]).inc();
            #[allow(clippy::cast_precision_loss)]
            self.confirmation_latency_ms
                .with_label_values(&[chain, step])
                .observe(receipt.elapsed_ms as f64);
        }
        self.workflow_runs
            .with_label_values(&[report.asset.as_str(), "success"])
            .inc();
    }

    /// Record a halted run. Runs that never resolved a chain are labelled `unresolved`.
    pub fn observe_failure(&self, failure: &WorkflowFailure) {
        let chain = failure.chain.map_or("unresolved", Chain::name);
        let asset = failure.asset.as_str();
        for receipt in &failure.completed {
            let step = receipt.step.as_str();
            self.tx_submitted.with_label_values(&[chain, step]).inc();
            #[allow(clippy::cast_precision_loss)]
            self.confirmation_latency_ms
                .with_label_values(&[chain, step])
                .observe(receipt.elapsed_ms as f64);
        }

        let outcome = match &failure.error {
            WorkflowError::SubmissionRejected { step, .. } => {
                self.tx_rejected
                    .with_label_values(&[chain, step.as_str()])
                    .inc();
                "rejected"
            }
            WorkflowError::TransactionReverted { step, .. } => {
                self.tx_submitted
                    .with_label_values(&[chain, step.as_str()])
                    .inc();
                self.tx_reverted
                    .with_label_values(&[chain, step.as_str()])
                    .inc();
                "reverted"
            }
            WorkflowError::ConfirmationFailed { step, .. } => {
                self.tx_submitted
                    .with_label_values(&[chain, step.as_str()])
                    .inc();
                "unconfirmed"
            }
            _ => "unresolved",
        };

        self.workflow_runs.with_label_values(&[asset, outcome]).inc();
    }

    /// Encode every registered metric in text exposition format.
    pub fn encode_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("Failed to encode metrics")?;
        String::from_utf8(buffer).context("Metrics output is not UTF-8")
    }

    /// Write the exposition to `path`, replacing it atomically.
    #[instrument(skip(self))]
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        let body = self.encode_text()?;
        // Collectors may read mid-write; rename keeps the swap atomic.
        let tmp = path.with_extension("prom.tmp");
        std::fs::write(&tmp, body)
            .with_context(|| format!("Failed to write metrics to {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to move metrics into {}", path.display()))?;
        debug!(path = %path.display(), "Metrics textfile written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use alloy::primitives::{Address, TxHash};
    use chrono::Utc;
    use uuid::Uuid;

    use crate::domain::market::Asset;
    use crate::usecases::position_workflow::{StepReceipt, WorkflowStep};

    fn receipt(step: WorkflowStep) -> StepReceipt {
        StepReceipt {
            step,
            tx_hash: TxHash::ZERO,
            elapsed_ms: 1200,
        }
    }

    #[test]
    fn test_report_counts_every_step() {
        let metrics = MetricsRegistry::new().unwrap();
        let report = WorkflowReport {
            run_id: Uuid::new_v4(),
            chain: Chain::ArbitrumGoerli,
            asset: Asset::Eth,
            market: Address::ZERO,
            steps: vec![
                receipt(WorkflowStep::ApproveCollateral),
                receipt(WorkflowStep::ApproveOperator),
                receipt(WorkflowStep::ModifyPosition),
            ],
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };

        metrics.observe_report(&report);

        let chain = Chain::ArbitrumGoerli.name();
        assert_eq!(
            metrics
                .tx_submitted
                .with_label_values(&[chain, "modify-position"])
                .get(),
            1
        );
        assert_eq!(
            metrics
                .workflow_runs
                .with_label_values(&["eth", "success"])
                .get(),
            1
        );
    }

    #[test]
    fn test_revert_is_counted_against_its_step() {
        let metrics = MetricsRegistry::new().unwrap();
        let failure = WorkflowFailure {
            run_id: Uuid::new_v4(),
            asset: Asset::Btc,
            chain: Some(Chain::ArbitrumGoerli),
            market: Some(Address::ZERO),
            completed: vec![receipt(WorkflowStep::ApproveCollateral)],
            error: WorkflowError::TransactionReverted {
                step: WorkflowStep::ApproveOperator,
                tx_hash: TxHash::ZERO,
            },
        };

        metrics.observe_failure(&failure);

        assert_eq!(
            metrics
                .tx_reverted
                .with_label_values(&["Arbitrum Goerli", "approve-operator"])
                .get(),
            1
        );
        assert_eq!(
            metrics
                .workflow_runs
                .with_label_values(&["btc", "reverted"])
                .get(),
            1
        );
    }

    #[test]
    fn test_unresolved_chain_failure_is_labelled() {
        let metrics = MetricsRegistry::new().unwrap();
        let failure = WorkflowFailure {
            run_id: Uuid::new_v4(),
            asset: Asset::Eth,
            chain: None,
            market: None,
            completed: Vec::new(),
            error: WorkflowError::UnsupportedChain(137),
        };

        metrics.observe_failure(&failure);

        assert_eq!(
            metrics
                .workflow_runs
                .with_label_values(&["eth", "unresolved"])
                .get(),
            1
        );
    }

    #[test]
    fn test_textfile_is_written() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics
            .workflow_runs
            .with_label_values(&["eth", "unresolved"])
            .inc();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("operator.prom");
        metrics.write_textfile(&path).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("perennial_operator_workflow_runs_total"));
        assert!(!dir.path().join("operator.prom.tmp").exists());
    }
}
