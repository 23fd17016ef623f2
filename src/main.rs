//! Perennial V2 Market Operator — Entry Point
//!
//! One-shot CLI over the market registry and the position workflow.
//!
//! Wiring sequence:
//! 1. Load `.env`, then config.toml + env overrides + validation
//! 2. Init tracing (JSON structured logging)
//! 3. Offline commands (`markets`, `lookup`) answer from the registry
//! 4. Otherwise: signer from PRIVATE_KEY, RPC provider (chain id checked),
//!    AlloyLedger (implements the LedgerTransport port)
//! 5. Run the command, print its JSON result on stdout
//! 6. Write the metrics textfile when configured

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use perennial_operator::adapters::chain::provider::signer_from_env;
use perennial_operator::adapters::chain::{AlloyLedger, ChainProvider};
use perennial_operator::adapters::metrics::MetricsRegistry;
use perennial_operator::config::{self, AppConfig};
use perennial_operator::domain::market::{Asset, Chain, PositionSide};
use perennial_operator::domain::position::{PositionModificationRequest, to_ufixed6};
use perennial_operator::domain::registry::MarketRegistry;
use perennial_operator::ports::LedgerTransport;
use perennial_operator::usecases::market_reader::{MarketReader, market_listings};
use perennial_operator::usecases::{PositionOrder, PositionWorkflow, WorkflowStep};

#[derive(Debug, Parser)]
#[command(name = "perennial-operator", version, about = "Operate positions on Perennial V2 markets")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the markets deployed on the configured chain.
    Markets,
    /// Resolve an asset to its market address, or an address to its asset.
    Lookup {
        #[arg(long, conflicts_with = "address", required_unless_present = "address")]
        asset: Option<Asset>,
        #[arg(long)]
        address: Option<Address>,
    },
    /// Check that every listed market has code deployed.
    Verify,
    /// Show the signer's collateral balance.
    Balance,
    /// Mint testnet collateral to the signer.
    Mint {
        /// Amount in collateral units (e.g. 1000).
        #[arg(long)]
        amount: Decimal,
    },
    /// Approve collateral and operator, then update the position.
    Modify {
        #[arg(long)]
        asset: Asset,
        /// maker, long, short or none.
        #[arg(long)]
        side: PositionSide,
        /// Absolute position size for the side.
        #[arg(long)]
        size: Decimal,
        /// Collateral to deposit; negative withdraws.
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        collateral: Decimal,
        /// Mint this much testnet collateral first.
        #[arg(long)]
        fund: Option<Decimal>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── 1. Load .env and configuration ──────────────────────
    // A missing .env is not an error.
    let _ = dotenvy::dotenv();
    let config = config::loader::load_config(&cli.config).context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.app.log_level)),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    info!(
        name = %config.app.name,
        version = env!("CARGO_PKG_VERSION"),
        chain_id = config.app.chain_id,
        "Starting Perennial operator"
    );

    let registry = Arc::new(MarketRegistry::builtin());
    let metrics = MetricsRegistry::new().context("Failed to create metrics registry")?;

    let outcome = run(cli.command, &config, registry, &metrics).await;

    // ── 6. Metrics textfile, written on success and failure ─
    if let Some(path) = &config.metrics.textfile_path {
        if let Err(e) = metrics.write_textfile(path) {
            warn!(error = %e, "Failed to write metrics textfile");
        }
    }

    match outcome {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "Command failed");
            Err(e)
        }
    }
}

async fn run(
    command: Command,
    config: &AppConfig,
    registry: Arc<MarketRegistry>,
    metrics: &MetricsRegistry,
) -> Result<serde_json::Value> {
    let chain_id = config.app.chain_id;

    // ── 3. Offline commands ─────────────────────────────────
    match command {
        Command::Markets => {
            let chain = Chain::try_from(chain_id)?;
            to_json(&market_listings(&registry, chain))
        }
        Command::Lookup { asset, address } => lookup(&registry, chain_id, asset, address),
        online => run_online(online, config, registry, metrics).await,
    }
}

async fn run_online(
    command: Command,
    config: &AppConfig,
    registry: Arc<MarketRegistry>,
    metrics: &MetricsRegistry,
) -> Result<serde_json::Value> {
    let chain_id = config.app.chain_id;

    // ── 4. Signer, provider and ledger ──────────────────────
    let chain = Chain::try_from(chain_id)?;
    let signer = signer_from_env()?;
    let provider = Arc::new(ChainProvider::connect(&config.rpc, chain, signer).await?);
    let ledger = Arc::new(AlloyLedger::new(provider, &config.rpc));

    let contracts = config.contracts_by_chain()?;
    let reader = MarketReader::new(Arc::clone(&ledger), Arc::clone(&registry));
    let workflow = PositionWorkflow::new(Arc::clone(&ledger), Arc::clone(&registry), contracts.clone())
        .with_allowance_policy(config.workflow.allowance_policy());

    // ── 5. Run the command ──────────────────────────────────
    match command {
        Command::Verify => {
            anyhow::ensure!(ledger.is_healthy().await, "RPC endpoint is not serving blocks");
            let checks = reader.verify_deployments(chain).await;
            let missing = checks.iter().filter(|c| !c.is_deployed()).count();
            anyhow::ensure!(missing == 0, "{missing} market(s) failed verification on {chain}");
            to_json(&checks)
        }

        Command::Balance => {
            let contracts = contracts
                .get(&chain)
                .with_context(|| format!("No protocol contracts configured for {chain}"))?;
            to_json(&reader.collateral_balance(contracts).await?)
        }

        Command::Mint { amount } => {
            let amount = to_ufixed6(amount)?;
            let tx_hash = workflow.mint_collateral(chain, amount).await?;
            workflow.confirm(WorkflowStep::FundCollateral, tx_hash).await?;
            Ok(json!({ "chain": chain, "tx_hash": tx_hash }))
        }

        Command::Modify {
            asset,
            side,
            size,
            collateral,
            fund,
        } => {
            let order = PositionOrder {
                chain_id,
                asset,
                request: PositionModificationRequest::from_decimals(side, size, collateral)?,
                fund_amount: fund.map(to_ufixed6).transpose()?,
            };

            match workflow.execute(&order).await {
                Ok(report) => {
                    metrics.observe_report(&report);
                    to_json(&report)
                }
                Err(failure) => {
                    metrics.observe_failure(&failure);
                    for receipt in &failure.completed {
                        warn!(step = %receipt.step, tx_hash = %receipt.tx_hash, "Step confirmed before halt");
                    }
                    Err(failure.into())
                }
            }
        }

        Command::Markets | Command::Lookup { .. } => {
            anyhow::bail!("{command:?} does not need a ledger connection")
        }
    }
}

fn lookup(
    registry: &MarketRegistry,
    chain_id: u64,
    asset: Option<Asset>,
    address: Option<Address>,
) -> Result<serde_json::Value> {
    if let Some(address) = address {
        let asset = registry.asset_for_address(address);
        return Ok(json!({ "address": address, "asset": asset }));
    }

    let asset = asset.context("--asset or --address is required")?;
    let chain = Chain::try_from(chain_id)?;
    let address = registry.address_for_asset(chain, asset);
    Ok(json!({ "chain": chain, "asset": asset, "address": address }))
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).context("Failed to serialize output")
}
