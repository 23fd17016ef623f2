//! Chain Adapters - Blockchain Interaction Layer
//!
//! Provides on-chain access via alloy-rs 0.9 for:
//! - RPC provider management with an attached signing wallet
//! - The `LedgerTransport` port: submission, confirmation, reads

pub mod ledger;
pub mod provider;

pub use ledger::AlloyLedger;
pub use provider::ChainProvider;
