//! Property-Based Tests — Market Registry Invariants
//!
//! Uses `proptest` to verify that registry lookups stay consistent with
//! each other for the builtin table and for random tables.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy::primitives::{Address, Bytes, I256, TxHash, U256};
use async_trait::async_trait;
use proptest::prelude::*;
use proptest::sample::select;

use perennial_operator::domain::calls::ContractCall;
use perennial_operator::domain::market::{Asset, Chain, PositionSide};
use perennial_operator::domain::position::{PositionModificationRequest, TransactionOutcome, TxStatus};
use perennial_operator::domain::registry::{MarketRegistry, MarketRegistryEntry};
use perennial_operator::ports::ledger::LedgerTransport;
use perennial_operator::usecases::{PositionOrder, PositionWorkflow, WorkflowError};

/// Counts submissions and confirms everything.
#[derive(Default)]
struct CountingLedger {
    submitted: AtomicUsize,
}

#[async_trait]
impl LedgerTransport for CountingLedger {
    fn account(&self) -> Address {
        Address::repeat_byte(0xa1)
    }

    async fn submit(&self, _call: &ContractCall) -> anyhow::Result<TxHash> {
        let n = self.submitted.fetch_add(1, Ordering::SeqCst);
        Ok(TxHash::with_last_byte(u8::try_from(n % 256)?))
    }

    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> anyhow::Result<TransactionOutcome> {
        Ok(TransactionOutcome {
            tx_hash,
            status: TxStatus::Success,
        })
    }

    async fn read(&self, _call: &ContractCall) -> anyhow::Result<Bytes> {
        Ok(Bytes::new())
    }

    async fn has_code(&self, _address: Address) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

fn any_chain() -> impl Strategy<Value = Chain> {
    select(Chain::ALL.to_vec())
}

fn any_asset() -> impl Strategy<Value = Asset> {
    select(Asset::ALL.to_vec())
}

/// Random tables: each (chain, asset) at most once, distinct non-zero addresses.
fn any_registry() -> impl Strategy<Value = MarketRegistry> {
    prop::collection::btree_set((any_chain(), any_asset()), 0..10).prop_map(|pairs: BTreeSet<(Chain, Asset)>| {
        let entries = pairs.into_iter().enumerate().map(|(i, (chain, asset))| {
            let mut bytes = [0u8; 20];
            bytes[12..].copy_from_slice(&(i as u64 + 1).to_be_bytes());
            MarketRegistryEntry {
                chain,
                asset,
                address: Address::from(bytes),
            }
        });
        MarketRegistry::from_entries(entries).unwrap()
    })
}

// ── Lookup Properties ───────────────────────────────────────

proptest! {
    /// Builtin lookups never yield the zero address.
    #[test]
    fn builtin_address_never_zero(chain in any_chain(), asset in any_asset()) {
        let registry = MarketRegistry::builtin();
        if let Some(address) = registry.address_for_asset(chain, asset) {
            prop_assert!(!address.is_zero(), "{asset} on {chain} resolved to zero");
        }
    }

    /// Listings equal the present lookups, in asset order.
    #[test]
    fn listing_matches_lookups(registry in any_registry(), chain in any_chain()) {
        let expected: Vec<(Asset, Address)> = Asset::ALL
            .iter()
            .filter_map(|&asset| registry.address_for_asset(chain, asset).map(|a| (asset, a)))
            .collect();
        let listed: Vec<(Asset, Address)> = registry
            .list_deployed_markets(chain)
            .into_iter()
            .map(|m| (m.asset, m.address))
            .collect();
        prop_assert_eq!(listed, expected);
    }

    /// Reverse lookup recovers the asset of every resolved address.
    #[test]
    fn reverse_lookup_is_left_inverse(registry in any_registry(), chain in any_chain(), asset in any_asset()) {
        if let Some(address) = registry.address_for_asset(chain, asset) {
            prop_assert_eq!(registry.asset_for_address(address), Some(asset));
        }
    }

    /// Unknown addresses never resolve.
    #[test]
    fn unknown_address_resolves_to_none(registry in any_registry(), tail in any::<u64>()) {
        let mut bytes = [0xffu8; 20];
        bytes[12..].copy_from_slice(&tail.to_be_bytes());
        prop_assert_eq!(registry.asset_for_address(Address::from(bytes)), None);
    }

    /// An empty table lists nothing on any chain.
    #[test]
    fn empty_registry_lists_nothing(chain in any_chain(), asset in any_asset()) {
        let registry = MarketRegistry::default();
        prop_assert!(registry.list_deployed_markets(chain).is_empty());
        prop_assert_eq!(registry.address_for_asset(chain, asset), None);
    }
}

// ── Workflow Resolution Properties ──────────────────────────

proptest! {
    /// A pair missing from the table fails resolution before any submission.
    #[test]
    fn undeployed_pair_never_submits(registry in any_registry(), chain in any_chain(), asset in any_asset()) {
        prop_assume!(registry.address_for_asset(chain, asset).is_none());

        let ledger = Arc::new(CountingLedger::default());
        let workflow = PositionWorkflow::new(Arc::clone(&ledger), Arc::new(registry), BTreeMap::new());
        let order = PositionOrder {
            chain_id: chain.id(),
            asset,
            request: PositionModificationRequest {
                side: PositionSide::Maker,
                size: U256::from(1u64),
                collateral_delta: I256::ZERO,
            },
            fund_amount: None,
        };

        let failure = tokio_test::block_on(workflow.execute(&order)).unwrap_err();
        let is_not_deployed = matches!(failure.error, WorkflowError::MarketNotDeployed { .. });
        prop_assert!(is_not_deployed);
        prop_assert_eq!(ledger.submitted.load(Ordering::SeqCst), 0);
    }
}
