//! Market Registry - Chain-scoped Market Address Table
//!
//! Maps (chain, asset) to the deployed market contract address. The table
//! is plain data: built once at startup, never mutated, and shared by
//! reference. All lookups are pure.
//!
//! Iteration order is fixed: chains in `Chain::ALL` order, assets in
//! `Asset::ALL` order. Listings and the reverse scan both follow it, so a
//! duplicated address always resolves to the same asset.

use std::collections::BTreeMap;

use alloy::primitives::{Address, address};
use serde::Serialize;
use thiserror::Error;

use super::market::{Asset, Chain, Currency};

/// One row of the registry table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketRegistryEntry {
    pub chain: Chain,
    pub asset: Asset,
    pub address: Address,
}

/// A market deployed on a given chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeployedMarket {
    pub asset: Asset,
    pub address: Address,
}

/// Rejections raised while building a registry table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate market entry for {asset} on {chain}")]
    DuplicateEntry { chain: Chain, asset: Asset },
    #[error("zero market address for {asset} on {chain}")]
    ZeroAddress { chain: Chain, asset: Asset },
}

/// Protocol-wide contracts a chain needs before positions can be modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolContracts {
    /// Collateral token.
    pub collateral_token: Address,
    /// Currency the collateral token denominates.
    pub collateral_currency: Currency,
    /// Market factory holding operator approvals.
    pub market_factory: Address,
    /// Position-manager contract authorised as operator.
    pub operator: Address,
}

/// Shipped V2 market deployments.
const BUILTIN_MARKETS: [MarketRegistryEntry; 2] = [
    MarketRegistryEntry {
        chain: Chain::ArbitrumGoerli,
        asset: Asset::Eth,
        address: address!("0x39c5795f3B3F3C63E71d6c1274682496Bd981fcA"),
    },
    MarketRegistryEntry {
        chain: Chain::ArbitrumGoerli,
        asset: Asset::Btc,
        address: address!("0xdd3E45E6c5A01420C3e98335366161769A4A76b4"),
    },
];

const _: () = assert!(
    table_is_valid(&BUILTIN_MARKETS),
    "builtin market table has a zero address or a duplicate (chain, asset)"
);

/// Const check mirroring `from_entries`: no zero address, no repeated pair.
const fn table_is_valid(entries: &[MarketRegistryEntry]) -> bool {
    let mut i = 0;
    while i < entries.len() {
        if address_is_zero(&entries[i].address) {
            return false;
        }
        let mut j = i + 1;
        while j < entries.len() {
            if entries[i].chain as u8 == entries[j].chain as u8
                && entries[i].asset as u8 == entries[j].asset as u8
            {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

const fn address_is_zero(address: &Address) -> bool {
    let bytes = &address.0.0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != 0 {
            return false;
        }
        i += 1;
    }
    true
}

/// Immutable (chain, asset) → market address table.
#[derive(Debug, Clone, Default)]
pub struct MarketRegistry {
    markets: BTreeMap<(Chain, Asset), Address>,
}

impl MarketRegistry {
    /// The registry shipped with the binary.
    pub fn builtin() -> Self {
        // BUILTIN_MARKETS is validated at compile time.
        let markets = BUILTIN_MARKETS
            .iter()
            .map(|e| ((e.chain, e.asset), e.address))
            .collect();
        Self { markets }
    }

    /// Build a registry from explicit entries.
    ///
    /// # Errors
    /// Rejects a second entry for the same (chain, asset) and zero addresses.
    pub fn from_entries<I>(entries: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = MarketRegistryEntry>,
    {
        let mut markets = BTreeMap::new();

        for entry in entries {
            let MarketRegistryEntry {
                chain,
                asset,
                address,
            } = entry;

            if address.is_zero() {
                return Err(RegistryError::ZeroAddress { chain, asset });
            }
            if markets.insert((chain, asset), address).is_some() {
                return Err(RegistryError::DuplicateEntry { chain, asset });
            }
        }

        Ok(Self { markets })
    }

    /// Market address for `asset` on `chain`; `None` when not deployed there.
    pub fn address_for_asset(&self, chain: Chain, asset: Asset) -> Option<Address> {
        self.markets.get(&(chain, asset)).copied()
    }

    /// Reverse lookup across every chain.
    ///
    /// Scans chains then assets in declaration order and returns the first
    /// match.
    pub fn asset_for_address(&self, address: Address) -> Option<Asset> {
        Chain::ALL.iter().find_map(|&chain| {
            Asset::ALL
                .iter()
                .copied()
                .find(|&asset| self.address_for_asset(chain, asset) == Some(address))
        })
    }

    /// Markets deployed on `chain`, in asset declaration order.
    pub fn list_deployed_markets(&self, chain: Chain) -> Vec<DeployedMarket> {
        Asset::ALL
            .iter()
            .filter_map(|&asset| {
                self.address_for_asset(chain, asset)
                    .map(|address| DeployedMarket { asset, address })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKET_A: Address = address!("0x1111111111111111111111111111111111111111");
    const MARKET_B: Address = address!("0x2222222222222222222222222222222222222222");

    fn entry(chain: Chain, asset: Asset, address: Address) -> MarketRegistryEntry {
        MarketRegistryEntry {
            chain,
            asset,
            address,
        }
    }

    #[test]
    fn test_builtin_table_is_valid() {
        let registry = MarketRegistry::from_entries(BUILTIN_MARKETS);
        assert!(registry.is_ok());
        assert_eq!(MarketRegistry::builtin().len(), BUILTIN_MARKETS.len());
    }

    #[test]
    fn test_builtin_arbitrum_goerli_markets() {
        let registry = MarketRegistry::builtin();
        assert_eq!(
            registry.address_for_asset(Chain::ArbitrumGoerli, Asset::Eth),
            Some(address!("0x39c5795f3B3F3C63E71d6c1274682496Bd981fcA"))
        );
        assert_eq!(
            registry.address_for_asset(Chain::ArbitrumGoerli, Asset::Btc),
            Some(address!("0xdd3E45E6c5A01420C3e98335366161769A4A76b4"))
        );
        assert_eq!(registry.address_for_asset(Chain::Arbitrum, Asset::Eth), None);
    }

    #[test]
    fn test_listing_follows_asset_order_not_insertion() {
        // Eth is inserted before Btc in the builtin table.
        let listed = MarketRegistry::builtin().list_deployed_markets(Chain::ArbitrumGoerli);
        let assets: Vec<Asset> = listed.iter().map(|m| m.asset).collect();
        assert_eq!(assets, vec![Asset::Btc, Asset::Eth]);
    }

    #[test]
    fn test_empty_chain_lists_nothing() {
        let registry = MarketRegistry::builtin();
        assert!(registry.list_deployed_markets(Chain::Mainnet).is_empty());
        assert!(
            MarketRegistry::default()
                .list_deployed_markets(Chain::ArbitrumGoerli)
                .is_empty()
        );
    }

    #[test]
    fn test_reverse_lookup() {
        let registry = MarketRegistry::builtin();
        assert_eq!(
            registry.asset_for_address(address!("0xdd3E45E6c5A01420C3e98335366161769A4A76b4")),
            Some(Asset::Btc)
        );
        assert_eq!(registry.asset_for_address(MARKET_A), None);
    }

    #[test]
    fn test_duplicate_address_resolves_in_chain_then_asset_order() {
        // Same address listed as Eth on Goerli and Btc on Arbitrum Goerli.
        // Goerli is declared first, so Eth wins.
        let registry = MarketRegistry::from_entries([
            entry(Chain::ArbitrumGoerli, Asset::Btc, MARKET_A),
            entry(Chain::Goerli, Asset::Eth, MARKET_A),
        ])
        .unwrap();
        assert_eq!(registry.asset_for_address(MARKET_A), Some(Asset::Eth));

        // Within one chain Btc precedes Eth.
        let registry = MarketRegistry::from_entries([
            entry(Chain::Arbitrum, Asset::Eth, MARKET_B),
            entry(Chain::Arbitrum, Asset::Btc, MARKET_B),
        ])
        .unwrap();
        assert_eq!(registry.asset_for_address(MARKET_B), Some(Asset::Btc));
    }

    #[test]
    fn test_duplicate_pair_rejected() {
        let err = MarketRegistry::from_entries([
            entry(Chain::Arbitrum, Asset::Eth, MARKET_A),
            entry(Chain::Arbitrum, Asset::Eth, MARKET_B),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateEntry {
                chain: Chain::Arbitrum,
                asset: Asset::Eth
            }
        );
    }

    #[test]
    fn test_zero_address_rejected() {
        let err =
            MarketRegistry::from_entries([entry(Chain::Mainnet, Asset::Btc, Address::ZERO)])
                .unwrap_err();
        assert!(matches!(err, RegistryError::ZeroAddress { .. }));
    }

    #[test]
    fn test_const_table_check() {
        assert!(table_is_valid(&BUILTIN_MARKETS));
        assert!(table_is_valid(&[]));
        assert!(!table_is_valid(&[entry(Chain::Mainnet, Asset::Btc, Address::ZERO)]));
        assert!(!table_is_valid(&[
            entry(Chain::Goerli, Asset::Eth, MARKET_A),
            entry(Chain::Goerli, Asset::Eth, MARKET_B),
        ]));
        assert!(table_is_valid(&[
            entry(Chain::Goerli, Asset::Eth, MARKET_A),
            entry(Chain::Goerli, Asset::Btc, MARKET_A),
        ]));
    }
}
