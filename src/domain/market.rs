//! Core market domain types.
//!
//! Defines the fixed enumerations the protocol is operated over: supported
//! chains, base assets and their metadata, collateral currencies, and the
//! position side/status tags reported by the markets.
//!
//! Declaration order matters here. `Chain::ALL` and `Asset::ALL` are the
//! canonical iteration orders used by the registry for listings and for the
//! reverse address scan.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ────────────────────────────────────────────
// Chains
// ────────────────────────────────────────────

/// Supported networks, declared in ascending chain-id order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Chain {
    /// Ethereum mainnet.
    Mainnet,
    /// Ethereum Goerli testnet.
    Goerli,
    /// Arbitrum One.
    Arbitrum,
    /// Base Goerli testnet.
    BaseGoerli,
    /// Arbitrum Goerli testnet (the only chain with live V2 markets).
    #[default]
    ArbitrumGoerli,
}

/// Raised when a chain id falls outside the supported set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unsupported chain id {0}")]
pub struct UnsupportedChain(pub u64);

impl Chain {
    /// Every supported chain in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Mainnet,
        Self::Goerli,
        Self::Arbitrum,
        Self::BaseGoerli,
        Self::ArbitrumGoerli,
    ];

    /// EIP-155 chain id.
    pub const fn id(self) -> u64 {
        match self {
            Self::Mainnet => 1,
            Self::Goerli => 5,
            Self::Arbitrum => 42_161,
            Self::BaseGoerli => 84_531,
            Self::ArbitrumGoerli => 421_613,
        }
    }

    /// Human-readable network name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mainnet => "Ethereum",
            Self::Goerli => "Goerli",
            Self::Arbitrum => "Arbitrum One",
            Self::BaseGoerli => "Base Goerli",
            Self::ArbitrumGoerli => "Arbitrum Goerli",
        }
    }

    /// Whether the network is a testnet (faucet mints and testnet price feeds).
    pub const fn is_testnet(self) -> bool {
        matches!(self, Self::Goerli | Self::BaseGoerli | Self::ArbitrumGoerli)
    }
}

impl TryFrom<u64> for Chain {
    type Error = UnsupportedChain;

    fn try_from(id: u64) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|chain| chain.id() == id)
            .ok_or(UnsupportedChain(id))
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.id())
    }
}

// ────────────────────────────────────────────
// Assets
// ────────────────────────────────────────────

/// Base instruments with V2 markets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Asset {
    /// Bitcoin.
    Btc,
    /// Ethereum.
    Eth,
}

/// Quote side of every market pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteCurrency {
    Usd,
}

/// Static per-asset metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetMetadata {
    pub name: &'static str,
    pub symbol: &'static str,
    pub display_decimals: u32,
    pub quote_currency: QuoteCurrency,
    /// Pyth price feed id used on mainnets.
    pub pyth_feed_id: &'static str,
    /// Pyth price feed id used on testnets.
    pub pyth_feed_id_testnet: &'static str,
}

const BTC_METADATA: AssetMetadata = AssetMetadata {
    name: "Bitcoin",
    symbol: "BTC-USD",
    display_decimals: 2,
    quote_currency: QuoteCurrency::Usd,
    pyth_feed_id: "0xe62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43",
    pyth_feed_id_testnet: "0xf9c0172ba10dfa4d19088d94f5bf61d3b54d5bd7483a322a982e1373ee8ea31b",
};

const ETH_METADATA: AssetMetadata = AssetMetadata {
    name: "Ethereum",
    symbol: "ETH-USD",
    display_decimals: 6,
    quote_currency: QuoteCurrency::Usd,
    pyth_feed_id: "0xff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace",
    pyth_feed_id_testnet: "0xca80ba6dc32e08d06f1aa886011eed1d77c77be9eb761cc10d72b7d0a2fd57a6",
};

impl Asset {
    /// Every supported asset in declaration order.
    pub const ALL: [Self; 2] = [Self::Btc, Self::Eth];

    pub const fn metadata(self) -> &'static AssetMetadata {
        match self {
            Self::Btc => &BTC_METADATA,
            Self::Eth => &ETH_METADATA,
        }
    }

    /// Pyth feed id for the given network.
    pub const fn pyth_feed_id(self, chain: Chain) -> &'static str {
        let meta = self.metadata();
        if chain.is_testnet() {
            meta.pyth_feed_id_testnet
        } else {
            meta.pyth_feed_id
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Btc => "btc",
            Self::Eth => "eth",
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unrecognised enum tags coming from the CLI or the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} `{value}`")]
pub struct ParseTagError {
    kind: &'static str,
    value: String,
}

impl ParseTagError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl FromStr for Asset {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "btc" => Ok(Self::Btc),
            "eth" => Ok(Self::Eth),
            _ => Err(ParseTagError::new("asset", s)),
        }
    }
}

// ────────────────────────────────────────────
// Collateral currencies
// ────────────────────────────────────────────

/// Collateral tokens. Both use 6 decimals on every supported chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    #[serde(rename = "USDC")]
    Usdc,
    #[serde(rename = "DSU")]
    Dsu,
}

impl Currency {
    pub const fn decimals(self) -> u32 {
        match self {
            Self::Usdc | Self::Dsu => 6,
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Usdc => "USDC",
            Self::Dsu => "DSU",
        }
    }
}

// ────────────────────────────────────────────
// Positions
// ────────────────────────────────────────────

/// Directional exposure of a position. `None` is flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Maker,
    Long,
    Short,
    None,
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Maker => "maker",
            Self::Long => "long",
            Self::Short => "short",
            Self::None => "none",
        };
        f.write_str(tag)
    }
}

impl FromStr for PositionSide {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "maker" => Ok(Self::Maker),
            "long" => Ok(Self::Long),
            "short" => Ok(Self::Short),
            "none" | "flat" => Ok(Self::None),
            _ => Err(ParseTagError::new("position side", s)),
        }
    }
}

/// Lifecycle tag reported for a position. Not computed locally.
///
/// `Resolved` travels as `noValue` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "opening")]
    Opening,
    #[serde(rename = "closing")]
    Closing,
    #[serde(rename = "closed")]
    Closed,
    #[serde(rename = "pricing")]
    Pricing,
    #[serde(rename = "noValue")]
    Resolved,
    #[serde(rename = "failed")]
    Failed,
}

impl PositionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Opening => "opening",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Pricing => "pricing",
            Self::Resolved => "noValue",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PositionStatus {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "opening" => Ok(Self::Opening),
            "closing" => Ok(Self::Closing),
            "closed" => Ok(Self::Closed),
            "pricing" => Ok(Self::Pricing),
            "noValue" => Ok(Self::Resolved),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseTagError::new("position status", s)),
        }
    }
}
