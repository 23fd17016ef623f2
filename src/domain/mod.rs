//! Domain layer - Core market model and pure logic.
//!
//! Holds the fixed chain/asset enumerations, the market registry, position
//! requests, and the contract-call encoder. Nothing here performs I/O
//! (hexagonal architecture inner ring); every type is testable in isolation.

pub mod calls;
pub mod market;
pub mod position;
pub mod registry;

// Re-export core types for convenience
pub use calls::ContractCall;
pub use market::{Asset, Chain, Currency, PositionSide, PositionStatus, UnsupportedChain};
pub use position::{PositionModificationRequest, TransactionOutcome, TxStatus};
pub use registry::{
    DeployedMarket, MarketRegistry, MarketRegistryEntry, ProtocolContracts, RegistryError,
};
