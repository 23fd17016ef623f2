//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (blockchain RPC, file I/O). Each sub-module groups
//! adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `chain`: EVM interaction via alloy-rs (`LedgerTransport`)
//! - `metrics`: Prometheus metrics export

pub mod chain;
pub mod metrics;
