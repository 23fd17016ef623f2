//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires from
//! the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `LedgerTransport`: transaction submission, confirmation and reads

pub mod ledger;

pub use ledger::LedgerTransport;
