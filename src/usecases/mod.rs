//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement the
//! operator's workflows. Each use case is a self-contained operation.
//!
//! Use cases:
//! - `PositionWorkflow`: resolve → fund → approve → approve operator → modify
//! - `MarketReader`: registry listings, deployment checks, collateral balance

pub mod market_reader;
pub mod position_workflow;

pub use market_reader::MarketReader;
pub use position_workflow::{
  AllowancePolicy, PositionOrder, PositionWorkflow, StepReceipt, WorkflowError, WorkflowFailure,
  WorkflowReport, WorkflowStep,
};
