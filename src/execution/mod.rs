//! Execution module - runs strategies against listings
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────────┐   ┌─────────────────┐
//! │StrategyLookup│──▶│CompetitorPriceResolver│──▶│ PriceCalculator │
//! └──────────────┘   └──────────────────────┘   └────────┬────────┘
//!                                                        │
//!                    ┌──────────────┐   ┌────────────────▼┐
//!                    │ExecutionSink │◀──│ ExecutionGuard  │──▶ ListingGateway
//!                    └──────────────┘   └─────────────────┘
//! ```
//!
//! Every collaborator call is bounded by the engine call timeout. Nothing is
//! retried inside the engine; callers reschedule.

mod executor;
mod guard;
mod types;

pub use executor::{Collaborators, StrategyExecutor};

pub use guard::{ExecutionGuard, GuardSettings};

pub use types::{BatchSummary, ExecutionOutcome, ExecutionState, ItemError, OutcomeReason};
