//! eBay Repricer Library
//!
//! Decision engine that keeps a seller's eBay listing prices competitive:
//! it resolves the lowest qualifying competitor price, computes a target
//! price from the listing's strategy and pushes meaningful changes.

pub mod common;
pub mod competitor;
pub mod config;
pub mod execution;
pub mod gateway;
pub mod pricing;
pub mod store;

// Re-export commonly used types
pub use common::clock::{Clock, ManualClock, SystemClock};
pub use common::errors::{RepricerError, Result};
pub use common::traits::{CompetitorFeed, CompetitorStore, ExecutionSink, ListingGateway, StrategyLookup};
pub use common::types::{
    ChangeDirection, CompetitorListing, ExecutionRecord, ListingPrice, PriceUpdate, PushReceipt, SearchQuery,
};
pub use config::types::{AppConfig, EngineSettings};
pub use gateway::HttpGateway;
pub use store::{ApplyTarget, CatalogSnapshot, ConfigStore};

// Engine types
pub use competitor::{
    CompetitorPriceResolver, CompetitorQuote, CompetitorRule, ManualCompetitorList, ManualCompetitorStore,
    PriceSource, QuoteOutcome, RuleDraft, RuleUpdate,
};
pub use execution::{BatchSummary, Collaborators, ExecutionGuard, ExecutionOutcome, OutcomeReason, StrategyExecutor};
pub use pricing::{
    AdjustmentMode, CustomPricing, ListingBinding, NoCompetitionAction, PriceCalculator, PricingStrategy,
    RepricingRule, StrategyDraft, StrategyUpdate,
};
