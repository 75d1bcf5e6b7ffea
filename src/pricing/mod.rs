//! Pricing module - strategy definitions and the price calculator
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CONFIGURATION                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  StrategyDraft ──validate()──► PricingStrategy              │
//! │  ListingBinding (per-listing strategy, rule, min/max)       │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PRICING PATH (pure)                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  competitor price ─┐                                        │
//! │  current price ────┼─► rule target ─► clamp ─► snap ─► round│
//! │  listing bounds ───┘                                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`PricingStrategy`]: stored strategy with its `applies_to` targets
//! - [`PriceCalculator`]: pure mapping to a target price
//! - [`CustomPricing`]: optional evaluator for `CUSTOM` strategies

mod calculator;
mod traits;
mod types;

pub use calculator::{
    ClampBound, PriceBasis, PriceCalculator, PriceDecision, PriceInputs, DEFAULT_SNAP_THRESHOLD,
};

pub use traits::{CustomPricing, SharedCustomPricing};

pub(crate) use types::validate_bounds;
pub use types::{
    AdjustmentMode, AssignedStrategy, ListingBinding, NoCompetitionAction, PricingStrategy,
    RepricingRule, StrategyDraft, StrategyUpdate,
};
