//! Competitor module - rules, manual competitor lists and price resolution
//!
//! # Resolution order
//!
//! 1. Manual competitor list for (user, item), refreshed live when due
//! 2. Rule exclusions (country, condition, title words, seller, price window)
//! 3. Lowest remaining price
//! 4. Live search, only when no manual data exists at all
//!
//! A list that exists but filters to empty is reported as
//! [`QuoteOutcome::FilteredOut`], never as missing data.

mod filter;
mod manual;
mod resolver;
mod types;

pub use filter::{CompetitorFilter, Exclusion, FilterOutcome};

pub use manual::ManualCompetitorStore;

pub use resolver::{
    CompetitorPriceResolver, CompetitorQuote, PriceSource, QuoteOutcome, ResolveRequest,
    ResolverSettings,
};

pub use types::{CompetitorRule, ManualCompetitor, ManualCompetitorList, RuleDraft, RuleUpdate};
