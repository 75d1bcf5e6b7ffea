//! Collaborator contracts consumed by the repricing engine
//!
//! Everything that touches eBay, persistence or the outside world sits behind
//! one of these traits. The engine only ever sees normalized shapes.

use async_trait::async_trait;

use super::errors::Result;
use super::types::{CompetitorListing, ExecutionRecord, ListingPrice, PriceUpdate, PushReceipt, SearchQuery};
use crate::competitor::{CompetitorRule, ManualCompetitorList};
use crate::pricing::{AssignedStrategy, ListingBinding};

/// Reads and writes the price of our own listings
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ListingGateway: Send + Sync {
    /// Current price of the listing
    async fn current_price(&self, item_id: &str) -> Result<ListingPrice>;

    /// Push a new price to the marketplace
    ///
    /// A receipt with `success == false` means the marketplace rejected the
    /// change; transport failures surface as errors.
    async fn push_price(&self, update: &PriceUpdate) -> Result<PushReceipt>;
}

/// Storage for manually curated competitor lists
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompetitorStore: Send + Sync {
    /// Manual list for a listing, `None` when the user never created one
    async fn manual_competitors(
        &self,
        user_id: &str,
        item_id: &str,
    ) -> Result<Option<ManualCompetitorList>>;

    /// Persist refreshed prices and monitoring metadata
    async fn save_manual_competitors(&self, list: &ManualCompetitorList) -> Result<()>;
}

/// Live competitor data source
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompetitorFeed: Send + Sync {
    /// Current price of a single competing listing
    async fn competitor_price(&self, competitor_item_id: &str) -> Result<ListingPrice>;

    /// Bounded keyword/MPN/UPC/EAN search
    async fn search_competitors(&self, query: &SearchQuery) -> Result<Vec<CompetitorListing>>;
}

/// Read side of the strategy/rule configuration
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StrategyLookup: Send + Sync {
    /// Strategy attached to a listing together with the listing binding
    async fn load_strategy(&self, item_id: &str) -> Result<Option<AssignedStrategy>>;

    /// Competitor rule attached to a listing
    async fn load_rule(&self, item_id: &str) -> Result<Option<CompetitorRule>>;

    /// Every listing bound to an active strategy
    async fn active_listings(&self) -> Result<Vec<ListingBinding>>;
}

/// Append-only sink for applied price changes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionSink: Send + Sync {
    async fn record_execution(&self, record: &ExecutionRecord) -> Result<()>;
}
