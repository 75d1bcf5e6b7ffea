//! Common test utilities and fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use ebay_repricer::common::types::{CompetitorListing, ListingPrice, PriceUpdate, PushReceipt, SearchQuery};
use ebay_repricer::{
    ApplyTarget, Collaborators, CompetitorFeed, ConfigStore, EngineSettings, ListingGateway, ManualClock,
    ManualCompetitorStore, PricingStrategy, RepricerError, Result, StrategyDraft, StrategyExecutor,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const USER: &str = "user-1";

/// In-memory marketplace standing in for the pricing gateway
#[derive(Default)]
pub struct FakeMarketplace {
    prices: Mutex<HashMap<String, Decimal>>,
    unavailable: Mutex<HashSet<String>>,
    rejecting: Mutex<HashSet<String>>,
    pushes: Mutex<Vec<PriceUpdate>>,
    search_results: Mutex<Vec<CompetitorListing>>,
    searches: Mutex<Vec<SearchQuery>>,
}

impl FakeMarketplace {
    pub fn set_price(&self, item_id: &str, price: Decimal) {
        self.prices.lock().insert(item_id.to_string(), price);
    }

    pub fn price(&self, item_id: &str) -> Option<Decimal> {
        self.prices.lock().get(item_id).copied()
    }

    /// Reads of this item fail as if the upstream were down
    pub fn make_unavailable(&self, item_id: &str) {
        self.unavailable.lock().insert(item_id.to_string());
    }

    /// Pushes for this item come back with `success: false`
    pub fn reject_pushes(&self, item_id: &str) {
        self.rejecting.lock().insert(item_id.to_string());
    }

    pub fn set_search_results(&self, results: Vec<CompetitorListing>) {
        *self.search_results.lock() = results;
    }

    pub fn pushes(&self) -> Vec<PriceUpdate> {
        self.pushes.lock().clone()
    }

    pub fn searches(&self) -> Vec<SearchQuery> {
        self.searches.lock().clone()
    }

    fn read(&self, item_id: &str) -> Result<ListingPrice> {
        if self.unavailable.lock().contains(item_id) {
            return Err(RepricerError::UpstreamUnavailable(format!("{} unavailable", item_id)));
        }
        self.price(item_id)
            .map(|price| ListingPrice::new(price, "USD"))
            .ok_or_else(|| RepricerError::NotFound(format!("listing {}", item_id)))
    }
}

#[async_trait]
impl ListingGateway for FakeMarketplace {
    async fn current_price(&self, item_id: &str) -> Result<ListingPrice> {
        self.read(item_id)
    }

    async fn push_price(&self, update: &PriceUpdate) -> Result<PushReceipt> {
        if self.rejecting.lock().contains(&update.item_id) {
            return Ok(PushReceipt::rejected("trading_api", "listing has ended"));
        }
        self.pushes.lock().push(update.clone());
        self.set_price(&update.item_id, update.price);
        Ok(PushReceipt::ok("inventory_api"))
    }
}

#[async_trait]
impl CompetitorFeed for FakeMarketplace {
    async fn competitor_price(&self, competitor_item_id: &str) -> Result<ListingPrice> {
        self.read(competitor_item_id)
    }

    async fn search_competitors(&self, query: &SearchQuery) -> Result<Vec<CompetitorListing>> {
        self.searches.lock().push(query.clone());
        Ok(self.search_results.lock().clone())
    }
}

/// Engine wired to in-memory collaborators
pub struct Harness {
    pub store: Arc<ConfigStore>,
    pub competitors: Arc<ManualCompetitorStore>,
    pub market: Arc<FakeMarketplace>,
    pub clock: Arc<ManualClock>,
    pub executor: StrategyExecutor,
}

/// Engine settings with live refresh and search switched off
pub fn quiet_settings() -> EngineSettings {
    EngineSettings {
        refresh_competitor_prices: false,
        live_search_enabled: false,
        ..Default::default()
    }
}

pub fn harness(settings: EngineSettings) -> Harness {
    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(
        ConfigStore::with_clock(clock.clone()).with_history_limit(settings.execution_history_limit),
    );
    let competitors = Arc::new(ManualCompetitorStore::with_clock(clock.clone()));
    let market = Arc::new(FakeMarketplace::default());

    let executor = StrategyExecutor::new(
        Collaborators {
            lookup: store.clone(),
            gateway: market.clone(),
            competitors: competitors.clone(),
            feed: Some(market.clone() as Arc<dyn CompetitorFeed>),
            sink: store.clone(),
        },
        &settings,
        clock.clone(),
    );

    Harness {
        store,
        competitors,
        market,
        clock,
        executor,
    }
}

impl Harness {
    /// Create a strategy and bind it to a listing owned by [`USER`]
    pub async fn assign(&self, item_id: &str, draft: StrategyDraft) -> PricingStrategy {
        let strategy = self
            .store
            .create_strategy(draft)
            .await
            .expect("strategy should be valid");
        self.store
            .apply_strategy(
                item_id,
                &strategy.id,
                ApplyTarget::for_user(USER)
                    .with_sku(format!("SKU-{}", item_id))
                    .with_title(format!("Blue widget {}", item_id)),
            )
            .await
            .expect("strategy should apply");
        strategy
    }

    /// Bind another listing to an existing strategy
    pub async fn bind(&self, item_id: &str, strategy: &PricingStrategy) {
        self.store
            .apply_strategy(
                item_id,
                &strategy.id,
                ApplyTarget::for_user(USER).with_sku(format!("SKU-{}", item_id)),
            )
            .await
            .expect("strategy should apply");
    }

    pub async fn add_competitor(&self, item_id: &str, listing: CompetitorListing) {
        self.competitors
            .add_competitor(USER, item_id, listing)
            .await
            .expect("competitor should be new");
    }

    pub async fn history(&self, strategy_id: &str) -> Vec<ebay_repricer::ExecutionRecord> {
        self.store
            .get_strategy(strategy_id)
            .await
            .expect("strategy exists")
            .execution_history
    }
}
