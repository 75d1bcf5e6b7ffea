//! Per-item and batch orchestration of a repricing run

use futures_util::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::common::clock::Clock;
use crate::common::errors::{RepricerError, Result};
use crate::common::timeout::with_timeout;
use crate::common::traits::{CompetitorFeed, CompetitorStore, ExecutionSink, ListingGateway, StrategyLookup};
use crate::common::types::{ChangeDirection, ExecutionRecord, PriceUpdate};
use crate::competitor::{CompetitorPriceResolver, ResolveRequest};
use crate::config::EngineSettings;
use crate::execution::guard::ExecutionGuard;
use crate::execution::types::{BatchSummary, ExecutionOutcome, ExecutionState, OutcomeReason};
use crate::pricing::{AssignedStrategy, PriceCalculator, PriceInputs, SharedCustomPricing};

/// Everything the executor talks to
#[derive(Clone)]
pub struct Collaborators {
    pub lookup: Arc<dyn StrategyLookup>,
    pub gateway: Arc<dyn ListingGateway>,
    pub competitors: Arc<dyn CompetitorStore>,
    /// Live competitor data; without it manual prices are never refreshed
    pub feed: Option<Arc<dyn CompetitorFeed>>,
    pub sink: Arc<dyn ExecutionSink>,
}

/// Runs strategies against listings
///
/// Owns the guard, so cooldown and de-dup state live as long as the executor.
pub struct StrategyExecutor {
    lookup: Arc<dyn StrategyLookup>,
    gateway: Arc<dyn ListingGateway>,
    sink: Arc<dyn ExecutionSink>,
    resolver: CompetitorPriceResolver,
    calculator: PriceCalculator,
    guard: ExecutionGuard,
    clock: Arc<dyn Clock>,
    call_timeout: Duration,
    max_concurrency: usize,
}

fn enter(item_id: &str, state: ExecutionState) {
    debug!(item_id, state = ?state, "Execution state");
}

impl StrategyExecutor {
    pub fn new(collab: Collaborators, settings: &EngineSettings, clock: Arc<dyn Clock>) -> Self {
        let resolver = CompetitorPriceResolver::new(
            collab.competitors,
            collab.feed,
            clock.clone(),
            settings.resolver_settings(),
        );
        Self {
            lookup: collab.lookup,
            gateway: collab.gateway,
            sink: collab.sink,
            resolver,
            calculator: PriceCalculator::new(settings.stay_above_snap_threshold),
            guard: ExecutionGuard::new(settings.guard_settings(), clock.clone()),
            clock,
            call_timeout: settings.call_timeout(),
            max_concurrency: settings.max_concurrency.max(1),
        }
    }

    /// Install an evaluator for `CUSTOM` strategies
    pub fn with_custom_pricing(mut self, custom: SharedCustomPricing) -> Self {
        self.calculator = self.calculator.with_custom_pricing(custom);
        self
    }

    pub fn guard(&self) -> &ExecutionGuard {
        &self.guard
    }

    /// Reprice one listing
    ///
    /// Business outcomes (no strategy, cooldown, upstream failures) come back
    /// as an [`ExecutionOutcome`]; only malformed input is an `Err`.
    #[instrument(skip(self))]
    pub async fn execute_for_item(&self, item_id: &str) -> Result<ExecutionOutcome> {
        if item_id.trim().is_empty() {
            return Err(RepricerError::Validation("item_id must not be empty".into()));
        }
        enter(item_id, ExecutionState::Idle);

        let assigned = match with_timeout("load_strategy", self.call_timeout, self.lookup.load_strategy(item_id)).await {
            Ok(Some(assigned)) => assigned,
            Ok(None) => {
                info!("No strategy assigned to item {}", item_id);
                return Ok(ExecutionOutcome::no_strategy(item_id, OutcomeReason::NoStrategyAssigned));
            }
            Err(e) => {
                error!(error = %e, "Strategy lookup failed");
                return Ok(ExecutionOutcome::unavailable(item_id, OutcomeReason::StrategyLookupFailed, e));
            }
        };

        let strategy_name = assigned.strategy.name.clone();
        if !assigned.strategy.is_active {
            info!(strategy = %strategy_name, "Strategy is inactive");
            return Ok(ExecutionOutcome::no_strategy(item_id, OutcomeReason::StrategyInactive)
                .with_strategy(strategy_name));
        }

        if !self.guard.try_begin(item_id) {
            info!("Item {} is cooling down", item_id);
            return Ok(ExecutionOutcome::skipped(item_id, OutcomeReason::CooldownActive).with_strategy(strategy_name));
        }

        let current_price = match with_timeout("current_price", self.call_timeout, self.gateway.current_price(item_id)).await {
            Ok(listing) if listing.price > Decimal::ZERO => listing.price,
            Ok(listing) => {
                warn!(price = %listing.price, "Current price is not positive");
                return Ok(ExecutionOutcome::unavailable(
                    item_id,
                    OutcomeReason::CurrentPriceUnavailable,
                    format!("current price {} is not positive", listing.price),
                )
                .with_strategy(strategy_name));
            }
            Err(e) => {
                warn!(error = %e, "Current price unavailable");
                return Ok(ExecutionOutcome::unavailable(item_id, OutcomeReason::CurrentPriceUnavailable, e)
                    .with_strategy(strategy_name));
            }
        };

        self.reprice(assigned, current_price).await
    }

    async fn reprice(&self, assigned: AssignedStrategy, current_price: Decimal) -> Result<ExecutionOutcome> {
        let AssignedStrategy { strategy, listing } = assigned;
        let item_id = listing.item_id.as_str();
        enter(item_id, ExecutionState::ResolvingCompetitor);

        let competitor_failed = |e: RepricerError| {
            warn!(error = %e, "Competitor lookup failed");
            ExecutionOutcome::unavailable(item_id, OutcomeReason::CompetitorLookupFailed, e)
                .with_strategy(strategy.name.clone())
                .with_prices(Some(current_price), None, None)
        };

        let rule = match with_timeout("load_rule", self.call_timeout, self.lookup.load_rule(item_id)).await {
            Ok(rule) => rule.filter(|r| r.is_active),
            Err(e) => return Ok(competitor_failed(e)),
        };

        let request = ResolveRequest {
            listing: &listing,
            rule: rule.as_ref(),
            current_price: Some(current_price),
        };
        let quote = match self.resolver.resolve(&request).await {
            Ok(quote) => quote,
            Err(e) => return Ok(competitor_failed(e)),
        };

        enter(item_id, ExecutionState::Calculating);
        let decision = self.calculator.compute(&PriceInputs {
            strategy: &strategy,
            competitor_price: quote.price,
            current_price,
            listing_min: listing.min_price,
            listing_max: listing.max_price,
        });
        let new_price = decision.target;

        enter(item_id, ExecutionState::Guarding);
        if !self.guard.should_apply(current_price, new_price) {
            info!(current = %current_price, target = %new_price, "Price already optimal");
            return Ok(ExecutionOutcome::skipped(item_id, OutcomeReason::PriceAlreadyOptimal)
                .with_strategy(strategy.name.clone())
                .with_prices(Some(current_price), Some(new_price), quote.price)
                .with_source(quote.source));
        }

        enter(item_id, ExecutionState::Pushing);
        let update = PriceUpdate {
            item_id: item_id.to_string(),
            sku: listing.sku.clone(),
            price: new_price,
        };
        let receipt = match with_timeout("push_price", self.call_timeout, self.gateway.push_price(&update)).await {
            Ok(receipt) if receipt.success => receipt,
            Ok(receipt) => {
                let message = receipt
                    .message
                    .unwrap_or_else(|| format!("{} rejected the price change", receipt.method));
                error!(method = %receipt.method, "Price push rejected: {}", message);
                return Ok(ExecutionOutcome::push_failed(item_id, message)
                    .with_strategy(strategy.name.clone())
                    .with_prices(Some(current_price), Some(new_price), quote.price)
                    .with_source(quote.source));
            }
            Err(e) => {
                error!(error = %e, "Price push failed");
                return Ok(ExecutionOutcome::push_failed(item_id, e)
                    .with_strategy(strategy.name.clone())
                    .with_prices(Some(current_price), Some(new_price), quote.price)
                    .with_source(quote.source));
            }
        };

        info!(
            old = %current_price,
            new = %new_price,
            competitor = ?quote.price,
            method = %receipt.method,
            "Price updated"
        );

        let mut recorded = false;
        if self.guard.should_record(item_id, new_price) {
            let record = ExecutionRecord {
                item_id: item_id.to_string(),
                sku: listing.sku.clone(),
                old_price: current_price,
                new_price,
                competitor_price: quote.price,
                change_amount: (new_price - current_price).abs(),
                change_direction: ChangeDirection::between(current_price, new_price),
                strategy_id: strategy.id.clone(),
                strategy_name: strategy.name.clone(),
                rule_id: rule.as_ref().map(|r| r.id.clone()),
                timestamp: self.clock.now(),
                success: true,
                method: Some(receipt.method.clone()),
            };
            match with_timeout("record_execution", self.call_timeout, self.sink.record_execution(&record)).await {
                Ok(()) => recorded = true,
                Err(e) => warn!(error = %e, "Could not record execution"),
            }
        }
        enter(item_id, ExecutionState::Recorded);

        let mut outcome = ExecutionOutcome::updated(item_id)
            .with_strategy(strategy.name.clone())
            .with_prices(Some(current_price), Some(new_price), quote.price)
            .with_source(quote.source);
        outcome.method = Some(receipt.method);
        outcome.recorded = recorded;
        Ok(outcome)
    }

    /// Reprice every listing bound to an active strategy
    ///
    /// One item's failure never affects another; only a failure to list the
    /// active listings is an `Err`.
    #[instrument(skip(self))]
    pub async fn execute_all_active(&self) -> Result<BatchSummary> {
        let listings = with_timeout("active_listings", self.call_timeout, self.lookup.active_listings()).await?;

        let mut seen = HashSet::new();
        let item_ids: Vec<String> = listings
            .into_iter()
            .map(|l| l.item_id)
            .filter(|id| seen.insert(id.clone()))
            .collect();
        info!("Executing strategies for {} listings", item_ids.len());

        let outcomes: Vec<ExecutionOutcome> = stream::iter(item_ids)
            .map(|item_id| async move {
                match self.execute_for_item(&item_id).await {
                    Ok(outcome) => outcome,
                    Err(e) => ExecutionOutcome::rejected(&item_id, &e),
                }
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let summary = BatchSummary::from_outcomes(outcomes);
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            changed = summary.changed,
            "Batch execution finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::clock::ManualClock;
    use crate::common::traits::{
        MockCompetitorStore, MockExecutionSink, MockListingGateway, MockStrategyLookup,
    };
    use crate::common::types::{ListingPrice, PushReceipt};
    use crate::competitor::PriceSource;
    use crate::pricing::{AdjustmentMode, ListingBinding, PricingStrategy, StrategyDraft};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn beat_by_two_cents() -> AssignedStrategy {
        let draft = StrategyDraft::beat_lowest("Beat by 2c", AdjustmentMode::Amount, dec!(0.02))
            .validate()
            .unwrap();
        AssignedStrategy {
            strategy: PricingStrategy::from_draft("s-1", draft, Utc::now()),
            listing: ListingBinding::new("item-1", "user-1").with_sku("SKU-1"),
        }
    }

    fn manual_competitors(price: Decimal) -> MockCompetitorStore {
        let mut store = MockCompetitorStore::new();
        store.expect_manual_competitors().returning(move |user, item| {
            let mut list = crate::competitor::ManualCompetitorList::new(user, item);
            list.add(crate::common::types::CompetitorListing::new("c-1", price), Utc::now())
                .unwrap();
            Ok(Some(list))
        });
        store
    }

    struct Mocks {
        lookup: MockStrategyLookup,
        gateway: MockListingGateway,
        store: MockCompetitorStore,
        sink: MockExecutionSink,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                lookup: MockStrategyLookup::new(),
                gateway: MockListingGateway::new(),
                store: MockCompetitorStore::new(),
                sink: MockExecutionSink::new(),
            }
        }

        fn executor(self) -> StrategyExecutor {
            let settings = EngineSettings {
                refresh_competitor_prices: false,
                ..Default::default()
            };
            StrategyExecutor::new(
                Collaborators {
                    lookup: Arc::new(self.lookup),
                    gateway: Arc::new(self.gateway),
                    competitors: Arc::new(self.store),
                    feed: None,
                    sink: Arc::new(self.sink),
                },
                &settings,
                Arc::new(ManualClock::default()),
            )
        }
    }

    #[tokio::test]
    async fn test_beats_lowest_and_records() {
        let mut mocks = Mocks::new();
        mocks.lookup.expect_load_strategy().withf(|item| item == "item-1").returning(|_| Ok(Some(beat_by_two_cents())));
        mocks.lookup.expect_load_rule().returning(|_| Ok(None));
        mocks.gateway.expect_current_price().returning(|_| Ok(ListingPrice::new(dec!(5.30), "USD")));
        mocks
            .gateway
            .expect_push_price()
            .withf(|update| update.price == dec!(5.25) && update.sku.as_deref() == Some("SKU-1"))
            .times(1)
            .returning(|_| Ok(PushReceipt::ok("inventory_api")));
        mocks.store = manual_competitors(dec!(5.27));
        mocks
            .sink
            .expect_record_execution()
            .withf(|r| {
                r.old_price == dec!(5.30)
                    && r.new_price == dec!(5.25)
                    && r.change_amount == dec!(0.05)
                    && r.change_direction == ChangeDirection::Decreased
            })
            .times(1)
            .returning(|_| Ok(()));

        let outcome = mocks.executor().execute_for_item("item-1").await.unwrap();

        assert!(outcome.success);
        assert!(outcome.price_changed);
        assert!(outcome.recorded);
        assert_eq!(outcome.state, ExecutionState::Recorded);
        assert_eq!(outcome.old_price, Some(dec!(5.30)));
        assert_eq!(outcome.new_price, Some(dec!(5.25)));
        assert_eq!(outcome.competitor_price, Some(dec!(5.27)));
        assert_eq!(outcome.competitor_source, Some(PriceSource::Manual));
        assert_eq!(outcome.method.as_deref(), Some("inventory_api"));
    }

    #[tokio::test]
    async fn test_no_strategy() {
        let mut mocks = Mocks::new();
        mocks.lookup.expect_load_strategy().returning(|_| Ok(None));
        mocks.gateway.expect_current_price().never();

        let outcome = mocks.executor().execute_for_item("item-1").await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.reason, OutcomeReason::NoStrategyAssigned);
        assert_eq!(outcome.state, ExecutionState::NoStrategy);
    }

    #[tokio::test]
    async fn test_inactive_strategy() {
        let mut mocks = Mocks::new();
        mocks.lookup.expect_load_strategy().returning(|_| {
            let mut assigned = beat_by_two_cents();
            assigned.strategy.is_active = false;
            Ok(Some(assigned))
        });

        let outcome = mocks.executor().execute_for_item("item-1").await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.reason, OutcomeReason::StrategyInactive);
    }

    #[tokio::test]
    async fn test_empty_item_id_is_rejected() {
        let result = Mocks::new().executor().execute_for_item("  ").await;
        assert!(matches!(result, Err(RepricerError::Validation(_))));
    }

    #[tokio::test]
    async fn test_current_price_failure() {
        let mut mocks = Mocks::new();
        mocks.lookup.expect_load_strategy().returning(|_| Ok(Some(beat_by_two_cents())));
        mocks
            .gateway
            .expect_current_price()
            .returning(|_| Err(RepricerError::UpstreamUnavailable("HTTP 503".into())));
        mocks.gateway.expect_push_price().never();

        let outcome = mocks.executor().execute_for_item("item-1").await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.reason, OutcomeReason::CurrentPriceUnavailable);
        assert_eq!(outcome.state, ExecutionState::Unavailable);
        assert!(outcome.error.unwrap().contains("HTTP 503"));
    }

    #[tokio::test]
    async fn test_non_positive_current_price() {
        let mut mocks = Mocks::new();
        mocks.lookup.expect_load_strategy().returning(|_| Ok(Some(beat_by_two_cents())));
        mocks.gateway.expect_current_price().returning(|_| Ok(ListingPrice::new(dec!(0), "USD")));

        let outcome = mocks.executor().execute_for_item("item-1").await.unwrap();
        assert_eq!(outcome.reason, OutcomeReason::CurrentPriceUnavailable);
    }

    #[tokio::test]
    async fn test_competitor_lookup_failure() {
        let mut mocks = Mocks::new();
        mocks.lookup.expect_load_strategy().returning(|_| Ok(Some(beat_by_two_cents())));
        mocks.lookup.expect_load_rule().returning(|_| Ok(None));
        mocks.gateway.expect_current_price().returning(|_| Ok(ListingPrice::new(dec!(5.30), "USD")));
        mocks
            .store
            .expect_manual_competitors()
            .returning(|_, _| Err(RepricerError::UpstreamUnavailable("db down".into())));
        mocks.gateway.expect_push_price().never();

        let outcome = mocks.executor().execute_for_item("item-1").await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.reason, OutcomeReason::CompetitorLookupFailed);
        assert_eq!(outcome.old_price, Some(dec!(5.30)));
    }

    #[tokio::test]
    async fn test_push_rejected_writes_no_history() {
        let mut mocks = Mocks::new();
        mocks.lookup.expect_load_strategy().returning(|_| Ok(Some(beat_by_two_cents())));
        mocks.lookup.expect_load_rule().returning(|_| Ok(None));
        mocks.gateway.expect_current_price().returning(|_| Ok(ListingPrice::new(dec!(5.30), "USD")));
        mocks
            .gateway
            .expect_push_price()
            .returning(|_| Ok(PushReceipt::rejected("trading_api", "listing has ended")));
        mocks.store = manual_competitors(dec!(5.27));
        mocks.sink.expect_record_execution().never();

        let outcome = mocks.executor().execute_for_item("item-1").await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.reason, OutcomeReason::PushFailed);
        assert_eq!(outcome.state, ExecutionState::PushFailed);
        assert_eq!(outcome.error.as_deref(), Some("listing has ended"));
    }

    #[tokio::test]
    async fn test_sink_failure_is_not_surfaced() {
        let mut mocks = Mocks::new();
        mocks.lookup.expect_load_strategy().returning(|_| Ok(Some(beat_by_two_cents())));
        mocks.lookup.expect_load_rule().returning(|_| Ok(None));
        mocks.gateway.expect_current_price().returning(|_| Ok(ListingPrice::new(dec!(5.30), "USD")));
        mocks.gateway.expect_push_price().returning(|_| Ok(PushReceipt::ok("inventory_api")));
        mocks.store = manual_competitors(dec!(5.27));
        mocks
            .sink
            .expect_record_execution()
            .returning(|_| Err(RepricerError::Internal("disk full".into())));

        let outcome = mocks.executor().execute_for_item("item-1").await.unwrap();
        assert!(outcome.success);
        assert!(outcome.price_changed);
        assert!(!outcome.recorded);
    }

    #[tokio::test]
    async fn test_second_call_hits_cooldown() {
        let mut mocks = Mocks::new();
        mocks.lookup.expect_load_strategy().returning(|_| Ok(Some(beat_by_two_cents())));
        mocks.lookup.expect_load_rule().returning(|_| Ok(None));
        mocks
            .gateway
            .expect_current_price()
            .times(1)
            .returning(|_| Ok(ListingPrice::new(dec!(5.30), "USD")));
        mocks.gateway.expect_push_price().times(1).returning(|_| Ok(PushReceipt::ok("inventory_api")));
        mocks.store = manual_competitors(dec!(5.27));
        mocks.sink.expect_record_execution().returning(|_| Ok(()));

        let executor = mocks.executor();
        let first = executor.execute_for_item("item-1").await.unwrap();
        let second = executor.execute_for_item("item-1").await.unwrap();

        assert!(first.price_changed);
        assert!(second.success);
        assert!(!second.price_changed);
        assert_eq!(second.reason, OutcomeReason::CooldownActive);
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let mut mocks = Mocks::new();
        mocks.lookup.expect_active_listings().returning(|| {
            Ok(vec![
                ListingBinding::new("item-1", "user-1"),
                ListingBinding::new("item-2", "user-1"),
                ListingBinding::new("item-1", "user-1"),
            ])
        });
        mocks.lookup.expect_load_strategy().returning(|item| {
            let mut assigned = beat_by_two_cents();
            assigned.listing.item_id = item.to_string();
            Ok(Some(assigned))
        });
        mocks.lookup.expect_load_rule().returning(|_| Ok(None));
        mocks.gateway.expect_current_price().returning(|item| match item {
            "item-1" => Ok(ListingPrice::new(dec!(5.30), "USD")),
            _ => Err(RepricerError::Timeout("current_price exceeded 15000 ms".into())),
        });
        mocks.gateway.expect_push_price().returning(|_| Ok(PushReceipt::ok("inventory_api")));
        mocks.store = manual_competitors(dec!(5.27));
        mocks.sink.expect_record_execution().returning(|_| Ok(()));

        let summary = mocks.executor().execute_all_active().await.unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.changed, 1);
        assert_eq!(summary.errors[0].item_id, "item-2");
        assert_eq!(summary.errors[0].reason, OutcomeReason::CurrentPriceUnavailable);
    }

    #[tokio::test]
    async fn test_batch_listing_failure_is_error() {
        let mut mocks = Mocks::new();
        mocks
            .lookup
            .expect_active_listings()
            .returning(|| Err(RepricerError::UpstreamUnavailable("db down".into())));

        assert!(mocks.executor().execute_all_active().await.is_err());
    }
}
