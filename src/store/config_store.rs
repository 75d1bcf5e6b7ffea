//! In-memory strategy, rule and listing configuration

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::common::clock::{Clock, SystemClock};
use crate::common::errors::{RepricerError, Result};
use crate::common::traits::{ExecutionSink, StrategyLookup};
use crate::common::types::{ExecutionRecord, ListingTarget};
use crate::competitor::{CompetitorRule, RuleDraft, RuleUpdate};
use crate::pricing::{validate_bounds, AssignedStrategy, ListingBinding, PricingStrategy, StrategyDraft, StrategyUpdate};
use crate::store::snapshot::CatalogSnapshot;

/// Default number of execution records kept per strategy
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Listing details supplied when attaching a strategy or rule
#[derive(Debug, Clone, Default)]
pub struct ApplyTarget {
    /// Owner of the listing; required when the listing is new
    pub user_id: Option<String>,
    pub sku: Option<String>,
    pub title: Option<String>,
}

impl ApplyTarget {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[derive(Debug, Default)]
struct Catalog {
    strategies: HashMap<String, PricingStrategy>,
    rules: HashMap<String, CompetitorRule>,
    listings: HashMap<String, ListingBinding>,
}

impl Catalog {
    fn strategy_mut(&mut self, id: &str) -> Result<&mut PricingStrategy> {
        self.strategies
            .get_mut(id)
            .ok_or_else(|| RepricerError::NotFound(format!("strategy {}", id)))
    }

    fn rule_mut(&mut self, id: &str) -> Result<&mut CompetitorRule> {
        self.rules
            .get_mut(id)
            .ok_or_else(|| RepricerError::NotFound(format!("rule {}", id)))
    }

    /// Conflict when another strategy already uses `name`
    fn ensure_strategy_name_free(&self, name: &str, except: Option<&str>) -> Result<()> {
        let taken = self
            .strategies
            .values()
            .any(|s| s.name == name && Some(s.id.as_str()) != except);
        if taken {
            return Err(RepricerError::Conflict(format!("strategy name {:?} is already in use", name)));
        }
        Ok(())
    }

    /// Conflict when another rule already uses `name`
    fn ensure_rule_name_free(&self, name: &str, except: Option<&str>) -> Result<()> {
        let taken = self
            .rules
            .values()
            .any(|r| r.name == name && Some(r.id.as_str()) != except);
        if taken {
            return Err(RepricerError::Conflict(format!("rule name {:?} is already in use", name)));
        }
        Ok(())
    }

    /// Existing binding, or a fresh one when the target names the owner
    fn binding_for(&mut self, item_id: &str, target: &ApplyTarget) -> Result<&mut ListingBinding> {
        if !self.listings.contains_key(item_id) {
            let user_id = target.user_id.clone().ok_or_else(|| {
                RepricerError::Validation(format!("user_id is required to register listing {}", item_id))
            })?;
            self.listings
                .insert(item_id.to_string(), ListingBinding::new(item_id, user_id));
        }
        let binding = self
            .listings
            .get_mut(item_id)
            .ok_or_else(|| RepricerError::Internal(format!("listing {} vanished", item_id)))?;
        if target.sku.is_some() {
            binding.sku = target.sku.clone();
        }
        if target.title.is_some() {
            binding.title = target.title.clone();
        }
        Ok(binding)
    }
}

/// Strategy and rule catalog with listing bindings
///
/// Each listing is bound to at most one strategy and one rule. Binding a
/// listing elsewhere detaches it from its previous strategy or rule.
pub struct ConfigStore {
    catalog: Arc<RwLock<Catalog>>,
    clock: Arc<dyn Clock>,
    history_limit: usize,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog: Arc::new(RwLock::new(Catalog::default())),
            clock,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Bound on each strategy's execution history
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    // ========================================================================
    // Strategies
    // ========================================================================

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_strategy(&self, draft: StrategyDraft) -> Result<PricingStrategy> {
        let draft = draft.validate()?;
        let mut catalog = self.catalog.write().await;
        catalog.ensure_strategy_name_free(&draft.name, None)?;

        let strategy = PricingStrategy::from_draft(Uuid::new_v4().to_string(), draft, self.clock.now());
        catalog.strategies.insert(strategy.id.clone(), strategy.clone());
        info!(id = %strategy.id, rule = %strategy.repricing_rule, "Created strategy");
        Ok(strategy)
    }

    #[instrument(skip(self, update))]
    pub async fn update_strategy(&self, id: &str, update: StrategyUpdate) -> Result<PricingStrategy> {
        let now = self.clock.now();
        let mut catalog = self.catalog.write().await;
        let draft = update.merge(catalog.strategy_mut(id)?.draft()).validate()?;
        catalog.ensure_strategy_name_free(&draft.name, Some(id))?;

        let strategy = catalog.strategy_mut(id)?;
        strategy.apply_draft(draft, now);
        Ok(strategy.clone())
    }

    /// Delete a strategy; fails while it is still applied to a listing
    #[instrument(skip(self))]
    pub async fn delete_strategy(&self, id: &str) -> Result<()> {
        let mut catalog = self.catalog.write().await;
        let strategy = catalog.strategy_mut(id)?;
        if !strategy.applies_to.is_empty() {
            return Err(RepricerError::Conflict(format!(
                "strategy {} is applied to {} listing(s)",
                id,
                strategy.applies_to.len()
            )));
        }
        catalog.strategies.remove(id);
        info!("Deleted strategy {}", id);
        Ok(())
    }

    pub async fn get_strategy(&self, id: &str) -> Result<PricingStrategy> {
        self.catalog
            .read()
            .await
            .strategies
            .get(id)
            .cloned()
            .ok_or_else(|| RepricerError::NotFound(format!("strategy {}", id)))
    }

    /// All strategies, oldest first
    pub async fn list_strategies(&self) -> Vec<PricingStrategy> {
        let catalog = self.catalog.read().await;
        let mut strategies: Vec<_> = catalog.strategies.values().cloned().collect();
        strategies.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        strategies
    }

    /// Mark one strategy as the default, clearing the flag everywhere else
    #[instrument(skip(self))]
    pub async fn set_default_strategy(&self, id: &str) -> Result<()> {
        let mut catalog = self.catalog.write().await;
        catalog.strategy_mut(id)?;
        for (strategy_id, strategy) in catalog.strategies.iter_mut() {
            strategy.is_default = strategy_id == id;
        }
        Ok(())
    }

    pub async fn default_strategy(&self) -> Option<PricingStrategy> {
        self.catalog
            .read()
            .await
            .strategies
            .values()
            .find(|s| s.is_default)
            .cloned()
    }

    /// Bind a listing to a strategy
    #[instrument(skip(self, target))]
    pub async fn apply_strategy(
        &self,
        item_id: &str,
        strategy_id: &str,
        target: ApplyTarget,
    ) -> Result<ListingBinding> {
        let now = self.clock.now();
        let mut catalog = self.catalog.write().await;
        catalog.strategy_mut(strategy_id)?;

        let binding = catalog.binding_for(item_id, &target)?;
        let previous = binding.strategy_id.replace(strategy_id.to_string());
        let listing_target = ListingTarget {
            item_id: item_id.to_string(),
            sku: binding.sku.clone(),
            title: binding.title.clone(),
            date_applied: now,
        };
        let binding = binding.clone();

        if let Some(previous) = previous.filter(|p| p != strategy_id) {
            if let Some(old) = catalog.strategies.get_mut(&previous) {
                old.applies_to.remove_item(item_id);
                info!("Detached item {} from strategy {}", item_id, previous);
            }
        }
        let applies_to = &mut catalog.strategy_mut(strategy_id)?.applies_to;
        applies_to.remove_item(item_id);
        applies_to.upsert(listing_target);

        info!("Applied strategy {} to item {}", strategy_id, item_id);
        Ok(binding)
    }

    /// Detach a listing (and optionally a specific SKU) from its strategy
    #[instrument(skip(self))]
    pub async fn remove_strategy(&self, item_id: &str, sku: Option<&str>) -> Result<()> {
        let mut catalog = self.catalog.write().await;
        let strategy_id = catalog
            .listings
            .get(item_id)
            .and_then(|l| l.strategy_id.clone())
            .ok_or_else(|| RepricerError::NotFound(format!("no strategy applied to item {}", item_id)))?;

        let strategy = catalog.strategy_mut(&strategy_id)?;
        if !strategy.applies_to.remove(item_id, sku) {
            return Err(RepricerError::NotFound(format!(
                "strategy {} is not applied to item {} with sku {:?}",
                strategy_id, item_id, sku
            )));
        }
        let still_applied = strategy.applies_to.contains(item_id);

        if !still_applied {
            if let Some(binding) = catalog.listings.get_mut(item_id) {
                binding.strategy_id = None;
            }
        }
        info!("Removed strategy {} from item {}", strategy_id, item_id);
        Ok(())
    }

    // ========================================================================
    // Competitor rules
    // ========================================================================

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_rule(&self, draft: RuleDraft) -> Result<CompetitorRule> {
        let draft = draft.validate()?;
        let mut catalog = self.catalog.write().await;
        catalog.ensure_rule_name_free(&draft.name, None)?;

        let rule = CompetitorRule::from_draft(Uuid::new_v4().to_string(), draft, self.clock.now());
        catalog.rules.insert(rule.id.clone(), rule.clone());
        info!(id = %rule.id, "Created competitor rule");
        Ok(rule)
    }

    #[instrument(skip(self, update))]
    pub async fn update_rule(&self, id: &str, update: RuleUpdate) -> Result<CompetitorRule> {
        let now = self.clock.now();
        let mut catalog = self.catalog.write().await;
        let draft = update.merge(catalog.rule_mut(id)?.draft()).validate()?;
        catalog.ensure_rule_name_free(&draft.name, Some(id))?;

        let rule = catalog.rule_mut(id)?;
        rule.apply_draft(draft, now);
        Ok(rule.clone())
    }

    #[instrument(skip(self))]
    pub async fn delete_rule(&self, id: &str) -> Result<()> {
        let mut catalog = self.catalog.write().await;
        let rule = catalog.rule_mut(id)?;
        if !rule.applies_to.is_empty() {
            return Err(RepricerError::Conflict(format!(
                "rule {} is applied to {} listing(s)",
                id,
                rule.applies_to.len()
            )));
        }
        catalog.rules.remove(id);
        info!("Deleted competitor rule {}", id);
        Ok(())
    }

    pub async fn get_rule(&self, id: &str) -> Result<CompetitorRule> {
        self.catalog
            .read()
            .await
            .rules
            .get(id)
            .cloned()
            .ok_or_else(|| RepricerError::NotFound(format!("rule {}", id)))
    }

    pub async fn list_rules(&self) -> Vec<CompetitorRule> {
        let catalog = self.catalog.read().await;
        let mut rules: Vec<_> = catalog.rules.values().cloned().collect();
        rules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        rules
    }

    #[instrument(skip(self, target))]
    pub async fn apply_rule(&self, item_id: &str, rule_id: &str, target: ApplyTarget) -> Result<ListingBinding> {
        let now = self.clock.now();
        let mut catalog = self.catalog.write().await;
        catalog.rule_mut(rule_id)?;

        let binding = catalog.binding_for(item_id, &target)?;
        let previous = binding.rule_id.replace(rule_id.to_string());
        let listing_target = ListingTarget {
            item_id: item_id.to_string(),
            sku: binding.sku.clone(),
            title: binding.title.clone(),
            date_applied: now,
        };
        let binding = binding.clone();

        if let Some(previous) = previous.filter(|p| p != rule_id) {
            if let Some(old) = catalog.rules.get_mut(&previous) {
                old.applies_to.remove_item(item_id);
            }
        }
        let applies_to = &mut catalog.rule_mut(rule_id)?.applies_to;
        applies_to.remove_item(item_id);
        applies_to.upsert(listing_target);

        info!("Applied competitor rule {} to item {}", rule_id, item_id);
        Ok(binding)
    }

    #[instrument(skip(self))]
    pub async fn remove_rule(&self, item_id: &str, sku: Option<&str>) -> Result<()> {
        let mut catalog = self.catalog.write().await;
        let rule_id = catalog
            .listings
            .get(item_id)
            .and_then(|l| l.rule_id.clone())
            .ok_or_else(|| RepricerError::NotFound(format!("no rule applied to item {}", item_id)))?;

        let rule = catalog.rule_mut(&rule_id)?;
        if !rule.applies_to.remove(item_id, sku) {
            return Err(RepricerError::NotFound(format!(
                "rule {} is not applied to item {} with sku {:?}",
                rule_id, item_id, sku
            )));
        }
        let still_applied = rule.applies_to.contains(item_id);

        if !still_applied {
            if let Some(binding) = catalog.listings.get_mut(item_id) {
                binding.rule_id = None;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Listings
    // ========================================================================

    /// Per-listing price bounds; `None` falls back to the strategy's
    #[instrument(skip(self))]
    pub async fn set_listing_bounds(
        &self,
        item_id: &str,
        min_price: Option<Decimal>,
        max_price: Option<Decimal>,
    ) -> Result<ListingBinding> {
        validate_bounds(min_price, max_price, "listing")?;

        let mut catalog = self.catalog.write().await;
        let binding = catalog
            .listings
            .get_mut(item_id)
            .ok_or_else(|| RepricerError::NotFound(format!("listing {}", item_id)))?;
        binding.min_price = min_price;
        binding.max_price = max_price;
        Ok(binding.clone())
    }

    /// Register or refresh listing metadata, keeping existing bindings and bounds
    pub async fn upsert_listing(&self, listing: ListingBinding) -> Result<ListingBinding> {
        if listing.item_id.trim().is_empty() || listing.user_id.trim().is_empty() {
            return Err(RepricerError::Validation("listing needs item_id and user_id".into()));
        }
        validate_bounds(listing.min_price, listing.max_price, "listing")?;

        let mut catalog = self.catalog.write().await;
        let merged = match catalog.listings.get(&listing.item_id) {
            Some(existing) => ListingBinding {
                strategy_id: existing.strategy_id.clone(),
                rule_id: existing.rule_id.clone(),
                min_price: listing.min_price.or(existing.min_price),
                max_price: listing.max_price.or(existing.max_price),
                ..listing
            },
            None => listing,
        };
        catalog.listings.insert(merged.item_id.clone(), merged.clone());
        Ok(merged)
    }

    pub async fn get_listing(&self, item_id: &str) -> Option<ListingBinding> {
        self.catalog.read().await.listings.get(item_id).cloned()
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Load strategies, rules and listings; manual competitors are ignored here
    pub async fn import(&self, snapshot: &CatalogSnapshot) -> Result<()> {
        for strategy in &snapshot.strategies {
            validate_bounds(strategy.min_price, strategy.max_price, "strategy")?;
        }
        for listing in &snapshot.listings {
            validate_bounds(listing.min_price, listing.max_price, "listing")?;
        }

        let mut catalog = self.catalog.write().await;
        for strategy in &snapshot.strategies {
            catalog.strategies.insert(strategy.id.clone(), strategy.clone());
        }
        for rule in &snapshot.rules {
            catalog.rules.insert(rule.id.clone(), rule.clone());
        }
        for listing in &snapshot.listings {
            catalog.listings.insert(listing.item_id.clone(), listing.clone());
        }
        info!(
            strategies = catalog.strategies.len(),
            rules = catalog.rules.len(),
            listings = catalog.listings.len(),
            "Imported catalog"
        );
        Ok(())
    }

    pub async fn export(&self) -> CatalogSnapshot {
        let mut listings: Vec<_> = self.catalog.read().await.listings.values().cloned().collect();
        listings.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        CatalogSnapshot {
            strategies: self.list_strategies().await,
            rules: self.list_rules().await,
            listings,
            manual_competitors: Vec::new(),
        }
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StrategyLookup for ConfigStore {
    async fn load_strategy(&self, item_id: &str) -> Result<Option<AssignedStrategy>> {
        let catalog = self.catalog.read().await;
        let Some(listing) = catalog.listings.get(item_id) else {
            return Ok(None);
        };
        let Some(strategy_id) = &listing.strategy_id else {
            return Ok(None);
        };
        match catalog.strategies.get(strategy_id) {
            Some(strategy) => Ok(Some(AssignedStrategy {
                strategy: strategy.clone(),
                listing: listing.clone(),
            })),
            None => {
                warn!("Item {} is bound to missing strategy {}", item_id, strategy_id);
                Ok(None)
            }
        }
    }

    async fn load_rule(&self, item_id: &str) -> Result<Option<CompetitorRule>> {
        let catalog = self.catalog.read().await;
        Ok(catalog
            .listings
            .get(item_id)
            .and_then(|l| l.rule_id.as_ref())
            .and_then(|id| catalog.rules.get(id))
            .cloned())
    }

    async fn active_listings(&self) -> Result<Vec<ListingBinding>> {
        let catalog = self.catalog.read().await;
        let mut active: Vec<_> = catalog
            .listings
            .values()
            .filter(|l| {
                l.strategy_id
                    .as_ref()
                    .and_then(|id| catalog.strategies.get(id))
                    .map(|s| s.is_active)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        active.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        Ok(active)
    }
}

#[async_trait]
impl ExecutionSink for ConfigStore {
    /// Append to the strategy's history and bump usage of strategy and rule
    async fn record_execution(&self, record: &ExecutionRecord) -> Result<()> {
        let limit = self.history_limit;
        let mut catalog = self.catalog.write().await;
        catalog
            .strategy_mut(&record.strategy_id)?
            .push_history(record.clone(), limit);

        if let Some(rule_id) = &record.rule_id {
            if let Some(rule) = catalog.rules.get_mut(rule_id) {
                rule.mark_used(record.timestamp);
            }
        }
        Ok(())
    }
}
