use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::errors::{RepricerError, Result};
use crate::common::types::{AppliesTo, ExecutionRecord};

/// How the target price relates to the lowest competitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepricingRule {
    MatchLowest,
    BeatLowest,
    StayAbove,
    Custom,
    /// Anything a newer schema wrote that this build does not know.
    /// Prices as "keep current".
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for RepricingRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RepricingRule::MatchLowest => "MATCH_LOWEST",
            RepricingRule::BeatLowest => "BEAT_LOWEST",
            RepricingRule::StayAbove => "STAY_ABOVE",
            RepricingRule::Custom => "CUSTOM",
            RepricingRule::Unknown => "UNKNOWN",
        };
        write!(f, "{}", name)
    }
}

/// Unit of the BEAT_LOWEST / STAY_ABOVE modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentMode {
    /// `value` is a currency amount
    Amount,
    /// `value` is a decimal fraction (0.10 = 10%)
    Percentage,
}

/// Fallback when no competitor price can be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoCompetitionAction {
    UseMaxPrice,
    #[default]
    KeepCurrent,
    UseMinPrice,
}

fn default_true() -> bool {
    true
}

/// Fields a caller supplies to create a strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub repricing_rule: RepricingRule,
    #[serde(default)]
    pub beat_by: Option<AdjustmentMode>,
    #[serde(default)]
    pub stay_above_by: Option<AdjustmentMode>,
    #[serde(default)]
    pub value: Option<Decimal>,
    #[serde(default)]
    pub min_price: Option<Decimal>,
    #[serde(default)]
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub no_competition_action: NoCompetitionAction,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl StrategyDraft {
    fn base(name: impl Into<String>, rule: RepricingRule) -> Self {
        Self {
            name: name.into(),
            description: None,
            repricing_rule: rule,
            beat_by: None,
            stay_above_by: None,
            value: None,
            min_price: None,
            max_price: None,
            no_competition_action: NoCompetitionAction::default(),
            is_active: true,
        }
    }

    pub fn match_lowest(name: impl Into<String>) -> Self {
        Self::base(name, RepricingRule::MatchLowest)
    }

    pub fn beat_lowest(name: impl Into<String>, mode: AdjustmentMode, value: Decimal) -> Self {
        Self {
            beat_by: Some(mode),
            value: Some(value),
            ..Self::base(name, RepricingRule::BeatLowest)
        }
    }

    pub fn stay_above(name: impl Into<String>, mode: AdjustmentMode, value: Decimal) -> Self {
        Self {
            stay_above_by: Some(mode),
            value: Some(value),
            ..Self::base(name, RepricingRule::StayAbove)
        }
    }

    pub fn custom(name: impl Into<String>) -> Self {
        Self::base(name, RepricingRule::Custom)
    }

    pub fn with_bounds(mut self, min_price: Option<Decimal>, max_price: Option<Decimal>) -> Self {
        self.min_price = min_price;
        self.max_price = max_price;
        self
    }

    pub fn on_no_competition(mut self, action: NoCompetitionAction) -> Self {
        self.no_competition_action = action;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Check the draft and drop modifier fields the rule does not use
    pub fn validate(mut self) -> Result<Self> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(RepricerError::Validation("strategy name is required".into()));
        }

        match self.repricing_rule {
            RepricingRule::BeatLowest => {
                let mode = self.beat_by.ok_or_else(|| {
                    RepricerError::Validation("BEAT_LOWEST requires beat_by".into())
                })?;
                validate_modifier(mode, self.value, "BEAT_LOWEST")?;
                self.stay_above_by = None;
            }
            RepricingRule::StayAbove => {
                let mode = self.stay_above_by.ok_or_else(|| {
                    RepricerError::Validation("STAY_ABOVE requires stay_above_by".into())
                })?;
                validate_modifier(mode, self.value, "STAY_ABOVE")?;
                self.beat_by = None;
            }
            RepricingRule::MatchLowest | RepricingRule::Custom => {
                self.beat_by = None;
                self.stay_above_by = None;
                self.value = None;
            }
            RepricingRule::Unknown => {
                return Err(RepricerError::Validation("unknown repricing rule".into()));
            }
        }

        validate_bounds(self.min_price, self.max_price, "strategy")?;
        Ok(self)
    }
}

fn validate_modifier(mode: AdjustmentMode, value: Option<Decimal>, rule: &str) -> Result<()> {
    let value =
        value.ok_or_else(|| RepricerError::Validation(format!("{} requires a value", rule)))?;
    if value < Decimal::ZERO {
        return Err(RepricerError::Validation(format!(
            "{} value must not be negative",
            rule
        )));
    }
    if mode == AdjustmentMode::Percentage && value > Decimal::ONE {
        return Err(RepricerError::Validation(format!(
            "{} percentage must be a decimal fraction <= 1, got {}",
            rule, value
        )));
    }
    Ok(())
}

/// Shared min/max sanity check for strategies and listing overrides
pub(crate) fn validate_bounds(
    min_price: Option<Decimal>,
    max_price: Option<Decimal>,
    what: &str,
) -> Result<()> {
    for (label, bound) in [("min_price", min_price), ("max_price", max_price)] {
        if let Some(price) = bound {
            if price <= Decimal::ZERO {
                return Err(RepricerError::Validation(format!(
                    "{} {} must be positive",
                    what, label
                )));
            }
        }
    }
    if let (Some(min), Some(max)) = (min_price, max_price) {
        if min > max {
            return Err(RepricerError::Validation(format!(
                "{} min_price {} exceeds max_price {}",
                what, min, max
            )));
        }
    }
    Ok(())
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyUpdate {
    #[serde(default)]
    pub name: Option<String>,
    /// `Some(None)` clears the description
    #[serde(default)]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub repricing_rule: Option<RepricingRule>,
    #[serde(default)]
    pub beat_by: Option<AdjustmentMode>,
    #[serde(default)]
    pub stay_above_by: Option<AdjustmentMode>,
    #[serde(default)]
    pub value: Option<Decimal>,
    /// `Some(None)` clears the bound
    #[serde(default)]
    pub min_price: Option<Option<Decimal>>,
    #[serde(default)]
    pub max_price: Option<Option<Decimal>>,
    #[serde(default)]
    pub no_competition_action: Option<NoCompetitionAction>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl StrategyUpdate {
    /// Merge onto an existing draft
    pub fn merge(self, mut draft: StrategyDraft) -> StrategyDraft {
        if let Some(name) = self.name {
            draft.name = name;
        }
        if let Some(description) = self.description {
            draft.description = description;
        }
        if let Some(rule) = self.repricing_rule {
            draft.repricing_rule = rule;
        }
        if self.beat_by.is_some() {
            draft.beat_by = self.beat_by;
        }
        if self.stay_above_by.is_some() {
            draft.stay_above_by = self.stay_above_by;
        }
        if self.value.is_some() {
            draft.value = self.value;
        }
        if let Some(min) = self.min_price {
            draft.min_price = min;
        }
        if let Some(max) = self.max_price {
            draft.max_price = max;
        }
        if let Some(action) = self.no_competition_action {
            draft.no_competition_action = action;
        }
        if let Some(active) = self.is_active {
            draft.is_active = active;
        }
        draft
    }
}

/// A stored pricing strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingStrategy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub repricing_rule: RepricingRule,
    #[serde(default)]
    pub beat_by: Option<AdjustmentMode>,
    #[serde(default)]
    pub stay_above_by: Option<AdjustmentMode>,
    #[serde(default)]
    pub value: Option<Decimal>,
    #[serde(default)]
    pub min_price: Option<Decimal>,
    #[serde(default)]
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub no_competition_action: NoCompetitionAction,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub applies_to: AppliesTo,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    /// Most recent applied changes, oldest first
    #[serde(default)]
    pub execution_history: Vec<ExecutionRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PricingStrategy {
    /// Build a stored strategy from an already validated draft
    pub fn from_draft(id: impl Into<String>, draft: StrategyDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: draft.name,
            description: draft.description,
            repricing_rule: draft.repricing_rule,
            beat_by: draft.beat_by,
            stay_above_by: draft.stay_above_by,
            value: draft.value,
            min_price: draft.min_price,
            max_price: draft.max_price,
            no_competition_action: draft.no_competition_action,
            is_active: draft.is_active,
            is_default: false,
            applies_to: AppliesTo::default(),
            usage_count: 0,
            last_used: None,
            execution_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Editable fields as a draft, for re-validation on update
    pub fn draft(&self) -> StrategyDraft {
        StrategyDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            repricing_rule: self.repricing_rule,
            beat_by: self.beat_by,
            stay_above_by: self.stay_above_by,
            value: self.value,
            min_price: self.min_price,
            max_price: self.max_price,
            no_competition_action: self.no_competition_action,
            is_active: self.is_active,
        }
    }

    /// Overwrite editable fields from a validated draft
    pub fn apply_draft(&mut self, draft: StrategyDraft, now: DateTime<Utc>) {
        self.name = draft.name;
        self.description = draft.description;
        self.repricing_rule = draft.repricing_rule;
        self.beat_by = draft.beat_by;
        self.stay_above_by = draft.stay_above_by;
        self.value = draft.value;
        self.min_price = draft.min_price;
        self.max_price = draft.max_price;
        self.no_competition_action = draft.no_competition_action;
        self.is_active = draft.is_active;
        self.updated_at = now;
    }

    /// Append to the bounded history, evicting the oldest entries
    pub fn push_history(&mut self, record: ExecutionRecord, limit: usize) {
        self.usage_count += 1;
        self.last_used = Some(record.timestamp);
        self.execution_history.push(record);
        if self.execution_history.len() > limit {
            let overflow = self.execution_history.len() - limit;
            self.execution_history.drain(..overflow);
        }
    }
}

/// A listing's engine configuration: which strategy and rule it uses and its own bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingBinding {
    pub item_id: String,
    pub user_id: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub mpn: Option<String>,
    #[serde(default)]
    pub upc: Option<String>,
    #[serde(default)]
    pub ean: Option<String>,
    #[serde(default)]
    pub strategy_id: Option<String>,
    #[serde(default)]
    pub rule_id: Option<String>,
    /// Per-listing floor, takes precedence over the strategy's
    #[serde(default)]
    pub min_price: Option<Decimal>,
    /// Per-listing ceiling, takes precedence over the strategy's
    #[serde(default)]
    pub max_price: Option<Decimal>,
}

impl ListingBinding {
    pub fn new(item_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            user_id: user_id.into(),
            sku: None,
            title: None,
            mpn: None,
            upc: None,
            ean: None,
            strategy_id: None,
            rule_id: None,
            min_price: None,
            max_price: None,
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

    pub fn with_mpn(mut self, mpn: impl Into<String>) -> Self {
        self.mpn = Some(mpn.into());
        self
    }

    pub fn with_bounds(mut self, min_price: Option<Decimal>, max_price: Option<Decimal>) -> Self {
        self.min_price = min_price;
        self.max_price = max_price;
        self
    }

    /// True when the listing has no strategy or rule attached
    pub fn is_unbound(&self) -> bool {
        self.strategy_id.is_none() && self.rule_id.is_none()
    }
}

/// Strategy resolved for a listing, as handed to the executor
#[derive(Debug, Clone, PartialEq)]
pub struct AssignedStrategy {
    pub strategy: PricingStrategy,
    pub listing: ListingBinding,
}
