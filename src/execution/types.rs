use rust_decimal::Decimal;
use serde::Serialize;

use crate::common::errors::RepricerError;
use crate::competitor::PriceSource;

/// Per-item execution state
///
/// ```text
/// Idle → ResolvingCompetitor → Calculating → Guarding → Skipped
///                                                     → Pushing → Recorded
///                                                               → PushFailed
/// ```
///
/// `NoStrategy` and `Unavailable` end an execution before any pricing work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Idle,
    ResolvingCompetitor,
    Calculating,
    Guarding,
    Pushing,
    Skipped,
    Recorded,
    PushFailed,
    NoStrategy,
    Unavailable,
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Skipped
                | ExecutionState::Recorded
                | ExecutionState::PushFailed
                | ExecutionState::NoStrategy
                | ExecutionState::Unavailable
        )
    }
}

/// Why an execution ended the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeReason {
    NoStrategyAssigned,
    StrategyInactive,
    StrategyLookupFailed,
    CooldownActive,
    CurrentPriceUnavailable,
    CompetitorLookupFailed,
    PriceAlreadyOptimal,
    PriceUpdated,
    PushFailed,
}

impl OutcomeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeReason::NoStrategyAssigned => "no_strategy_assigned",
            OutcomeReason::StrategyInactive => "strategy_inactive",
            OutcomeReason::StrategyLookupFailed => "strategy_lookup_failed",
            OutcomeReason::CooldownActive => "cooldown_active",
            OutcomeReason::CurrentPriceUnavailable => "current_price_unavailable",
            OutcomeReason::CompetitorLookupFailed => "competitor_lookup_failed",
            OutcomeReason::PriceAlreadyOptimal => "price_already_optimal",
            OutcomeReason::PriceUpdated => "price_updated",
            OutcomeReason::PushFailed => "push_failed",
        }
    }
}

impl std::fmt::Display for OutcomeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured result of one `execute_for_item` call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    pub item_id: String,
    pub success: bool,
    pub price_changed: bool,
    pub reason: OutcomeReason,
    pub state: ExecutionState,
    pub strategy_name: Option<String>,
    pub old_price: Option<Decimal>,
    pub new_price: Option<Decimal>,
    pub competitor_price: Option<Decimal>,
    pub competitor_source: Option<PriceSource>,
    /// Upstream API that applied the change
    pub method: Option<String>,
    /// Whether an execution record was written
    pub recorded: bool,
    pub error: Option<String>,
}

impl ExecutionOutcome {
    fn base(item_id: &str, success: bool, state: ExecutionState, reason: OutcomeReason) -> Self {
        Self {
            item_id: item_id.to_string(),
            success,
            price_changed: false,
            reason,
            state,
            strategy_name: None,
            old_price: None,
            new_price: None,
            competitor_price: None,
            competitor_source: None,
            method: None,
            recorded: false,
            error: None,
        }
    }

    /// Ordinary end without a price change (cooldown, already optimal)
    pub fn skipped(item_id: &str, reason: OutcomeReason) -> Self {
        Self::base(item_id, true, ExecutionState::Skipped, reason)
    }

    pub fn no_strategy(item_id: &str, reason: OutcomeReason) -> Self {
        Self::base(item_id, false, ExecutionState::NoStrategy, reason)
    }

    pub fn unavailable(item_id: &str, reason: OutcomeReason, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::base(item_id, false, ExecutionState::Unavailable, reason)
        }
    }

    pub fn push_failed(item_id: &str, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::base(item_id, false, ExecutionState::PushFailed, OutcomeReason::PushFailed)
        }
    }

    pub fn updated(item_id: &str) -> Self {
        Self {
            price_changed: true,
            ..Self::base(item_id, true, ExecutionState::Recorded, OutcomeReason::PriceUpdated)
        }
    }

    /// Failure of the public call itself (malformed input)
    pub fn rejected(item_id: &str, error: &RepricerError) -> Self {
        Self::unavailable(item_id, OutcomeReason::StrategyLookupFailed, error)
    }

    pub fn with_strategy(mut self, name: impl Into<String>) -> Self {
        self.strategy_name = Some(name.into());
        self
    }

    pub fn with_prices(
        mut self,
        old_price: Option<Decimal>,
        new_price: Option<Decimal>,
        competitor_price: Option<Decimal>,
    ) -> Self {
        self.old_price = old_price;
        self.new_price = new_price;
        self.competitor_price = competitor_price;
        self
    }

    pub fn with_source(mut self, source: PriceSource) -> Self {
        self.competitor_source = Some(source);
        self
    }
}

/// One failed item in a batch run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemError {
    pub item_id: String,
    pub reason: OutcomeReason,
    pub error: Option<String>,
}

/// Aggregate of `execute_all_active`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub changed: usize,
    pub errors: Vec<ItemError>,
    pub outcomes: Vec<ExecutionOutcome>,
}

impl BatchSummary {
    pub fn from_outcomes(mut outcomes: Vec<ExecutionOutcome>) -> Self {
        outcomes.sort_by(|a, b| a.item_id.cmp(&b.item_id));

        let mut summary = BatchSummary {
            total: outcomes.len(),
            ..Default::default()
        };
        for outcome in &outcomes {
            if outcome.success {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
                summary.errors.push(ItemError {
                    item_id: outcome.item_id.clone(),
                    reason: outcome.reason,
                    error: outcome.error.clone(),
                });
            }
            if outcome.price_changed {
                summary.changed += 1;
            }
        }
        summary.outcomes = outcomes;
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_strings() {
        assert_eq!(OutcomeReason::NoStrategyAssigned.as_str(), "no_strategy_assigned");
        assert_eq!(OutcomeReason::PriceAlreadyOptimal.to_string(), "price_already_optimal");
        assert_eq!(
            serde_json::to_string(&OutcomeReason::CooldownActive).unwrap(),
            "\"cooldown_active\""
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(ExecutionState::Recorded.is_terminal());
        assert!(ExecutionState::NoStrategy.is_terminal());
        assert!(!ExecutionState::Guarding.is_terminal());
    }

    #[test]
    fn test_batch_summary_counts() {
        let summary = BatchSummary::from_outcomes(vec![
            ExecutionOutcome::updated("b"),
            ExecutionOutcome::skipped("a", OutcomeReason::PriceAlreadyOptimal),
            ExecutionOutcome::push_failed("c", "HTTP 500"),
        ]);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.changed, 1);
        assert_eq!(summary.errors[0].item_id, "c");
        assert_eq!(summary.outcomes[0].item_id, "a");
    }
}
