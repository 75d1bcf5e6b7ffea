use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::debug;

use crate::common::types::round_money;
use crate::pricing::traits::SharedCustomPricing;
use crate::pricing::types::{AdjustmentMode, NoCompetitionAction, PricingStrategy, RepricingRule};

/// Default headroom below a listing ceiling that triggers the STAY_ABOVE snap
pub const DEFAULT_SNAP_THRESHOLD: Decimal = dec!(2.00);

/// Everything the calculator needs for one listing
#[derive(Debug, Clone, Copy)]
pub struct PriceInputs<'a> {
    pub strategy: &'a PricingStrategy,
    pub competitor_price: Option<Decimal>,
    /// Current listing price, expected to be positive
    pub current_price: Decimal,
    pub listing_min: Option<Decimal>,
    pub listing_max: Option<Decimal>,
}

/// Where the raw target came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceBasis {
    /// Derived from the lowest competitor price
    Competitor,
    /// No usable competitor price; `no_competition_action` applied
    NoCompetition(NoCompetitionAction),
    /// Rule could not be evaluated (CUSTOM without evaluator, unknown, incomplete)
    KeepCurrent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClampBound {
    Min,
    Max,
}

/// Calculator output with the reasoning that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceDecision {
    /// Target before clamping, snapping and rounding
    pub raw: Decimal,
    /// Final price, rounded to cents and always positive
    pub target: Decimal,
    pub basis: PriceBasis,
    pub clamped: Option<ClampBound>,
    pub snapped_to_max: bool,
    /// The computed price was not positive and the current price was kept
    pub fell_back_to_current: bool,
}

/// Maps a strategy and market observation to a target price
///
/// Pure: no I/O, never fails. A strategy it cannot interpret degrades to
/// the current price so one bad configuration cannot stall a batch.
#[derive(Clone)]
pub struct PriceCalculator {
    snap_threshold: Decimal,
    custom: Option<SharedCustomPricing>,
}

impl PriceCalculator {
    pub fn new(snap_threshold: Decimal) -> Self {
        Self {
            snap_threshold,
            custom: None,
        }
    }

    /// Install an evaluator for CUSTOM strategies
    pub fn with_custom_pricing(mut self, custom: SharedCustomPricing) -> Self {
        self.custom = Some(custom);
        self
    }

    pub fn snap_threshold(&self) -> Decimal {
        self.snap_threshold
    }

    /// Shortcut returning only the target price
    pub fn target_price(&self, inputs: &PriceInputs<'_>) -> Decimal {
        self.compute(inputs).target
    }

    pub fn compute(&self, inputs: &PriceInputs<'_>) -> PriceDecision {
        let strategy = inputs.strategy;
        let current = inputs.current_price;

        let (raw, basis) = match inputs.competitor_price.filter(|p| *p > Decimal::ZERO) {
            None => (
                self.no_competition_price(strategy, current),
                PriceBasis::NoCompetition(strategy.no_competition_action),
            ),
            Some(competitor) => match self.rule_price(strategy, competitor, current) {
                Some(raw) => (raw, PriceBasis::Competitor),
                None => (current, PriceBasis::KeepCurrent),
            },
        };

        // Listing overrides win over strategy-level bounds.
        let min = inputs.listing_min.or(strategy.min_price);
        let max = inputs.listing_max.or(strategy.max_price);

        let mut target = raw;
        let mut clamped = None;
        if let Some(min) = min {
            if target < min {
                target = min;
                clamped = Some(ClampBound::Min);
            }
        }
        if let Some(max) = max {
            if target > max {
                target = max;
                clamped = Some(ClampBound::Max);
            }
        }

        let mut snapped_to_max = false;
        if basis == PriceBasis::Competitor && strategy.repricing_rule == RepricingRule::StayAbove {
            if let Some(listing_max) = inputs.listing_max {
                let headroom = listing_max.checked_sub(raw);
                if headroom.map_or(false, |h| h >= self.snap_threshold) {
                    target = listing_max;
                    snapped_to_max = true;
                }
            }
        }

        // Positivity is checked on the rounded price.
        let mut target = round_money(target);
        let mut fell_back_to_current = false;
        if target <= Decimal::ZERO {
            target = round_money(current);
            fell_back_to_current = true;
        }

        let decision = PriceDecision {
            raw,
            target,
            basis,
            clamped,
            snapped_to_max,
            fell_back_to_current,
        };

        debug!(
            strategy = %strategy.name,
            rule = %strategy.repricing_rule,
            competitor = ?inputs.competitor_price,
            current = %current,
            raw = %decision.raw,
            target = %decision.target,
            "Calculated target price"
        );

        decision
    }

    fn no_competition_price(&self, strategy: &PricingStrategy, current: Decimal) -> Decimal {
        match strategy.no_competition_action {
            NoCompetitionAction::UseMaxPrice => strategy.max_price.unwrap_or(current),
            NoCompetitionAction::UseMinPrice => strategy.min_price.unwrap_or(current),
            NoCompetitionAction::KeepCurrent => current,
        }
    }

    /// Raw target from the rule, `None` when the rule cannot be evaluated
    /// or the arithmetic overflows
    fn rule_price(
        &self,
        strategy: &PricingStrategy,
        competitor: Decimal,
        current: Decimal,
    ) -> Option<Decimal> {
        match strategy.repricing_rule {
            RepricingRule::MatchLowest => Some(competitor),
            RepricingRule::BeatLowest => {
                let value = strategy.value?;
                match strategy.beat_by? {
                    AdjustmentMode::Amount => competitor.checked_sub(value),
                    AdjustmentMode::Percentage => competitor.checked_mul(Decimal::ONE.checked_sub(value)?),
                }
            }
            RepricingRule::StayAbove => {
                let value = strategy.value?;
                match strategy.stay_above_by? {
                    AdjustmentMode::Amount => competitor.checked_add(value),
                    AdjustmentMode::Percentage => competitor.checked_mul(Decimal::ONE.checked_add(value)?),
                }
            }
            RepricingRule::Custom => self
                .custom
                .as_ref()
                .and_then(|custom| custom.evaluate(strategy, competitor, current)),
            RepricingRule::Unknown => None,
        }
    }
}

impl Default for PriceCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_SNAP_THRESHOLD)
    }
}

impl std::fmt::Debug for PriceCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceCalculator")
            .field("snap_threshold", &self.snap_threshold)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::traits::CustomPricing;
    use crate::pricing::types::StrategyDraft;
    use chrono::Utc;
    use std::sync::Arc;

    fn strategy(draft: StrategyDraft) -> PricingStrategy {
        PricingStrategy::from_draft("s-1", draft.validate().unwrap(), Utc::now())
    }

    fn inputs<'a>(
        strategy: &'a PricingStrategy,
        competitor: Option<Decimal>,
        current: Decimal,
        listing_min: Option<Decimal>,
        listing_max: Option<Decimal>,
    ) -> PriceInputs<'a> {
        PriceInputs {
            strategy,
            competitor_price: competitor,
            current_price: current,
            listing_min,
            listing_max,
        }
    }

    #[test]
    fn test_beat_lowest_by_amount() {
        let s = strategy(StrategyDraft::beat_lowest("Beat", AdjustmentMode::Amount, dec!(0.02)));
        let calc = PriceCalculator::default();
        let target = calc.target_price(&inputs(&s, Some(dec!(5.27)), dec!(5.30), None, None));
        assert_eq!(target, dec!(5.25));
    }

    #[test]
    fn test_beat_lowest_by_percentage() {
        let s = strategy(StrategyDraft::beat_lowest("Beat", AdjustmentMode::Percentage, dec!(0.10)));
        let calc = PriceCalculator::default();
        let target = calc.target_price(&inputs(&s, Some(dec!(20.00)), dec!(25), None, None));
        assert_eq!(target, dec!(18.00));
    }

    #[test]
    fn test_stay_above_by_percentage_rounds_half_away_from_zero() {
        let s = strategy(StrategyDraft::stay_above("Above", AdjustmentMode::Percentage, dec!(0.05)));
        let calc = PriceCalculator::default();
        // 9.99 * 1.05 = 10.4895
        let target = calc.target_price(&inputs(&s, Some(dec!(9.99)), dec!(10), None, None));
        assert_eq!(target, dec!(10.49));
    }

    #[test]
    fn test_stay_above_without_snap_when_headroom_small() {
        let s = strategy(StrategyDraft::stay_above("Above", AdjustmentMode::Amount, dec!(0.50)));
        let calc = PriceCalculator::default();
        let decision = calc.compute(&inputs(&s, Some(dec!(10.00)), dec!(11), None, Some(dec!(12.40))));
        assert_eq!(decision.target, dec!(10.50));
        assert!(!decision.snapped_to_max);
    }

    #[test]
    fn test_stay_above_snaps_to_listing_max() {
        let s = strategy(StrategyDraft::stay_above("Above", AdjustmentMode::Amount, dec!(0.50)));
        let calc = PriceCalculator::default();
        let decision = calc.compute(&inputs(&s, Some(dec!(10.00)), dec!(11), None, Some(dec!(13.00))));
        assert_eq!(decision.target, dec!(13.00));
        assert!(decision.snapped_to_max);
    }

    #[test]
    fn test_snap_threshold_is_inclusive() {
        let s = strategy(StrategyDraft::stay_above("Above", AdjustmentMode::Amount, dec!(0.50)));
        let calc = PriceCalculator::default();
        let target = calc.target_price(&inputs(&s, Some(dec!(10.00)), dec!(11), None, Some(dec!(12.50))));
        assert_eq!(target, dec!(12.50));
    }

    #[test]
    fn test_match_lowest_never_snaps() {
        let s = strategy(StrategyDraft::match_lowest("Match"));
        let calc = PriceCalculator::default();
        let target = calc.target_price(&inputs(&s, Some(dec!(10.00)), dec!(11), None, Some(dec!(20.00))));
        assert_eq!(target, dec!(10.00));
    }

    #[test]
    fn test_match_lowest_equals_clamped_competitor() {
        let s = strategy(StrategyDraft::match_lowest("Match"));
        let calc = PriceCalculator::default();
        let (min, max) = (dec!(8.00), dec!(12.00));

        for (competitor, expected) in [
            (dec!(5.00), dec!(8.00)),
            (dec!(9.37), dec!(9.37)),
            (dec!(15.00), dec!(12.00)),
        ] {
            let target = calc.target_price(&inputs(&s, Some(competitor), dec!(10), Some(min), Some(max)));
            assert_eq!(target, expected, "competitor {}", competitor);
        }
    }

    #[test]
    fn test_result_within_listing_bounds() {
        let s = strategy(StrategyDraft::beat_lowest("Beat", AdjustmentMode::Percentage, dec!(0.3)));
        let calc = PriceCalculator::default();
        let (min, max) = (dec!(3.00), dec!(7.50));

        for cents in (1..2000).step_by(37) {
            let competitor = Decimal::new(cents, 2);
            let target = calc.target_price(&inputs(&s, Some(competitor), dec!(5), Some(min), Some(max)));
            assert!(target >= min && target <= max, "target {} out of bounds", target);
        }
    }

    #[test]
    fn test_listing_bounds_override_strategy_bounds() {
        let s = strategy(
            StrategyDraft::match_lowest("Match").with_bounds(Some(dec!(2.00)), Some(dec!(50.00))),
        );
        let calc = PriceCalculator::default();

        let target = calc.target_price(&inputs(&s, Some(dec!(3.00)), dec!(10), Some(dec!(4.00)), None));
        assert_eq!(target, dec!(4.00));

        // Strategy bound still applies where the listing has none
        let target = calc.target_price(&inputs(&s, Some(dec!(70.00)), dec!(10), Some(dec!(4.00)), None));
        assert_eq!(target, dec!(50.00));
    }

    #[test]
    fn test_inverted_listing_bounds_prefer_max() {
        let s = strategy(StrategyDraft::match_lowest("Match"));
        let calc = PriceCalculator::default();
        let target = calc.target_price(&inputs(&s, Some(dec!(1.00)), dec!(10), Some(dec!(9.00)), Some(dec!(6.00))));
        assert_eq!(target, dec!(6.00));
    }

    #[test]
    fn test_no_competition_actions() {
        let calc = PriceCalculator::default();
        let base = StrategyDraft::match_lowest("Match").with_bounds(Some(dec!(4.00)), Some(dec!(9.00)));

        let s = strategy(base.clone().on_no_competition(NoCompetitionAction::UseMinPrice));
        assert_eq!(calc.target_price(&inputs(&s, None, dec!(6), None, None)), dec!(4.00));

        let s = strategy(base.clone().on_no_competition(NoCompetitionAction::UseMaxPrice));
        assert_eq!(calc.target_price(&inputs(&s, None, dec!(6), None, None)), dec!(9.00));

        let s = strategy(base.on_no_competition(NoCompetitionAction::KeepCurrent));
        let decision = calc.compute(&inputs(&s, Some(dec!(0)), dec!(6), None, None));
        assert_eq!(decision.target, dec!(6));
        assert_eq!(
            decision.basis,
            PriceBasis::NoCompetition(NoCompetitionAction::KeepCurrent)
        );
    }

    #[test]
    fn test_no_competition_without_bound_keeps_current() {
        let s = strategy(StrategyDraft::match_lowest("Match").on_no_competition(NoCompetitionAction::UseMaxPrice));
        let calc = PriceCalculator::default();
        assert_eq!(calc.target_price(&inputs(&s, None, dec!(7.77), None, None)), dec!(7.77));
    }

    #[test]
    fn test_non_positive_result_falls_back_to_current() {
        let s = strategy(StrategyDraft::beat_lowest("Beat", AdjustmentMode::Amount, dec!(5.00)));
        let calc = PriceCalculator::default();
        let decision = calc.compute(&inputs(&s, Some(dec!(3.00)), dec!(4.20), None, None));
        assert_eq!(decision.target, dec!(4.20));
        assert!(decision.fell_back_to_current);

        let s = strategy(StrategyDraft::beat_lowest("All", AdjustmentMode::Percentage, dec!(1)));
        assert_eq!(calc.target_price(&inputs(&s, Some(dec!(3.00)), dec!(4.20), None, None)), dec!(4.20));
    }

    #[test]
    fn test_custom_without_evaluator_keeps_current() {
        let s = strategy(StrategyDraft::custom("Custom"));
        let calc = PriceCalculator::default();
        let decision = calc.compute(&inputs(&s, Some(dec!(3.00)), dec!(4.20), None, None));
        assert_eq!(decision.target, dec!(4.20));
        assert_eq!(decision.basis, PriceBasis::KeepCurrent);
    }

    struct PennyUnder;

    impl CustomPricing for PennyUnder {
        fn evaluate(&self, _strategy: &PricingStrategy, competitor: Decimal, _current: Decimal) -> Option<Decimal> {
            Some(competitor - dec!(0.01))
        }
    }

    #[test]
    fn test_custom_uses_installed_evaluator() {
        let s = strategy(StrategyDraft::custom("Custom"));
        let calc = PriceCalculator::default().with_custom_pricing(Arc::new(PennyUnder));
        assert_eq!(calc.target_price(&inputs(&s, Some(dec!(3.00)), dec!(4.20), None, None)), dec!(2.99));
    }

    #[test]
    fn test_unknown_rule_keeps_current() {
        let mut s = strategy(StrategyDraft::match_lowest("Match"));
        s.repricing_rule = RepricingRule::Unknown;
        let calc = PriceCalculator::default();
        assert_eq!(calc.target_price(&inputs(&s, Some(dec!(1.00)), dec!(4.20), None, None)), dec!(4.20));
    }

    #[test]
    fn test_incomplete_modifier_keeps_current() {
        let mut s = strategy(StrategyDraft::beat_lowest("Beat", AdjustmentMode::Amount, dec!(1)));
        s.value = None;
        let calc = PriceCalculator::default();
        assert_eq!(calc.target_price(&inputs(&s, Some(dec!(1.00)), dec!(4.20), None, None)), dec!(4.20));
    }
    #[test]
    fn test_sub_cent_result_falls_back_to_current() {
        // 1.00 * (1 - 0.999) = 0.001, which rounds to 0.00
        let s = strategy(StrategyDraft::beat_lowest("Beat", AdjustmentMode::Percentage, dec!(0.999)));
        let calc = PriceCalculator::default();
        let decision = calc.compute(&inputs(&s, Some(dec!(1.00)), dec!(5.00), None, None));
        assert_eq!(decision.target, dec!(5.00));
        assert!(decision.fell_back_to_current);
    }

    #[test]
    fn test_overflowing_competitor_price_keeps_current() {
        let calc = PriceCalculator::default();
        let huge = Decimal::MAX;

        let s = strategy(StrategyDraft::stay_above("Above", AdjustmentMode::Amount, dec!(1)));
        let decision = calc.compute(&inputs(&s, Some(huge), dec!(4.20), None, Some(dec!(10.00))));
        assert_eq!(decision.basis, PriceBasis::KeepCurrent);
        assert_eq!(decision.target, dec!(4.20));

        let s = strategy(StrategyDraft::stay_above("Pct", AdjustmentMode::Percentage, dec!(0.10)));
        assert_eq!(calc.target_price(&inputs(&s, Some(huge), dec!(4.20), None, None)), dec!(4.20));
    }
}
