use rust_decimal::Decimal;
use std::sync::Arc;

use crate::pricing::types::PricingStrategy;

/// Evaluator for `CUSTOM` repricing rules
///
/// No expression language ships with the engine. Deployments that need
/// custom pricing install an implementation on the `PriceCalculator`;
/// without one a `CUSTOM` strategy keeps the current price.
///
/// # Implementation Notes
///
/// - `evaluate` runs inside the pricing path: no blocking I/O
/// - Returning `None` means "no opinion", which keeps the current price
/// - The returned value still goes through clamping and rounding
///
/// # Example
///
/// ```ignore
/// struct Undercut;
///
/// impl CustomPricing for Undercut {
///     fn evaluate(&self, _s: &PricingStrategy, competitor: Decimal, _current: Decimal) -> Option<Decimal> {
///         Some(competitor - dec!(0.01))
///     }
/// }
/// ```
pub trait CustomPricing: Send + Sync {
    fn evaluate(
        &self,
        strategy: &PricingStrategy,
        competitor_price: Decimal,
        current_price: Decimal,
    ) -> Option<Decimal>;
}

/// Shared custom evaluator for dynamic dispatch
pub type SharedCustomPricing = Arc<dyn CustomPricing>;
