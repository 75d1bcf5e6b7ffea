use rust_decimal::Decimal;
use serde::Serialize;

use crate::common::types::CompetitorListing;
use crate::competitor::types::CompetitorRule;

/// Why a competitor was left out of the minimum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Exclusion {
    InvalidPrice,
    Country,
    Condition,
    TitleWord,
    Seller,
    BelowPriceWindow,
    AbovePriceWindow,
}

/// Outcome of filtering a competitor set
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    /// Lowest remaining price
    pub lowest: Option<Decimal>,
    pub kept: usize,
    pub excluded: usize,
}

/// Rule-based exclusion filter
///
/// Country, condition and seller matches ignore ASCII case; title words
/// match as case-insensitive substrings. The price window only applies
/// when both the rule defines it and our current price is known.
#[derive(Debug, Clone, Default)]
pub struct CompetitorFilter {
    countries: Vec<String>,
    conditions: Vec<String>,
    title_words: Vec<String>,
    sellers: Vec<String>,
    floor: Option<Decimal>,
    ceiling: Option<Decimal>,
}

impl CompetitorFilter {
    /// Filter that only drops invalid prices
    pub fn permissive() -> Self {
        Self::default()
    }

    pub fn new(rule: Option<&CompetitorRule>, current_price: Option<Decimal>) -> Self {
        let Some(rule) = rule else {
            return Self::permissive();
        };

        let percent_of = |percent: Option<Decimal>| -> Option<Decimal> {
            let current = current_price.filter(|p| *p > Decimal::ZERO)?;
            // an overflowing window bound is dropped
            current.checked_mul(percent?)?.checked_div(Decimal::ONE_HUNDRED)
        };

        Self {
            countries: rule.exclude_countries.clone(),
            conditions: rule.exclude_conditions.clone(),
            title_words: rule
                .exclude_product_title_words
                .iter()
                .map(|w| w.to_lowercase())
                .collect(),
            sellers: rule.exclude_sellers.clone(),
            floor: percent_of(rule.min_percent_of_current_price),
            ceiling: percent_of(rule.max_percent_of_current_price),
        }
    }

    /// First reason the competitor is excluded, `None` if it qualifies
    pub fn exclusion(&self, competitor: &CompetitorListing) -> Option<Exclusion> {
        if !competitor.has_valid_price() {
            return Some(Exclusion::InvalidPrice);
        }
        if matches_any(&self.countries, competitor.locale.as_deref()) {
            return Some(Exclusion::Country);
        }
        if matches_any(&self.conditions, competitor.condition.as_deref()) {
            return Some(Exclusion::Condition);
        }
        if !self.title_words.is_empty() {
            let title = competitor.title.to_lowercase();
            if self.title_words.iter().any(|word| title.contains(word.as_str())) {
                return Some(Exclusion::TitleWord);
            }
        }
        if matches_any(&self.sellers, competitor.seller_id.as_deref()) {
            return Some(Exclusion::Seller);
        }
        if matches!(self.floor, Some(floor) if competitor.price < floor) {
            return Some(Exclusion::BelowPriceWindow);
        }
        if matches!(self.ceiling, Some(ceiling) if competitor.price > ceiling) {
            return Some(Exclusion::AbovePriceWindow);
        }
        None
    }

    pub fn qualifies(&self, competitor: &CompetitorListing) -> bool {
        self.exclusion(competitor).is_none()
    }

    /// Filter a competitor set and take the lowest remaining price
    pub fn lowest<'a, I>(&self, competitors: I) -> FilterOutcome
    where
        I: IntoIterator<Item = &'a CompetitorListing>,
    {
        let mut outcome = FilterOutcome {
            lowest: None,
            kept: 0,
            excluded: 0,
        };
        for competitor in competitors {
            if self.qualifies(competitor) {
                outcome.kept += 1;
                outcome.lowest = Some(match outcome.lowest {
                    Some(lowest) => lowest.min(competitor.price),
                    None => competitor.price,
                });
            } else {
                outcome.excluded += 1;
            }
        }
        outcome
    }
}

fn matches_any(values: &[String], candidate: Option<&str>) -> bool {
    match candidate {
        Some(candidate) => values.iter().any(|v| v.eq_ignore_ascii_case(candidate.trim())),
        None => false,
    }
}
