//! Normalized types shared by the engine and its collaborators

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Round a currency amount to cents, half away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Current price of one of our own listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingPrice {
    pub price: Decimal,
    pub currency: String,
}

impl ListingPrice {
    pub fn new(price: Decimal, currency: impl Into<String>) -> Self {
        Self {
            price,
            currency: currency.into(),
        }
    }
}

/// A competing listing in the normalized shape the engine understands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorListing {
    pub competitor_item_id: String,
    #[serde(default)]
    pub title: String,
    pub price: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub condition: Option<String>,
    /// Country/site code of the listing (e.g. "US", "DE")
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub seller_id: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl CompetitorListing {
    pub fn new(competitor_item_id: impl Into<String>, price: Decimal) -> Self {
        Self {
            competitor_item_id: competitor_item_id.into(),
            title: String::new(),
            price,
            currency: default_currency(),
            condition: None,
            locale: None,
            seller_id: None,
            image_url: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_seller(mut self, seller_id: impl Into<String>) -> Self {
        self.seller_id = Some(seller_id.into());
        self
    }

    /// Zero and negative prices never take part in the minimum
    pub fn has_valid_price(&self) -> bool {
        self.price > Decimal::ZERO
    }
}

pub(crate) fn default_currency() -> String {
    "USD".to_string()
}

/// A listing a strategy or rule is attached to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingTarget {
    pub item_id: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub date_applied: DateTime<Utc>,
}

impl ListingTarget {
    fn matches(&self, item_id: &str, sku: Option<&str>) -> bool {
        self.item_id == item_id && self.sku.as_deref() == sku
    }
}

/// Ordered set of listing targets, unique per (item_id, sku)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppliesTo(Vec<ListingTarget>);

impl AppliesTo {
    /// Insert a target, replacing any previous entry for the same item and SKU
    pub fn upsert(&mut self, target: ListingTarget) {
        let sku = target.sku.clone();
        self.0.retain(|t| !t.matches(&target.item_id, sku.as_deref()));
        self.0.push(target);
    }

    /// Remove the entry for item and SKU; returns whether one existed
    pub fn remove(&mut self, item_id: &str, sku: Option<&str>) -> bool {
        let before = self.0.len();
        self.0.retain(|t| !t.matches(item_id, sku));
        self.0.len() != before
    }

    /// Remove every entry for the item regardless of SKU
    pub fn remove_item(&mut self, item_id: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|t| t.item_id != item_id);
        self.0.len() != before
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.0.iter().any(|t| t.item_id == item_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ListingTarget> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Price change pushed to our own listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub item_id: String,
    pub sku: Option<String>,
    pub price: Decimal,
}

/// Result of a price push as reported by the listing gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushReceipt {
    pub success: bool,
    /// Which upstream API applied the change (e.g. "trading_api")
    pub method: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl PushReceipt {
    pub fn ok(method: impl Into<String>) -> Self {
        Self {
            success: true,
            method: method.into(),
            message: None,
        }
    }

    pub fn rejected(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            method: method.into(),
            message: Some(message.into()),
        }
    }
}

/// Live competitor search parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub item_id: String,
    pub keywords: Option<String>,
    pub mpn: Option<String>,
    pub upc: Option<String>,
    pub ean: Option<String>,
    pub limit: u32,
}

/// Direction of an applied price change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeDirection {
    Increased,
    Decreased,
}

impl ChangeDirection {
    pub fn between(old: Decimal, new: Decimal) -> Self {
        if new >= old {
            ChangeDirection::Increased
        } else {
            ChangeDirection::Decreased
        }
    }
}

/// Immutable entry describing a successful price change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub item_id: String,
    #[serde(default)]
    pub sku: Option<String>,
    pub old_price: Decimal,
    pub new_price: Decimal,
    pub competitor_price: Option<Decimal>,
    pub change_amount: Decimal,
    pub change_direction: ChangeDirection,
    pub strategy_id: String,
    pub strategy_name: String,
    #[serde(default)]
    pub rule_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(default)]
    pub method: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn target(item_id: &str, sku: Option<&str>) -> ListingTarget {
        ListingTarget {
            item_id: item_id.to_string(),
            sku: sku.map(str::to_string),
            title: None,
            date_applied: Utc::now(),
        }
    }

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(dec!(5.245)), dec!(5.25));
        assert_eq!(round_money(dec!(5.244)), dec!(5.24));
        assert_eq!(round_money(dec!(-1.005)), dec!(-1.01));
    }

    #[test]
    fn test_applies_to_upsert_replaces_same_item_and_sku() {
        let mut applies = AppliesTo::default();
        applies.upsert(target("item-1", Some("A")));
        applies.upsert(target("item-1", Some("A")));
        applies.upsert(target("item-1", Some("B")));
        applies.upsert(target("item-2", None));

        assert_eq!(applies.len(), 3);
        assert!(applies.contains("item-2"));
    }

    #[test]
    fn test_applies_to_remove_requires_exact_match() {
        let mut applies = AppliesTo::default();
        applies.upsert(target("item-1", Some("A")));

        assert!(!applies.remove("item-1", None));
        assert!(applies.remove("item-1", Some("A")));
        assert!(applies.is_empty());
    }

    #[test]
    fn test_change_direction() {
        assert_eq!(
            ChangeDirection::between(dec!(5.30), dec!(5.25)),
            ChangeDirection::Decreased
        );
        assert_eq!(
            ChangeDirection::between(dec!(5.00), dec!(6.00)),
            ChangeDirection::Increased
        );
    }
}
