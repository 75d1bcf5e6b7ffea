use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::errors::{RepricerError, Result};
use crate::common::types::{AppliesTo, CompetitorListing};

fn default_true() -> bool {
    true
}

/// Fields a caller supplies to create a competitor rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Lower edge of the price window, percent of our current price (80 = 80%)
    #[serde(default)]
    pub min_percent_of_current_price: Option<Decimal>,
    /// Upper edge of the price window, percent of our current price
    #[serde(default)]
    pub max_percent_of_current_price: Option<Decimal>,
    #[serde(default)]
    pub exclude_countries: Vec<String>,
    #[serde(default)]
    pub exclude_conditions: Vec<String>,
    #[serde(default)]
    pub exclude_product_title_words: Vec<String>,
    #[serde(default)]
    pub exclude_sellers: Vec<String>,
    #[serde(default)]
    pub find_competitors_based_on_mpn: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl RuleDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_active: true,
            ..Default::default()
        }
    }

    pub fn excluding_countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_countries = countries.into_iter().map(Into::into).collect();
        self
    }

    pub fn excluding_conditions<I, S>(mut self, conditions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_conditions = conditions.into_iter().map(Into::into).collect();
        self
    }

    pub fn excluding_title_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_product_title_words = words.into_iter().map(Into::into).collect();
        self
    }

    pub fn excluding_sellers<I, S>(mut self, sellers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_sellers = sellers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_price_window(mut self, min_percent: Option<Decimal>, max_percent: Option<Decimal>) -> Self {
        self.min_percent_of_current_price = min_percent;
        self.max_percent_of_current_price = max_percent;
        self
    }

    pub fn by_mpn(mut self) -> Self {
        self.find_competitors_based_on_mpn = true;
        self
    }

    pub fn validate(mut self) -> Result<Self> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(RepricerError::Validation("rule name is required".into()));
        }

        for (label, percent) in [
            ("min_percent_of_current_price", self.min_percent_of_current_price),
            ("max_percent_of_current_price", self.max_percent_of_current_price),
        ] {
            if matches!(percent, Some(p) if p < Decimal::ZERO) {
                return Err(RepricerError::Validation(format!("{} must not be negative", label)));
            }
        }
        if let (Some(min), Some(max)) = (
            self.min_percent_of_current_price,
            self.max_percent_of_current_price,
        ) {
            if min > max {
                return Err(RepricerError::Validation(format!(
                    "price window {}%..{}% is inverted",
                    min, max
                )));
            }
        }

        self.exclude_countries = clean_list(self.exclude_countries);
        self.exclude_conditions = clean_list(self.exclude_conditions);
        self.exclude_product_title_words = clean_list(self.exclude_product_title_words);
        self.exclude_sellers = clean_list(self.exclude_sellers);
        Ok(self)
    }
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim().to_string();
        if !value.is_empty() && !cleaned.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
            cleaned.push(value);
        }
    }
    cleaned
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleUpdate {
    #[serde(default)]
    pub name: Option<String>,
    /// `Some(None)` clears the description
    #[serde(default)]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub min_percent_of_current_price: Option<Option<Decimal>>,
    #[serde(default)]
    pub max_percent_of_current_price: Option<Option<Decimal>>,
    #[serde(default)]
    pub exclude_countries: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_conditions: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_product_title_words: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_sellers: Option<Vec<String>>,
    #[serde(default)]
    pub find_competitors_based_on_mpn: Option<bool>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl RuleUpdate {
    pub fn merge(self, mut draft: RuleDraft) -> RuleDraft {
        if let Some(name) = self.name {
            draft.name = name;
        }
        if let Some(description) = self.description {
            draft.description = description;
        }
        if let Some(min) = self.min_percent_of_current_price {
            draft.min_percent_of_current_price = min;
        }
        if let Some(max) = self.max_percent_of_current_price {
            draft.max_percent_of_current_price = max;
        }
        if let Some(countries) = self.exclude_countries {
            draft.exclude_countries = countries;
        }
        if let Some(conditions) = self.exclude_conditions {
            draft.exclude_conditions = conditions;
        }
        if let Some(words) = self.exclude_product_title_words {
            draft.exclude_product_title_words = words;
        }
        if let Some(sellers) = self.exclude_sellers {
            draft.exclude_sellers = sellers;
        }
        if let Some(by_mpn) = self.find_competitors_based_on_mpn {
            draft.find_competitors_based_on_mpn = by_mpn;
        }
        if let Some(active) = self.is_active {
            draft.is_active = active;
        }
        draft
    }
}

/// A stored competitor rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorRule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub min_percent_of_current_price: Option<Decimal>,
    #[serde(default)]
    pub max_percent_of_current_price: Option<Decimal>,
    #[serde(default)]
    pub exclude_countries: Vec<String>,
    #[serde(default)]
    pub exclude_conditions: Vec<String>,
    #[serde(default)]
    pub exclude_product_title_words: Vec<String>,
    #[serde(default)]
    pub exclude_sellers: Vec<String>,
    #[serde(default)]
    pub find_competitors_based_on_mpn: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub applies_to: AppliesTo,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CompetitorRule {
    pub fn from_draft(id: impl Into<String>, draft: RuleDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: draft.name,
            description: draft.description,
            min_percent_of_current_price: draft.min_percent_of_current_price,
            max_percent_of_current_price: draft.max_percent_of_current_price,
            exclude_countries: draft.exclude_countries,
            exclude_conditions: draft.exclude_conditions,
            exclude_product_title_words: draft.exclude_product_title_words,
            exclude_sellers: draft.exclude_sellers,
            find_competitors_based_on_mpn: draft.find_competitors_based_on_mpn,
            is_active: draft.is_active,
            applies_to: AppliesTo::default(),
            usage_count: 0,
            last_used: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn draft(&self) -> RuleDraft {
        RuleDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            min_percent_of_current_price: self.min_percent_of_current_price,
            max_percent_of_current_price: self.max_percent_of_current_price,
            exclude_countries: self.exclude_countries.clone(),
            exclude_conditions: self.exclude_conditions.clone(),
            exclude_product_title_words: self.exclude_product_title_words.clone(),
            exclude_sellers: self.exclude_sellers.clone(),
            find_competitors_based_on_mpn: self.find_competitors_based_on_mpn,
            is_active: self.is_active,
        }
    }

    pub fn apply_draft(&mut self, draft: RuleDraft, now: DateTime<Utc>) {
        self.name = draft.name;
        self.description = draft.description;
        self.min_percent_of_current_price = draft.min_percent_of_current_price;
        self.max_percent_of_current_price = draft.max_percent_of_current_price;
        self.exclude_countries = draft.exclude_countries;
        self.exclude_conditions = draft.exclude_conditions;
        self.exclude_product_title_words = draft.exclude_product_title_words;
        self.exclude_sellers = draft.exclude_sellers;
        self.find_competitors_based_on_mpn = draft.find_competitors_based_on_mpn;
        self.is_active = draft.is_active;
        self.updated_at = now;
    }

    pub fn mark_used(&mut self, at: DateTime<Utc>) {
        self.usage_count += 1;
        self.last_used = Some(at);
    }
}

/// One entry of a manual competitor list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualCompetitor {
    #[serde(flatten)]
    pub listing: CompetitorListing,
    pub added_at: DateTime<Utc>,
}

fn default_monitoring_frequency() -> u32 {
    60
}

/// Competitors a user tracks by hand for one of their listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualCompetitorList {
    pub user_id: String,
    pub item_id: String,
    #[serde(default)]
    pub competitors: Vec<ManualCompetitor>,
    #[serde(default = "default_true")]
    pub monitoring_enabled: bool,
    /// Minutes between live price refreshes
    #[serde(default = "default_monitoring_frequency")]
    pub monitoring_frequency_minutes: u32,
    #[serde(default)]
    pub last_monitoring_check: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_lowest_price: Option<Decimal>,
}

impl ManualCompetitorList {
    pub fn new(user_id: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            item_id: item_id.into(),
            competitors: Vec::new(),
            monitoring_enabled: true,
            monitoring_frequency_minutes: default_monitoring_frequency(),
            last_monitoring_check: None,
            last_lowest_price: None,
        }
    }

    /// Add a competitor; the same competitor item may only appear once
    pub fn add(&mut self, listing: CompetitorListing, now: DateTime<Utc>) -> Result<()> {
        if self.contains(&listing.competitor_item_id) {
            return Err(RepricerError::Conflict(format!(
                "competitor {} already tracked for item {}",
                listing.competitor_item_id, self.item_id
            )));
        }
        self.competitors.push(ManualCompetitor {
            listing,
            added_at: now,
        });
        Ok(())
    }

    pub fn remove(&mut self, competitor_item_id: &str) -> Result<ManualCompetitor> {
        let index = self
            .competitors
            .iter()
            .position(|c| c.listing.competitor_item_id == competitor_item_id)
            .ok_or_else(|| {
                RepricerError::NotFound(format!(
                    "competitor {} on item {}",
                    competitor_item_id, self.item_id
                ))
            })?;
        Ok(self.competitors.remove(index))
    }

    pub fn contains(&self, competitor_item_id: &str) -> bool {
        self.competitors
            .iter()
            .any(|c| c.listing.competitor_item_id == competitor_item_id)
    }

    /// Update a cached price in place; returns false for unknown competitors
    pub fn set_price(&mut self, competitor_item_id: &str, price: Decimal) -> bool {
        match self
            .competitors
            .iter_mut()
            .find(|c| c.listing.competitor_item_id == competitor_item_id)
        {
            Some(entry) => {
                entry.listing.price = price;
                true
            }
            None => false,
        }
    }

    /// Lowest valid cached price, ignoring any rule
    pub fn lowest_price(&self) -> Option<Decimal> {
        self.competitors
            .iter()
            .filter(|c| c.listing.has_valid_price())
            .map(|c| c.listing.price)
            .min()
    }

    /// Whether a live refresh is due at `now`
    pub fn is_refresh_due(&self, now: DateTime<Utc>) -> bool {
        if !self.monitoring_enabled {
            return false;
        }
        match self.last_monitoring_check {
            None => true,
            Some(last) => {
                now - last >= Duration::minutes(i64::from(self.monitoring_frequency_minutes))
            }
        }
    }

    pub fn mark_checked(&mut self, now: DateTime<Utc>) {
        self.last_monitoring_check = Some(now);
        self.last_lowest_price = self.lowest_price();
    }
}
