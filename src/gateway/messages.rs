//! Wire types of the pricing gateway service
//!
//! Prices travel as decimal strings so no precision is lost in JSON.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::errors::{RepricerError, Result};
use crate::common::types::{CompetitorListing, ListingPrice, PushReceipt};

fn parse_price(raw: &str, what: &str) -> Result<Decimal> {
    raw.trim()
        .parse()
        .map_err(|e| RepricerError::UpstreamUnavailable(format!("Invalid {} price {:?}: {}", what, raw, e)))
}

fn default_currency() -> String {
    "USD".to_string()
}

/// `GET /listings/{id}/price` and `GET /competitors/{id}/price`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceResponse {
    pub price: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl PriceResponse {
    pub fn into_listing_price(self) -> Result<ListingPrice> {
        Ok(ListingPrice::new(parse_price(&self.price, "listing")?, self.currency))
    }
}

/// Body of `PUT /listings/{id}/price`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushPriceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    pub price: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushPriceResponse {
    pub success: bool,
    /// Upstream API used (inventory_api, trading_api)
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl From<PushPriceResponse> for PushReceipt {
    fn from(response: PushPriceResponse) -> Self {
        PushReceipt {
            success: response.success,
            method: response.method.unwrap_or_else(|| "unknown".to_string()),
            message: response.message,
        }
    }
}

/// One search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorItem {
    #[serde(alias = "itemId")]
    pub item_id: String,
    #[serde(default)]
    pub title: String,
    pub price: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub condition: Option<String>,
    /// Item location country code
    #[serde(default, alias = "country")]
    pub locale: Option<String>,
    #[serde(default, alias = "seller")]
    pub seller_id: Option<String>,
    #[serde(default, alias = "imageUrl")]
    pub image_url: Option<String>,
}

impl CompetitorItem {
    pub fn into_listing(self) -> Result<CompetitorListing> {
        let price = parse_price(&self.price, "competitor")?;
        Ok(CompetitorListing {
            competitor_item_id: self.item_id,
            title: self.title,
            price,
            currency: self.currency,
            condition: self.condition,
            locale: self.locale,
            seller_id: self.seller_id,
            image_url: self.image_url,
        })
    }
}

/// `GET /competitors/search`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub items: Vec<CompetitorItem>,
}
