//! REST client for the pricing gateway service

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use super::messages::*;
use crate::common::errors::{RepricerError, Result};
use crate::common::traits::{CompetitorFeed, ListingGateway};
use crate::common::types::{CompetitorListing, ListingPrice, PriceUpdate, PushReceipt, SearchQuery};
use crate::config::GatewayConfig;

/// HTTP adapter implementing [`ListingGateway`] and [`CompetitorFeed`]
#[derive(Debug, Clone)]
pub struct HttpGateway {
    /// HTTP client
    client: Client,
    /// Base URL of the pricing service
    base_url: Url,
    /// Optional bearer token
    api_token: Option<String>,
}

impl HttpGateway {
    /// Create a new gateway client with the default timeout
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create a new gateway client with custom timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RepricerError::Internal(e.to_string()))?;

        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| RepricerError::Configuration(format!("Invalid gateway URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RepricerError::Configuration(format!(
                "Gateway URL {} cannot be used as a base",
                base_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            api_token: None,
        })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let gateway = Self::with_timeout(&config.base_url, Duration::from_secs(config.request_timeout_seconds))?;
        Ok(match &config.api_token {
            Some(token) => gateway.with_token(token.clone()),
            None => gateway,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Base URL joined with percent-encoded path segments
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RepricerError::Configuration(format!("Gateway URL {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Map non-2xx responses onto the crate's error kinds
    async fn check_status(response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(RepricerError::NotFound(what.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        Err(RepricerError::UpstreamUnavailable(format!(
            "Gateway returned status {} for {}: {}",
            status, what, body
        )))
    }

    async fn get_price(&self, segments: &[&str], what: &str) -> Result<ListingPrice> {
        let url = self.endpoint(segments)?;
        debug!("Fetching price from: {}", url);

        let response = self.authorized(self.client.get(url)).send().await?;
        let response = Self::check_status(response, what).await?;

        let price: PriceResponse = response.json().await?;
        price.into_listing_price()
    }
}

#[async_trait]
impl ListingGateway for HttpGateway {
    #[instrument(skip(self))]
    async fn current_price(&self, item_id: &str) -> Result<ListingPrice> {
        self.get_price(&["listings", item_id, "price"], &format!("listing {}", item_id))
            .await
    }

    #[instrument(skip(self), fields(item_id = %update.item_id, price = %update.price))]
    async fn push_price(&self, update: &PriceUpdate) -> Result<PushReceipt> {
        let url = self.endpoint(&["listings", &update.item_id, "price"])?;
        let body = PushPriceRequest {
            sku: update.sku.clone(),
            price: update.price.to_string(),
        };
        debug!("Pushing price to: {}", url);

        let response = self.authorized(self.client.put(url)).json(&body).send().await?;
        let what = format!("listing {}", update.item_id);
        let response = Self::check_status(response, &what).await?;

        let receipt: PushPriceResponse = response.json().await?;
        Ok(receipt.into())
    }
}

#[async_trait]
impl CompetitorFeed for HttpGateway {
    #[instrument(skip(self))]
    async fn competitor_price(&self, competitor_item_id: &str) -> Result<ListingPrice> {
        self.get_price(
            &["competitors", competitor_item_id, "price"],
            &format!("competitor {}", competitor_item_id),
        )
        .await
    }

    #[instrument(skip(self, query), fields(item_id = %query.item_id))]
    async fn search_competitors(&self, query: &SearchQuery) -> Result<Vec<CompetitorListing>> {
        let mut url = self.endpoint(&["competitors", "search"])?;
        {
            let mut params = url.query_pairs_mut();
            if let Some(keywords) = &query.keywords {
                params.append_pair("q", keywords);
            }
            if let Some(mpn) = &query.mpn {
                params.append_pair("mpn", mpn);
            }
            if let Some(upc) = &query.upc {
                params.append_pair("upc", upc);
            }
            if let Some(ean) = &query.ean {
                params.append_pair("ean", ean);
            }
            params.append_pair("limit", &query.limit.to_string());
        }
        debug!("Searching competitors: {}", url);

        let response = self.authorized(self.client.get(url)).send().await?;
        let response = Self::check_status(response, "competitor search").await?;

        let results: SearchResponse = response.json().await?;
        results.items.into_iter().map(CompetitorItem::into_listing).collect()
    }
}
