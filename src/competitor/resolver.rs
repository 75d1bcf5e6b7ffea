//! Lowest qualifying competitor price discovery

use futures_util::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::common::clock::Clock;
use crate::common::errors::Result;
use crate::common::timeout::with_timeout;
use crate::common::traits::{CompetitorFeed, CompetitorStore};
use crate::common::types::SearchQuery;
use crate::competitor::filter::CompetitorFilter;
use crate::competitor::types::{CompetitorRule, ManualCompetitorList};
use crate::pricing::ListingBinding;

/// Where the resolved price came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Manual,
    ApiSearch,
    None,
}

/// Diagnostic outcome of a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteOutcome {
    Found,
    /// Competitor data existed but nothing passed the filters
    FilteredOut,
    /// No competitor data at all
    NoData,
}

/// Best competitor price for one listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitorQuote {
    pub price: Option<Decimal>,
    pub sample_count: usize,
    pub source: PriceSource,
    pub outcome: QuoteOutcome,
    pub excluded: usize,
    /// Manual entries whose price was refreshed live
    pub refreshed: usize,
}

impl CompetitorQuote {
    pub fn none(outcome: QuoteOutcome, excluded: usize) -> Self {
        Self {
            price: None,
            sample_count: 0,
            source: PriceSource::None,
            outcome,
            excluded,
            refreshed: 0,
        }
    }
}

/// Resolver behaviour switches
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Re-fetch manual competitor prices when their monitoring is due
    pub refresh_manual_prices: bool,
    /// Fall back to a live search when no manual data exists
    pub live_search_enabled: bool,
    pub search_limit: u32,
    /// Parallel live refreshes per listing
    pub max_concurrency: usize,
    pub call_timeout: Duration,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            refresh_manual_prices: true,
            live_search_enabled: false,
            search_limit: 20,
            max_concurrency: 3,
            call_timeout: Duration::from_secs(15),
        }
    }
}

/// What to resolve
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    pub listing: &'a ListingBinding,
    pub rule: Option<&'a CompetitorRule>,
    /// Our own current price, used for the rule's price window
    pub current_price: Option<Decimal>,
}

/// Produces the lowest qualifying competitor price for a listing
pub struct CompetitorPriceResolver {
    store: Arc<dyn CompetitorStore>,
    feed: Option<Arc<dyn CompetitorFeed>>,
    clock: Arc<dyn Clock>,
    settings: ResolverSettings,
}

impl CompetitorPriceResolver {
    pub fn new(
        store: Arc<dyn CompetitorStore>,
        feed: Option<Arc<dyn CompetitorFeed>>,
        clock: Arc<dyn Clock>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            store,
            feed,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    #[instrument(skip(self, request), fields(item_id = %request.listing.item_id))]
    pub async fn resolve(&self, request: &ResolveRequest<'_>) -> Result<CompetitorQuote> {
        let listing = request.listing;
        let filter = CompetitorFilter::new(request.rule, request.current_price);

        let manual = with_timeout(
            "manual_competitors",
            self.settings.call_timeout,
            self.store.manual_competitors(&listing.user_id, &listing.item_id),
        )
        .await?;

        if let Some(mut list) = manual.filter(|list| !list.competitors.is_empty()) {
            let refreshed = self.refresh_if_due(&mut list).await;
            let outcome = filter.lowest(list.competitors.iter().map(|c| &c.listing));

            let quote = match outcome.lowest {
                Some(price) => CompetitorQuote {
                    price: Some(price),
                    sample_count: outcome.kept,
                    source: PriceSource::Manual,
                    outcome: QuoteOutcome::Found,
                    excluded: outcome.excluded,
                    refreshed,
                },
                None => CompetitorQuote {
                    refreshed,
                    ..CompetitorQuote::none(QuoteOutcome::FilteredOut, outcome.excluded)
                },
            };
            info!(
                price = ?quote.price,
                kept = outcome.kept,
                excluded = outcome.excluded,
                "Resolved manual competitor price"
            );
            return Ok(quote);
        }

        if self.settings.live_search_enabled {
            if let Some(feed) = &self.feed {
                return Ok(self.search(feed.as_ref(), request, &filter).await);
            }
        }

        debug!("No competitor data for item {}", listing.item_id);
        Ok(CompetitorQuote::none(QuoteOutcome::NoData, 0))
    }

    /// Refresh cached prices in place; returns how many were updated
    async fn refresh_if_due(&self, list: &mut ManualCompetitorList) -> usize {
        let Some(feed) = &self.feed else {
            return 0;
        };
        let now = self.clock.now();
        if !self.settings.refresh_manual_prices || !list.is_refresh_due(now) {
            return 0;
        }

        let ids: Vec<String> = list
            .competitors
            .iter()
            .map(|c| c.listing.competitor_item_id.clone())
            .collect();
        let timeout = self.settings.call_timeout;

        let results: Vec<_> = stream::iter(ids)
            .map(|id| async move {
                let result = with_timeout("competitor_price", timeout, feed.competitor_price(&id)).await;
                (id, result)
            })
            .buffer_unordered(self.settings.max_concurrency.max(1))
            .collect()
            .await;

        let mut refreshed = 0;
        for (id, result) in results {
            match result {
                Ok(live) if live.price > Decimal::ZERO => {
                    if list.set_price(&id, live.price) {
                        refreshed += 1;
                    }
                }
                Ok(live) => {
                    warn!(competitor = %id, price = %live.price, "Ignoring non-positive live price");
                }
                Err(e) => {
                    warn!(competitor = %id, error = %e, "Competitor refresh failed, keeping cached price");
                }
            }
        }

        list.mark_checked(now);
        if let Err(e) = with_timeout(
            "save_manual_competitors",
            timeout,
            self.store.save_manual_competitors(list),
        )
        .await
        {
            warn!(item_id = %list.item_id, error = %e, "Could not persist refreshed competitor prices");
        }

        debug!("Refreshed {}/{} competitor prices", refreshed, list.competitors.len());
        refreshed
    }

    async fn search(
        &self,
        feed: &dyn CompetitorFeed,
        request: &ResolveRequest<'_>,
        filter: &CompetitorFilter,
    ) -> CompetitorQuote {
        let listing = request.listing;
        let Some(query) = self.search_query(listing, request.rule) else {
            debug!("Nothing to search by for item {}", listing.item_id);
            return CompetitorQuote::none(QuoteOutcome::NoData, 0);
        };

        let results = match with_timeout(
            "search_competitors",
            self.settings.call_timeout,
            feed.search_competitors(&query),
        )
        .await
        {
            Ok(results) => results,
            Err(e) => {
                warn!(item_id = %listing.item_id, error = %e, "Live competitor search failed");
                return CompetitorQuote::none(QuoteOutcome::NoData, 0);
            }
        };

        // Our own listing can show up in search results
        let candidates: Vec<_> = results
            .into_iter()
            .filter(|c| c.competitor_item_id != listing.item_id)
            .take(self.settings.search_limit as usize)
            .collect();
        if candidates.is_empty() {
            return CompetitorQuote::none(QuoteOutcome::NoData, 0);
        }

        let outcome = filter.lowest(&candidates);
        info!(
            price = ?outcome.lowest,
            kept = outcome.kept,
            excluded = outcome.excluded,
            "Resolved competitor price from live search"
        );
        match outcome.lowest {
            Some(price) => CompetitorQuote {
                price: Some(price),
                sample_count: outcome.kept,
                source: PriceSource::ApiSearch,
                outcome: QuoteOutcome::Found,
                excluded: outcome.excluded,
                refreshed: 0,
            },
            None => CompetitorQuote::none(QuoteOutcome::FilteredOut, outcome.excluded),
        }
    }

    /// MPN when the rule asks for it, otherwise product codes and title keywords
    fn search_query(&self, listing: &ListingBinding, rule: Option<&CompetitorRule>) -> Option<SearchQuery> {
        let by_mpn = rule.map(|r| r.find_competitors_based_on_mpn).unwrap_or(false);
        let mut query = SearchQuery {
            item_id: listing.item_id.clone(),
            limit: self.settings.search_limit,
            ..Default::default()
        };

        if by_mpn && listing.mpn.is_some() {
            query.mpn = listing.mpn.clone();
        } else {
            query.upc = listing.upc.clone();
            query.ean = listing.ean.clone();
            query.keywords = listing
                .title
                .as_ref()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty());
        }

        let searchable = query.mpn.is_some()
            || query.upc.is_some()
            || query.ean.is_some()
            || query.keywords.is_some();
        searchable.then_some(query)
    }
}
