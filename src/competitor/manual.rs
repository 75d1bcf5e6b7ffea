//! In-memory manual competitor lists

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::common::clock::{Clock, SystemClock};
use crate::common::errors::{RepricerError, Result};
use crate::common::traits::CompetitorStore;
use crate::common::types::CompetitorListing;
use crate::competitor::types::ManualCompetitorList;

type ListKey = (String, String);

fn key(user_id: &str, item_id: &str) -> ListKey {
    (user_id.to_string(), item_id.to_string())
}

/// Manual competitor lists keyed by (user, item)
pub struct ManualCompetitorStore {
    lists: Arc<RwLock<HashMap<ListKey, ManualCompetitorList>>>,
    clock: Arc<dyn Clock>,
}

impl ManualCompetitorStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            lists: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Track a competitor for a listing, creating the list on first use
    #[instrument(skip(self, listing), fields(competitor = %listing.competitor_item_id))]
    pub async fn add_competitor(
        &self,
        user_id: &str,
        item_id: &str,
        listing: CompetitorListing,
    ) -> Result<ManualCompetitorList> {
        let now = self.clock.now();
        let mut lists = self.lists.write().await;
        let list = lists
            .entry(key(user_id, item_id))
            .or_insert_with(|| ManualCompetitorList::new(user_id, item_id));
        list.add(listing, now)?;
        info!("Tracking {} competitors for item {}", list.competitors.len(), item_id);
        Ok(list.clone())
    }

    #[instrument(skip(self))]
    pub async fn remove_competitor(
        &self,
        user_id: &str,
        item_id: &str,
        competitor_item_id: &str,
    ) -> Result<()> {
        let mut lists = self.lists.write().await;
        let list = lists.get_mut(&key(user_id, item_id)).ok_or_else(|| {
            RepricerError::NotFound(format!("manual competitor list for item {}", item_id))
        })?;
        list.remove(competitor_item_id)?;
        Ok(())
    }

    /// Change monitoring settings of an existing list
    pub async fn set_monitoring(
        &self,
        user_id: &str,
        item_id: &str,
        enabled: bool,
        frequency_minutes: u32,
    ) -> Result<()> {
        if frequency_minutes == 0 {
            return Err(RepricerError::Validation(
                "monitoring frequency must be at least one minute".into(),
            ));
        }
        let mut lists = self.lists.write().await;
        let list = lists.get_mut(&key(user_id, item_id)).ok_or_else(|| {
            RepricerError::NotFound(format!("manual competitor list for item {}", item_id))
        })?;
        list.monitoring_enabled = enabled;
        list.monitoring_frequency_minutes = frequency_minutes;
        Ok(())
    }

    pub async fn get(&self, user_id: &str, item_id: &str) -> Option<ManualCompetitorList> {
        self.lists.read().await.get(&key(user_id, item_id)).cloned()
    }

    /// Replace a whole list (snapshot import)
    pub async fn insert_list(&self, list: ManualCompetitorList) {
        let mut lists = self.lists.write().await;
        lists.insert(key(&list.user_id, &list.item_id), list);
    }

    pub async fn lists(&self) -> Vec<ManualCompetitorList> {
        let mut lists: Vec<_> = self.lists.read().await.values().cloned().collect();
        lists.sort_by(|a, b| (&a.user_id, &a.item_id).cmp(&(&b.user_id, &b.item_id)));
        lists
    }
}

impl Default for ManualCompetitorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompetitorStore for ManualCompetitorStore {
    async fn manual_competitors(
        &self,
        user_id: &str,
        item_id: &str,
    ) -> Result<Option<ManualCompetitorList>> {
        Ok(self.get(user_id, item_id).await)
    }

    /// Writes back prices and monitoring metadata without touching membership
    async fn save_manual_competitors(&self, updated: &ManualCompetitorList) -> Result<()> {
        let mut lists = self.lists.write().await;
        let list = lists
            .get_mut(&key(&updated.user_id, &updated.item_id))
            .ok_or_else(|| {
                RepricerError::NotFound(format!(
                    "manual competitor list for item {}",
                    updated.item_id
                ))
            })?;

        for entry in &updated.competitors {
            list.set_price(&entry.listing.competitor_item_id, entry.listing.price);
        }
        list.last_monitoring_check = updated.last_monitoring_check;
        list.last_lowest_price = updated.last_lowest_price;
        Ok(())
    }
}
