//! JSON catalog snapshots used to seed the engine

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::common::errors::Result;
use crate::competitor::{CompetitorRule, ManualCompetitorList, ManualCompetitorStore};
use crate::pricing::{ListingBinding, PricingStrategy};
use crate::store::config_store::ConfigStore;

/// Everything the engine needs to know about a seller's catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub strategies: Vec<PricingStrategy>,
    #[serde(default)]
    pub rules: Vec<CompetitorRule>,
    #[serde(default)]
    pub listings: Vec<ListingBinding>,
    #[serde(default)]
    pub manual_competitors: Vec<ManualCompetitorList>,
}

impl CatalogSnapshot {
    /// Current state of both stores, ready to be written back
    pub async fn capture(store: &ConfigStore, competitors: &ManualCompetitorStore) -> Self {
        Self {
            manual_competitors: competitors.lists().await,
            ..store.export().await
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading catalog from {}", path.display());
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}
