//! Store module - strategy/rule catalog and snapshots

mod config_store;
mod snapshot;

pub use config_store::{ApplyTarget, ConfigStore, DEFAULT_HISTORY_LIMIT};

pub use snapshot::CatalogSnapshot;
