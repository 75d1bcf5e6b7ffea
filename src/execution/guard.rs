use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::common::clock::Clock;
use crate::common::types::round_money;

/// Thresholds used by the execution guard
#[derive(Debug, Clone)]
pub struct GuardSettings {
    /// Smallest price change worth pushing
    pub min_price_delta: Decimal,
    /// Per-item quiet period after an execution starts
    pub cooldown: Duration,
    /// Window in which an identical (item, price) record is suppressed
    pub dedup_window: Duration,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            min_price_delta: dec!(0.01),
            cooldown: Duration::seconds(60),
            dedup_window: Duration::seconds(120),
        }
    }
}

/// Decides whether a recomputed price is worth acting on
///
/// Holds two expiring maps, each behind its own mutex: per-item cooldowns
/// and recently recorded (item, price) pairs. This is a best-effort throttle
/// for overlapping triggers, not a lock.
pub struct ExecutionGuard {
    settings: GuardSettings,
    clock: Arc<dyn Clock>,
    cooldowns: Mutex<HashMap<String, DateTime<Utc>>>,
    recent: Mutex<HashMap<(String, Decimal), DateTime<Utc>>>,
}

impl ExecutionGuard {
    pub fn new(settings: GuardSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            clock,
            cooldowns: Mutex::new(HashMap::new()),
            recent: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &GuardSettings {
        &self.settings
    }

    /// True when the change from `old` to `new` is meaningful
    pub fn should_apply(&self, old: Decimal, new: Decimal) -> bool {
        (new - old).abs() >= self.settings.min_price_delta
    }

    /// Start an execution for the item unless it is cooling down
    ///
    /// Checks and marks in one step, so of two racing callers only one
    /// proceeds.
    pub fn try_begin(&self, item_id: &str) -> bool {
        let now = self.clock.now();
        let mut cooldowns = self.cooldowns.lock();
        cooldowns.retain(|_, started| now - *started < self.settings.cooldown);

        if cooldowns.contains_key(item_id) {
            debug!(item_id, "Execution skipped, item is cooling down");
            return false;
        }
        cooldowns.insert(item_id.to_string(), now);
        true
    }

    pub fn in_cooldown(&self, item_id: &str) -> bool {
        let now = self.clock.now();
        self.cooldowns
            .lock()
            .get(item_id)
            .map(|started| now - *started < self.settings.cooldown)
            .unwrap_or(false)
    }

    /// Forget the cooldown for an item (manual override)
    pub fn clear_cooldown(&self, item_id: &str) {
        self.cooldowns.lock().remove(item_id);
    }

    /// Whether a record for (item, price) should be written; marks it if so
    pub fn should_record(&self, item_id: &str, new_price: Decimal) -> bool {
        let now = self.clock.now();
        let key = (item_id.to_string(), round_money(new_price).normalize());
        let mut recent = self.recent.lock();
        recent.retain(|_, at| now - *at < self.settings.dedup_window);

        if recent.contains_key(&key) {
            debug!(item_id, price = %new_price, "Duplicate execution record suppressed");
            return false;
        }
        recent.insert(key, now);
        true
    }

    /// Drop expired entries from both maps
    pub fn purge_expired(&self) {
        let now = self.clock.now();
        self.cooldowns
            .lock()
            .retain(|_, started| now - *started < self.settings.cooldown);
        self.recent
            .lock()
            .retain(|_, at| now - *at < self.settings.dedup_window);
    }

    /// Number of live (cooldown, de-dup) entries
    pub fn tracked(&self) -> (usize, usize) {
        (self.cooldowns.lock().len(), self.recent.lock().len())
    }
}

impl std::fmt::Debug for ExecutionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (cooldowns, recent) = self.tracked();
        f.debug_struct("ExecutionGuard")
            .field("settings", &self.settings)
            .field("cooldowns", &cooldowns)
            .field("recent", &recent)
            .finish()
    }
}
