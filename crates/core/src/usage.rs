//! Monthly generation quota tracking.

use crate::ports::InterviewBackend;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Free-tier monthly limit assumed when the backend cannot be reached.
pub const DEFAULT_MONTHLY_LIMIT: i64 = 7;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub current: i64,
    pub limit: i64,
    pub remaining: i64,
    pub is_premium: bool,
}

impl UsageStats {
    /// Builds stats from raw counters, deriving `remaining`.
    pub fn new(current: i64, limit: i64, is_premium: bool) -> Self {
        Self {
            current,
            limit,
            remaining: (limit - current).max(0),
            is_premium,
        }
    }

    /// Quota used when the backend cannot be reached.
    pub fn default_quota() -> Self {
        Self::new(0, DEFAULT_MONTHLY_LIMIT, false)
    }

    /// Premium accounts have no enforced limit.
    pub fn has_limit_reached(&self) -> bool {
        !self.is_premium && self.remaining <= 0
    }
}

impl Default for UsageStats {
    fn default() -> Self {
        Self::default_quota()
    }
}

/// Holds the most recently known quota counters.
#[derive(Debug, Clone, Default)]
pub struct UsageStore {
    stats: UsageStats,
    loaded: bool,
}

impl UsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> UsageStats {
        self.stats
    }

    /// True once a fetch has completed (successfully or with fallback).
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn has_limit_reached(&self) -> bool {
        self.stats.has_limit_reached()
    }

    /// Overwrites the counters, e.g. with the usage attached to a generation response.
    pub fn set(&mut self, stats: UsageStats) {
        self.stats = stats;
        self.loaded = true;
    }

    /// Refreshes the counters from the backend, falling back to the default quota.
    pub async fn fetch_usage(&mut self, backend: &dyn InterviewBackend) -> UsageStats {
        match backend.usage_stats().await {
            Ok(stats) => {
                info!(current = stats.current, limit = stats.limit, premium = stats.is_premium, "Usage refreshed");
                self.set(stats);
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch usage stats, using default quota");
                self.set(UsageStats::default_quota());
            }
        }
        self.stats
    }
}
