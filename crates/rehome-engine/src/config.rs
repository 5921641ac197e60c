use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BATCH_SIZE: i64 = 500;
pub const DEFAULT_RELATION_BATCH_SLEEP_MS: u64 = 1000;
pub const DEFAULT_EXECUTION_BUDGET_SECONDS: u64 = 120;
pub const DEFAULT_HEALTH_CACHE_TTL_SECONDS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignmentConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
    #[serde(default = "default_relation_batch_sleep_ms")]
    pub relation_batch_sleep_ms: u64,
    #[serde(default = "default_execution_budget_seconds")]
    pub execution_budget_seconds: u64,
    #[serde(default)]
    pub throttling: ThrottlingConfig,
    #[serde(default)]
    pub direct: DirectConfig,
}

impl Default for ReassignmentConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            relation_batch_sleep_ms: default_relation_batch_sleep_ms(),
            execution_budget_seconds: default_execution_budget_seconds(),
            throttling: ThrottlingConfig::default(),
            direct: DirectConfig::default(),
        }
    }
}

impl ReassignmentConfig {
    /// Batch size clamped to at least one row.
    pub fn batch_limit(&self) -> i64 {
        self.batch_size.max(1)
    }

    pub fn relation_batch_sleep(&self) -> Duration {
        Duration::from_millis(self.relation_batch_sleep_ms)
    }

    pub fn execution_budget(&self) -> Duration {
        Duration::from_secs(self.execution_budget_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottlingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_health_cache_ttl_seconds")]
    pub health_cache_ttl_seconds: u64,
}

impl Default for ThrottlingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            health_cache_ttl_seconds: default_health_cache_ttl_seconds(),
        }
    }
}

impl ThrottlingConfig {
    pub fn health_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.health_cache_ttl_seconds)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectConfig {
    #[serde(default)]
    pub enabled: bool,
}

const fn default_batch_size() -> i64 {
    DEFAULT_BATCH_SIZE
}

const fn default_relation_batch_sleep_ms() -> u64 {
    DEFAULT_RELATION_BATCH_SLEEP_MS
}

const fn default_execution_budget_seconds() -> u64 {
    DEFAULT_EXECUTION_BUDGET_SECONDS
}

const fn default_health_cache_ttl_seconds() -> u64 {
    DEFAULT_HEALTH_CACHE_TTL_SECONDS
}

const fn default_true() -> bool {
    true
}
