use rehome_engine::ReassignmentConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkerConfig {
    #[serde(default)]
    pub reassignment: ReassignmentConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

pub const DEFAULT_MAX_REPLICATION_LAG_SECONDS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_max_replication_lag_seconds")]
    pub max_replication_lag_seconds: u64,
    #[serde(default)]
    pub unavailable_tables: Vec<String>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            max_replication_lag_seconds: default_max_replication_lag_seconds(),
            unavailable_tables: Vec::new(),
        }
    }
}

/// Optional YAML registry replacing the built-in model list.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegistryConfig {
    #[serde(default)]
    pub file: Option<String>,
}

const fn default_max_replication_lag_seconds() -> u64 {
    DEFAULT_MAX_REPLICATION_LAG_SECONDS
}
