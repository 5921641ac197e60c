use std::collections::HashSet;

use async_trait::async_trait;
use rehome_core::{HealthProbe, HealthSignal, StoreResult};

/// SQLite has no replicas or autovacuum workers to wait on; only tables named
/// in configuration are reported unavailable.
#[derive(Debug, Clone, Default)]
pub struct LocalHealthProbe {
    unavailable_tables: HashSet<String>,
}

impl LocalHealthProbe {
    pub fn new(unavailable_tables: impl IntoIterator<Item = String>) -> Self {
        Self {
            unavailable_tables: unavailable_tables.into_iter().collect(),
        }
    }
}

#[async_trait]
impl HealthProbe for LocalHealthProbe {
    async fn check(&self) -> StoreResult<HealthSignal> {
        Ok(HealthSignal::Healthy)
    }

    async fn table_unavailable(&self, table: &str) -> StoreResult<bool> {
        Ok(self.unavailable_tables.contains(table))
    }
}
