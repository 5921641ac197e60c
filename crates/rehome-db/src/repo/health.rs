use std::collections::HashSet;

use rehome_core::{HealthProbe, HealthSignal};

use super::prelude::*;

/// Reads replica lag from `pg_stat_replication` and per-relation autovacuum
/// progress from `pg_stat_progress_vacuum`.
pub struct PgHealthProbe<'a> {
    pool: &'a PgPool,
    max_replication_lag_seconds: f64,
    unavailable_tables: HashSet<String>,
}

impl<'a> PgHealthProbe<'a> {
    pub fn new(
        pool: &'a PgPool,
        max_replication_lag_seconds: u64,
        unavailable_tables: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            pool,
            max_replication_lag_seconds: max_replication_lag_seconds as f64,
            unavailable_tables: unavailable_tables.into_iter().collect(),
        }
    }
}

#[async_trait]
impl HealthProbe for PgHealthProbe<'_> {
    async fn check(&self) -> StoreResult<HealthSignal> {
        let row = query!(
            r#"
            SELECT EXTRACT(EPOCH FROM MAX(replay_lag))::float8 as "lag"
            FROM pg_stat_replication
            "#
        )
        .fetch_one(self.pool)
        .await?;
        let lag: Option<f64> = row.try_get("lag")?;
        match lag {
            Some(lag) if lag > self.max_replication_lag_seconds => Ok(HealthSignal::Unhealthy(
                format!(
                    "replication lag {lag:.1}s exceeds {}s",
                    self.max_replication_lag_seconds
                ),
            )),
            _ => Ok(HealthSignal::Healthy),
        }
    }

    async fn table_unavailable(&self, table: &str) -> StoreResult<bool> {
        if self.unavailable_tables.contains(table) {
            return Ok(true);
        }
        let row = query!(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM pg_stat_progress_vacuum v
                JOIN pg_stat_activity a ON a.pid = v.pid
                WHERE v.relid = to_regclass($1)
                  AND a.backend_type = 'autovacuum worker'
            ) as "active"
            "#,
            table
        )
        .fetch_one(self.pool)
        .await?;
        Ok(row.try_get("active")?)
    }
}
