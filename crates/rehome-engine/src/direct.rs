//! Direct reassignment.
//!
//! Sweeps every registered (model, column) against the live tables, moving
//! rows whose column still holds the placeholder id. Rows already moved stop
//! matching, so repeated calls only pick up what is left.

use rehome_core::{
    ContributionStore, ModelEntry, ResolvedColumn, RowKey, VerifiedRegistry, WriteOutcome,
};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ReassignmentConfig;
use crate::conflict::{reassign_or_destroy, RowResult};
use crate::errors::ReassignError;
use crate::throttle::Throttle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectRequest {
    pub placeholder_user_id: i64,
    pub reassign_to_user_id: i64,
    /// Only used to label log events.
    pub source_user_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectStats {
    pub rows_updated: u64,
    pub conflicts_resolved: u64,
    pub units_processed: u64,
    pub units_skipped: u64,
    pub batches_paced: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectOutcome {
    Disabled,
    Finished(DirectStats),
}

pub struct DirectEngine<'a> {
    contributions: &'a dyn ContributionStore,
    registry: &'a VerifiedRegistry,
    throttle: Throttle<'a>,
    enabled: bool,
    batch_size: i64,
}

impl<'a> DirectEngine<'a> {
    pub fn new(
        contributions: &'a dyn ContributionStore,
        registry: &'a VerifiedRegistry,
        throttle: Throttle<'a>,
        config: &ReassignmentConfig,
    ) -> Self {
        Self {
            contributions,
            registry,
            throttle,
            enabled: config.direct.enabled,
            batch_size: config.batch_limit(),
        }
    }

    pub async fn execute(self, request: DirectRequest) -> Result<DirectOutcome, ReassignError> {
        if !self.enabled {
            return Ok(DirectOutcome::Disabled);
        }
        // A self-reassignment matches its own writes on every pass.
        if request.placeholder_user_id == request.reassign_to_user_id {
            tracing::warn!(
                event = "direct_same_user",
                placeholder_user_id = request.placeholder_user_id,
                source_user_id = request.source_user_id,
                "Placeholder and destination user are the same, nothing to reassign"
            );
            return Ok(DirectOutcome::Finished(DirectStats::default()));
        }
        let span = tracing::info_span!(
            "reassign_placeholder_user_direct",
            run_id = %Uuid::now_v7(),
            placeholder_user_id = request.placeholder_user_id,
            source_user_id = request.source_user_id
        );
        self.run(request).instrument(span).await
    }

    async fn run(mut self, request: DirectRequest) -> Result<DirectOutcome, ReassignError> {
        self.throttle.ensure_healthy().await?;

        let mut stats = DirectStats::default();
        let registry = self.registry;
        for unit in registry.pairs() {
            self.throttle.check_execution_time()?;
            if !self
                .throttle
                .table_available(&unit.entry.table, &unit.entry.model)
                .await?
            {
                stats.units_skipped += 1;
                continue;
            }
            self.reassign_unit(unit, request, &mut stats).await?;
            stats.units_processed += 1;
        }

        tracing::info!(
            event = "direct_finished",
            rows_updated = stats.rows_updated,
            conflicts_resolved = stats.conflicts_resolved,
            units_skipped = stats.units_skipped,
            "Direct reassignment finished"
        );
        Ok(DirectOutcome::Finished(stats))
    }

    async fn reassign_unit(
        &self,
        unit: ResolvedColumn<'_>,
        request: DirectRequest,
        stats: &mut DirectStats,
    ) -> Result<(), ReassignError> {
        let entry = unit.entry;
        loop {
            self.throttle.check_execution_time()?;
            let keys = self
                .contributions
                .owned_row_keys(entry, unit.column, request.placeholder_user_id, self.batch_size)
                .await?;
            if keys.is_empty() {
                break;
            }

            let progress = self.reassign_batch(entry, unit.column, &keys, request, stats).await?;

            if self.throttle.pace().await {
                stats.batches_paced += 1;
            }
            if progress == 0 {
                tracing::warn!(
                    event = "direct_stalled",
                    model = %entry.model,
                    column = unit.column,
                    "Placeholder-owned rows could not be moved, leaving them for a later run"
                );
                break;
            }
            if (keys.len() as i64) < self.batch_size {
                break;
            }
        }
        Ok(())
    }

    /// Returns how many rows stopped matching the placeholder.
    async fn reassign_batch(
        &self,
        entry: &ModelEntry,
        column: &str,
        keys: &[RowKey],
        request: DirectRequest,
        stats: &mut DirectStats,
    ) -> Result<u64, ReassignError> {
        let ids: Option<Vec<i64>> = keys
            .iter()
            .map(|key| match key {
                RowKey::Id(id) => Some(*id),
                RowKey::Composite(_) => None,
            })
            .collect();
        if let Some(ids) = ids.filter(|_| entry.primary_key.is_some()) {
            let outcome = self
                .contributions
                .reassign_ids(
                    entry,
                    column,
                    &ids,
                    request.placeholder_user_id,
                    request.reassign_to_user_id,
                )
                .await?;
            if let WriteOutcome::Applied(rows) = outcome {
                stats.rows_updated += rows;
                return Ok(rows);
            }
        }

        // One row at a time, so a single collision only costs its own row.
        let mut progress = 0;
        for key in keys {
            let result = reassign_or_destroy(
                self.contributions,
                entry,
                column,
                key,
                request.placeholder_user_id,
                request.reassign_to_user_id,
                request.source_user_id,
            )
            .await?;
            match result {
                RowResult::Reassigned => {
                    stats.rows_updated += 1;
                    progress += 1;
                }
                RowResult::Destroyed => {
                    stats.conflicts_resolved += 1;
                    progress += 1;
                }
                RowResult::AlreadyConsumed => {}
            }
        }
        Ok(progress)
    }
}
