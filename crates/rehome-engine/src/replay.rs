//! Reference-replay reassignment.
//!
//! Walks the placeholder reference log of one source user, moving each
//! referenced row to the destination user and consuming the reference. A
//! reference is only left behind when its model cannot be resolved or its
//! table is unavailable for this invocation.

use rehome_core::{
    PlaceholderReference, Resolution, SourceUser, Stores, UserSummary, VerifiedRegistry,
};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ReassignmentConfig;
use crate::conflict::{reassign_or_destroy, RowResult};
use crate::errors::ReassignError;
use crate::memberships::MembershipReplay;
use crate::throttle::Throttle;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    pub rows_reassigned: u64,
    pub references_already_consumed: u64,
    pub conflicts_resolved: u64,
    pub references_unresolved: u64,
    pub references_deferred: u64,
    pub memberships_created: u64,
    pub memberships_skipped: u64,
    pub project_membership_created: bool,
    pub batches_paced: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// The source user was not in progress; nothing was touched.
    Skipped,
    Completed(ReplayStats),
    /// References remain on unavailable tables; run again later.
    Incomplete(ReplayStats),
}

impl ReplayOutcome {
    pub fn stats(&self) -> Option<&ReplayStats> {
        match self {
            Self::Skipped => None,
            Self::Completed(stats) | Self::Incomplete(stats) => Some(stats),
        }
    }
}

pub struct ReplayEngine<'a> {
    stores: Stores<'a>,
    registry: &'a VerifiedRegistry,
    throttle: Throttle<'a>,
    batch_size: i64,
}

impl<'a> ReplayEngine<'a> {
    pub fn new(
        stores: Stores<'a>,
        registry: &'a VerifiedRegistry,
        throttle: Throttle<'a>,
        config: &ReassignmentConfig,
    ) -> Self {
        Self {
            stores,
            registry,
            throttle,
            batch_size: config.batch_limit(),
        }
    }

    /// One bounded invocation for `source_user`.
    pub async fn execute(self, source_user: &SourceUser) -> Result<ReplayOutcome, ReassignError> {
        let span = tracing::info_span!(
            "reassign_placeholder_user_records",
            run_id = %Uuid::now_v7(),
            source_user_id = source_user.id
        );
        self.run(source_user).instrument(span).await
    }

    async fn run(mut self, source_user: &SourceUser) -> Result<ReplayOutcome, ReassignError> {
        if !source_user.is_reassignment_in_progress() {
            tracing::info!(
                event = "replay_skipped",
                status = source_user.status.as_str(),
                "Source user is not awaiting reassignment, skipping"
            );
            return Ok(ReplayOutcome::Skipped);
        }
        let Some(reassign_to_user_id) = source_user.reassign_to_user_id else {
            tracing::error!(
                event = "replay_skipped",
                source_user_id = source_user.id,
                "Source user has no reassign-to user, skipping"
            );
            return Ok(ReplayOutcome::Skipped);
        };

        self.throttle.ensure_healthy().await?;
        let reassigned_by = self.check_users(source_user, reassign_to_user_id).await?;

        let mut stats = ReplayStats::default();
        self.replay_references(source_user, reassign_to_user_id, &mut stats)
            .await?;

        let memberships = MembershipReplay {
            stores: self.stores,
            throttle: &self.throttle,
            batch_size: self.batch_size,
            source_user,
            reassign_to_user_id,
            created_by_id: reassigned_by.map(|user| user.id),
        };
        memberships.run(&mut stats).await?;

        if stats.references_deferred > 0 {
            tracing::info!(
                event = "replay_incomplete",
                deferred = stats.references_deferred,
                "References remain on unavailable tables, leaving source user in progress"
            );
            return Ok(ReplayOutcome::Incomplete(stats));
        }
        self.stores
            .source_users
            .complete_reassignment(source_user.id)
            .await?;
        tracing::info!(
            event = "replay_completed",
            rows_reassigned = stats.rows_reassigned,
            conflicts_resolved = stats.conflicts_resolved,
            references_unresolved = stats.references_unresolved,
            "Placeholder user records reassigned"
        );
        Ok(ReplayOutcome::Completed(stats))
    }

    /// Sanity warnings about the destination. None of them block the run.
    async fn check_users(
        &self,
        source_user: &SourceUser,
        reassign_to_user_id: i64,
    ) -> Result<Option<UserSummary>, ReassignError> {
        let destination = self.stores.users.find_user(reassign_to_user_id).await?;
        let reassigned_by = match source_user.reassigned_by_user_id {
            Some(id) => self.stores.users.find_user(id).await?,
            None => None,
        };

        if reassigned_by.is_none() {
            tracing::warn!(
                event = "reassigned_by_missing",
                source_user_id = source_user.id,
                reassigned_by_user_id = source_user.reassigned_by_user_id,
                "Reassigned by user was not found, this may affect membership checks"
            );
        }
        let Some(destination) = destination else {
            return Ok(reassigned_by);
        };
        if destination.admin {
            tracing::warn!(
                event = "reassign_to_admin",
                namespace_id = source_user.namespace_id,
                source_hostname = %source_user.source_hostname,
                source_user_id = source_user.id,
                reassign_to_user_id,
                reassigned_by_user_id = source_user.reassigned_by_user_id,
                "Reassigning contributions to user with admin privileges"
            );
        }
        if let Some(reassigned_by) = reassigned_by.as_ref() {
            if destination.email_host() != reassigned_by.email_host() {
                tracing::warn!(
                    event = "reassign_email_host_mismatch",
                    namespace_id = source_user.namespace_id,
                    source_hostname = %source_user.source_hostname,
                    source_user_id = source_user.id,
                    reassign_to_user_id,
                    reassigned_by_user_id = reassigned_by.id,
                    "Reassigning contributions to user with different email host from user who triggered the reassignment"
                );
            }
        }
        Ok(reassigned_by)
    }

    async fn replay_references(
        &mut self,
        source_user: &SourceUser,
        reassign_to_user_id: i64,
        stats: &mut ReplayStats,
    ) -> Result<(), ReassignError> {
        let mut after_id = 0;
        loop {
            let batch = self
                .stores
                .references
                .list_for_source_user(source_user.id, after_id, self.batch_size)
                .await?;
            let Some(last) = batch.last() else {
                break;
            };
            after_id = last.id;

            for reference in &batch {
                self.throttle.check_execution_time()?;
                self.replay_reference(source_user, reassign_to_user_id, reference, stats)
                    .await?;
            }

            if self.throttle.pace().await {
                stats.batches_paced += 1;
            }
            if (batch.len() as i64) < self.batch_size {
                break;
            }
        }
        Ok(())
    }

    async fn replay_reference(
        &mut self,
        source_user: &SourceUser,
        reassign_to_user_id: i64,
        reference: &PlaceholderReference,
        stats: &mut ReplayStats,
    ) -> Result<(), ReassignError> {
        let model = reference.model.as_str();
        let column = reference.user_reference_column.as_str();
        let resolved = match self
            .registry
            .resolve(model, column, reference.alias_version)
        {
            Resolution::Found(resolved) => resolved,
            Resolution::Unresolved(reason) => {
                tracing::error!(
                    event = "reference_unresolved",
                    source_user_id = source_user.id,
                    model,
                    column,
                    error = %reason,
                    "{model} is not a model, {column} cannot be reassigned."
                );
                stats.references_unresolved += 1;
                return Ok(());
            }
        };

        let entry = resolved.entry;
        if !self
            .throttle
            .table_available(&entry.table, &entry.model)
            .await?
        {
            stats.references_deferred += 1;
            return Ok(());
        }

        let key = match reference
            .row_key()
            .map_err(|err| err.to_string())
            .and_then(|key| entry.check_key(&key).map(|()| key))
        {
            Ok(key) => key,
            Err(reason) => {
                tracing::error!(
                    event = "reference_key_invalid",
                    source_user_id = source_user.id,
                    model,
                    column,
                    error = %reason,
                    "Placeholder reference key cannot address a {model} row, {column} cannot be reassigned."
                );
                stats.references_unresolved += 1;
                return Ok(());
            }
        };

        let result = reassign_or_destroy(
            self.stores.contributions,
            entry,
            resolved.column,
            &key,
            source_user.placeholder_user_id,
            reassign_to_user_id,
            Some(source_user.id),
        )
        .await?;
        match result {
            RowResult::Reassigned => stats.rows_reassigned += 1,
            RowResult::AlreadyConsumed => stats.references_already_consumed += 1,
            RowResult::Destroyed => stats.conflicts_resolved += 1,
        }
        self.stores.references.delete_reference(reference.id).await?;
        Ok(())
    }
}
