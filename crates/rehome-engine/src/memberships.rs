use rehome_core::{
    AccessLevel, NewMember, PlaceholderMembership, SourceUser, Stores, WriteOutcome,
};

use crate::errors::ReassignError;
use crate::replay::ReplayStats;
use crate::throttle::Throttle;

/// Replays the placeholder memberships of one source user onto the
/// destination user. Every processed placeholder membership is consumed.
pub(crate) struct MembershipReplay<'r, 'a> {
    pub(crate) stores: Stores<'a>,
    pub(crate) throttle: &'r Throttle<'a>,
    pub(crate) batch_size: i64,
    pub(crate) source_user: &'r SourceUser,
    pub(crate) reassign_to_user_id: i64,
    pub(crate) created_by_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MembershipResult {
    Created { project: bool },
    Skipped,
}

impl MembershipReplay<'_, '_> {
    pub(crate) async fn run(&self, stats: &mut ReplayStats) -> Result<(), ReassignError> {
        let mut after_id = 0;
        loop {
            let batch = self
                .stores
                .memberships
                .list_placeholder_memberships(self.source_user.id, after_id, self.batch_size)
                .await?;
            let Some(last) = batch.last() else {
                break;
            };
            after_id = last.id;

            for membership in &batch {
                self.throttle.check_execution_time()?;
                match self.replay(membership).await? {
                    MembershipResult::Created { project } => {
                        stats.memberships_created += 1;
                        stats.project_membership_created |= project;
                    }
                    MembershipResult::Skipped => stats.memberships_skipped += 1,
                }
                self.stores
                    .memberships
                    .delete_placeholder_membership(membership.id)
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

    async fn replay(
        &self,
        membership: &PlaceholderMembership,
    ) -> Result<MembershipResult, ReassignError> {
        let source_user_id = self.source_user.id;
        let Some(target) = membership.target() else {
            tracing::error!(
                event = "membership_invalid",
                source_user_id,
                placeholder_membership_id = membership.id,
                "Placeholder membership has no single group or project target, skipping"
            );
            return Ok(MembershipResult::Skipped);
        };

        let ancestry = self.stores.memberships.target_ancestry(target).await?;
        if !ancestry.contains(&self.source_user.namespace_id) {
            tracing::info!(
                event = "membership_target_moved",
                source_user_id,
                source_type = target.source_type(),
                source_id = target.source_id(),
                namespace_id = self.source_user.namespace_id,
                "Membership target is no longer within the import namespace, skipping"
            );
            return Ok(MembershipResult::Skipped);
        }

        let existing = self
            .stores
            .memberships
            .existing_memberships(self.reassign_to_user_id, target)
            .await?;
        let highest = existing.iter().map(|member| member.access_level).max();
        if highest.is_some_and(|level| level > membership.access_level) {
            tracing::info!(
                event = "membership_skipped",
                source_user_id,
                user_id = self.reassign_to_user_id,
                source_type = target.source_type(),
                source_id = target.source_id(),
                existing_access_level = highest.map(AccessLevel::as_i32),
                access_level = membership.access_level.as_i32(),
                "Existing membership of higher access level found for user, skipping"
            );
            return Ok(MembershipResult::Skipped);
        }
        if existing.iter().any(|member| member.is_direct_for(target)) {
            tracing::info!(
                event = "membership_skipped",
                source_user_id,
                user_id = self.reassign_to_user_id,
                source_type = target.source_type(),
                source_id = target.source_id(),
                access_level = membership.access_level.as_i32(),
                "Existing direct membership of lower or equal access level found for user, skipping"
            );
            return Ok(MembershipResult::Skipped);
        }

        let member = NewMember {
            user_id: self.reassign_to_user_id,
            target,
            access_level: membership.access_level,
            created_by_id: self.created_by_id,
            expires_at: membership.expires_at,
        };
        let failure = match self.stores.memberships.create_member(&member).await {
            Ok(WriteOutcome::Applied(rows)) if rows > 0 => {
                return Ok(MembershipResult::Created {
                    project: target.is_project(),
                });
            }
            Ok(WriteOutcome::Applied(_)) => "no row inserted".to_string(),
            Ok(WriteOutcome::UniqueViolation) => "membership already exists".to_string(),
            Err(err) => err.to_string(),
        };
        tracing::error!(
            event = "membership_create_failed",
            source_user_id,
            user_id = self.reassign_to_user_id,
            source_type = target.source_type(),
            source_id = target.source_id(),
            error = %failure,
            "Unable to create membership"
        );
        Ok(MembershipResult::Skipped)
    }
}
