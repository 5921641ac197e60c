use rehome_core::{MembershipStore, MEMBER_SOURCE_NAMESPACE};

use super::prelude::*;
use crate::write_outcome;

const GROUP_ANCESTORS: &str = r#"
    WITH RECURSIVE ancestors(id, parent_id, depth) AS (
        SELECT id, parent_id, 0 FROM namespaces WHERE id = $1
        UNION ALL
        SELECT n.id, n.parent_id, a.depth + 1
        FROM namespaces n
        JOIN ancestors a ON n.id = a.parent_id
    )
"#;

const PROJECT_ANCESTORS: &str = r#"
    WITH RECURSIVE ancestors(id, parent_id, depth) AS (
        SELECT n.id, n.parent_id, 0
        FROM projects p
        JOIN namespaces n ON n.id = p.namespace_id
        WHERE p.id = $1
        UNION ALL
        SELECT n.id, n.parent_id, a.depth + 1
        FROM namespaces n
        JOIN ancestors a ON n.id = a.parent_id
    )
"#;

fn ancestors_cte(target: MembershipTarget) -> &'static str {
    match target {
        MembershipTarget::Group(_) => GROUP_ANCESTORS,
        MembershipTarget::Project(_) => PROJECT_ANCESTORS,
    }
}

pub struct MembershipRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> MembershipRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_placeholder_membership(
        &self,
        membership: &NewPlaceholderMembership,
    ) -> Result<i64, sqlx_core::Error> {
        let (group_id, project_id) = match membership.target {
            MembershipTarget::Group(id) => (Some(id), None),
            MembershipTarget::Project(id) => (None, Some(id)),
        };
        let row = query!(
            r#"
            INSERT INTO import_placeholder_memberships (
                source_user_id,
                namespace_id,
                group_id,
                project_id,
                access_level,
                expires_at,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
            membership.source_user_id,
            membership.namespace_id,
            group_id,
            project_id,
            membership.access_level.as_i32(),
            membership.expires_at,
            Utc::now()
        )
        .fetch_one(self.pool)
        .await?;
        row.try_get("id")
    }

    pub async fn list_members_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<ExistingMembership>, sqlx_core::Error> {
        query_as!(
            ExistingMembership,
            r#"
            SELECT id, user_id, source_type, source_id, access_level
            FROM members
            WHERE user_id = $1
            ORDER BY id
            "#,
            user_id
        )
        .fetch_all(self.pool)
        .await
    }
}

#[async_trait]
impl MembershipStore for MembershipRepo<'_> {
    async fn list_placeholder_memberships(
        &self,
        source_user_id: i64,
        after_id: i64,
        limit: i64,
    ) -> StoreResult<Vec<PlaceholderMembership>> {
        let memberships = query_as!(
            PlaceholderMembership,
            r#"
            SELECT
                id,
                source_user_id,
                namespace_id,
                group_id,
                project_id,
                access_level,
                expires_at,
                created_at
            FROM import_placeholder_memberships
            WHERE source_user_id = $1 AND id > $2
            ORDER BY id
            LIMIT $3
            "#,
            source_user_id,
            after_id,
            limit
        )
        .fetch_all(self.pool)
        .await?;
        Ok(memberships)
    }

    async fn target_ancestry(&self, target: MembershipTarget) -> StoreResult<Vec<i64>> {
        let sql = format!(
            "{} SELECT id FROM ancestors ORDER BY depth",
            ancestors_cte(target)
        );
        let rows = query!(&sql, target.source_id())
            .fetch_all(self.pool)
            .await?;
        let mut ancestry = Vec::with_capacity(rows.len());
        for row in rows {
            ancestry.push(row.try_get("id")?);
        }
        Ok(ancestry)
    }

    async fn existing_memberships(
        &self,
        user_id: i64,
        target: MembershipTarget,
    ) -> StoreResult<Vec<ExistingMembership>> {
        let sql = format!(
            r#"{}
            SELECT id, user_id, source_type, source_id, access_level
            FROM members
            WHERE user_id = $2
              AND ((source_type = $3 AND source_id = $1)
                OR (source_type = $4 AND source_id IN (SELECT id FROM ancestors)))
            ORDER BY access_level DESC, id
            "#,
            ancestors_cte(target)
        );
        let memberships = query_as!(
            ExistingMembership,
            &sql,
            target.source_id(),
            user_id,
            target.source_type(),
            MEMBER_SOURCE_NAMESPACE
        )
        .fetch_all(self.pool)
        .await?;
        Ok(memberships)
    }

    async fn create_member(&self, member: &NewMember) -> StoreResult<WriteOutcome> {
        let result = query!(
            r#"
            INSERT INTO members (
                user_id,
                source_type,
                source_id,
                access_level,
                created_by_id,
                expires_at,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
            member.user_id,
            member.target.source_type(),
            member.target.source_id(),
            member.access_level.as_i32(),
            member.created_by_id,
            member.expires_at,
            Utc::now()
        )
        .execute(self.pool)
        .await;
        Ok(write_outcome(result, |done| done.rows_affected())?)
    }

    async fn delete_placeholder_membership(&self, id: i64) -> StoreResult<u64> {
        let result = query!(
            r#"
            DELETE FROM import_placeholder_memberships
            WHERE id = $1
            "#,
            id
        )
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
