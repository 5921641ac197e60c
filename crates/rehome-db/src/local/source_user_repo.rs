use async_trait::async_trait;
use chrono::Utc;
use rehome_core::{NewSourceUser, SourceUser, SourceUserStatus, SourceUserStore, StoreResult};

use crate::SqlitePool;

pub struct LocalSourceUserRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> LocalSourceUserRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user: &NewSourceUser) -> Result<SourceUser, sqlx_core::Error> {
        let now = Utc::now();
        query_as!(
            SourceUser,
            r#"
            INSERT INTO import_source_users (
                namespace_id,
                placeholder_user_id,
                source_hostname,
                status,
                created_at,
                updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            RETURNING
                id,
                namespace_id,
                placeholder_user_id,
                reassign_to_user_id,
                reassigned_by_user_id,
                source_hostname,
                status,
                created_at,
                updated_at
            "#,
            user.namespace_id,
            user.placeholder_user_id,
            user.source_hostname.as_str(),
            SourceUserStatus::Pending.as_i32(),
            now
        )
        .fetch_one(self.pool)
        .await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<SourceUser>, sqlx_core::Error> {
        query_as!(
            SourceUser,
            r#"
            SELECT
                id,
                namespace_id,
                placeholder_user_id,
                reassign_to_user_id,
                reassigned_by_user_id,
                source_hostname,
                status,
                created_at,
                updated_at
            FROM import_source_users
            WHERE id = ?1
            "#,
            id
        )
        .fetch_optional(self.pool)
        .await
    }

    /// Records the destination and moves a pending source user into progress.
    pub async fn start_reassignment(
        &self,
        id: i64,
        reassign_to_user_id: i64,
        reassigned_by_user_id: Option<i64>,
    ) -> Result<bool, sqlx_core::Error> {
        let result = query!(
            r#"
            UPDATE import_source_users
            SET reassign_to_user_id = ?2,
                reassigned_by_user_id = ?3,
                status = ?4,
                updated_at = ?5
            WHERE id = ?1 AND status = ?6
            "#,
            id,
            reassign_to_user_id,
            reassigned_by_user_id,
            SourceUserStatus::ReassignmentInProgress.as_i32(),
            Utc::now(),
            SourceUserStatus::Pending.as_i32()
        )
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SourceUserStore for LocalSourceUserRepo<'_> {
    async fn find_source_user(&self, id: i64) -> StoreResult<Option<SourceUser>> {
        Ok(self.get_by_id(id).await?)
    }

    async fn complete_reassignment(&self, id: i64) -> StoreResult<bool> {
        let result = query!(
            r#"
            UPDATE import_source_users
            SET status = ?2, updated_at = ?3
            WHERE id = ?1 AND status = ?4
            "#,
            id,
            SourceUserStatus::Completed.as_i32(),
            Utc::now(),
            SourceUserStatus::ReassignmentInProgress.as_i32()
        )
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
