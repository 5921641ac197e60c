use async_trait::async_trait;
use rehome_core::{StoreResult, UserDirectory, UserSummary};

use crate::SqlitePool;

pub struct LocalUserRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> LocalUserRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for LocalUserRepo<'_> {
    async fn find_user(&self, id: i64) -> StoreResult<Option<UserSummary>> {
        let user = query_as!(
            UserSummary,
            r#"
            SELECT id, email, admin
            FROM users
            WHERE id = ?1
            "#,
            id
        )
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }
}
