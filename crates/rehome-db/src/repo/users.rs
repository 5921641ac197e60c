use rehome_core::UserDirectory;

use super::prelude::*;

pub struct UserRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for UserRepo<'_> {
    async fn find_user(&self, id: i64) -> StoreResult<Option<UserSummary>> {
        let user = query_as!(
            UserSummary,
            r#"
            SELECT id, email, admin
            FROM users
            WHERE id = $1
            "#,
            id
        )
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }
}
