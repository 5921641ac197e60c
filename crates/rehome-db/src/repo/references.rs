use rehome_core::PlaceholderReferenceStore;
use sqlx_core::types::Json;

use super::prelude::*;

pub struct PlaceholderReferenceRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> PlaceholderReferenceRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, reference: &NewPlaceholderReference) -> Result<i64, sqlx_core::Error> {
        let composite_key = reference.composite_key.as_ref().map(|key| Json(key.to_json()));
        let row = query!(
            r#"
            INSERT INTO import_source_user_placeholder_references (
                source_user_id,
                namespace_id,
                model,
                user_reference_column,
                numeric_key,
                composite_key,
                alias_version,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
            reference.source_user_id,
            reference.namespace_id,
            reference.model.as_str(),
            reference.user_reference_column.as_str(),
            reference.numeric_key,
            composite_key,
            reference.alias_version,
            Utc::now()
        )
        .fetch_one(self.pool)
        .await?;
        row.try_get("id")
    }

    pub async fn count_for_source_user(&self, source_user_id: i64) -> Result<i64, sqlx_core::Error> {
        let row = query!(
            r#"
            SELECT COUNT(*) as "count"
            FROM import_source_user_placeholder_references
            WHERE source_user_id = $1
            "#,
            source_user_id
        )
        .fetch_one(self.pool)
        .await?;
        row.try_get("count")
    }
}

#[async_trait]
impl PlaceholderReferenceStore for PlaceholderReferenceRepo<'_> {
    #[instrument(
        level = "debug",
        skip(self),
        fields(db.system = "postgresql", db.operation = "SELECT", db.query = "placeholder_references.list_for_source_user")
    )]
    async fn list_for_source_user(
        &self,
        source_user_id: i64,
        after_id: i64,
        limit: i64,
    ) -> StoreResult<Vec<PlaceholderReference>> {
        let references = query_as!(
            PlaceholderReference,
            r#"
            SELECT
                id,
                source_user_id,
                namespace_id,
                model,
                user_reference_column,
                numeric_key,
                composite_key,
                alias_version,
                created_at
            FROM import_source_user_placeholder_references
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
        Span::current().record("db.rows", references.len() as i64);
        Ok(references)
    }

    #[instrument(
        level = "debug",
        skip(self),
        fields(reference_id = id, db.system = "postgresql", db.operation = "DELETE", db.query = "placeholder_references.delete")
    )]
    async fn delete_reference(&self, id: i64) -> StoreResult<u64> {
        let result = query!(
            r#"
            DELETE FROM import_source_user_placeholder_references
            WHERE id = $1
            "#,
            id
        )
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
