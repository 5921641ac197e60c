use rehome_core::IndexCatalog;

use super::prelude::*;

pub struct PgIndexCatalog<'a> {
    pool: &'a PgPool,
}

impl<'a> PgIndexCatalog<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IndexCatalog for PgIndexCatalog<'_> {
    async fn leading_index_columns(&self, table: &str) -> StoreResult<Vec<String>> {
        let rows = query!(
            r#"
            SELECT DISTINCT a.attname::text as "name"
            FROM pg_index i
            JOIN pg_class c ON c.oid = i.indrelid
            JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = i.indkey[0]
            WHERE c.relname = $1
              AND pg_table_is_visible(c.oid)
              AND i.indisvalid
              AND i.indpred IS NULL
            "#,
            table
        )
        .fetch_all(self.pool)
        .await?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            columns.push(row.try_get("name")?);
        }
        Ok(columns)
    }
}
