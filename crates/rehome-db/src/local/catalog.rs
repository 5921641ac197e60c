use async_trait::async_trait;
use rehome_core::{IndexCatalog, StoreResult};
use sqlx_core::row::Row;

use crate::SqlitePool;

pub struct LocalIndexCatalog<'a> {
    pool: &'a SqlitePool,
}

impl<'a> LocalIndexCatalog<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IndexCatalog for LocalIndexCatalog<'_> {
    async fn leading_index_columns(&self, table: &str) -> StoreResult<Vec<String>> {
        let rows = query!(
            r#"
            SELECT DISTINCT ii.name as "name"
            FROM pragma_index_list(?1) AS il
            JOIN pragma_index_info(il.name) AS ii
            WHERE ii.seqno = 0 AND il.partial = 0
            "#,
            table
        )
        .fetch_all(self.pool)
        .await?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: Option<String> = row.try_get("name")?;
            columns.extend(name);
        }
        Ok(columns)
    }
}
