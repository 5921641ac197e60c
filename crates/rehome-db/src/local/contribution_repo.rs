use async_trait::async_trait;
use rehome_core::{
    CompositeKey, ContributionStore, KeyValue, ModelEntry, RowKey, StoreResult, WriteOutcome,
};
use sqlx_core::row::Row;
use sqlx_sqlite::{Sqlite, SqliteRow};
use tracing::{instrument, Span};

use crate::sql;
use crate::{write_outcome, SqlitePool};

pub struct LocalContributionRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> LocalContributionRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }
}

fn decode_value(row: &SqliteRow, index: usize) -> Result<KeyValue, sqlx_core::Error> {
    match row.try_get::<i64, _>(index) {
        Ok(value) => Ok(KeyValue::Int(value)),
        Err(_) => row.try_get::<String, _>(index).map(KeyValue::Text),
    }
}

fn decode_row_key(entry: &ModelEntry, row: &SqliteRow) -> Result<RowKey, sqlx_core::Error> {
    if entry.primary_key.is_some() {
        return row.try_get::<i64, _>(0).map(RowKey::Id);
    }
    let mut key = CompositeKey::new();
    for (index, column) in sql::key_columns(entry).into_iter().enumerate() {
        key.insert(column, decode_value(row, index)?);
    }
    Ok(RowKey::Composite(key))
}

#[async_trait]
impl ContributionStore for LocalContributionRepo<'_> {
    #[instrument(
        level = "debug",
        skip(self, entry, key),
        fields(table = %entry.table, model = %entry.model, db.system = "sqlite", db.operation = "UPDATE", db.query = "contributions.reassign_row", db.rows = tracing::field::Empty)
    )]
    async fn reassign_row(
        &self,
        entry: &ModelEntry,
        column: &str,
        key: &RowKey,
        from: i64,
        to: i64,
    ) -> StoreResult<WriteOutcome> {
        let mut builder = sql::reassign_row::<Sqlite>(entry, column, key, from, to)?;
        let result = builder
            .build()
            .execute(self.pool)
            .await;
        Ok(write_outcome(result, |done| {
            Span::current().record("db.rows", done.rows_affected() as i64);
            done.rows_affected()
        })?)
    }

    #[instrument(
        level = "debug",
        skip(self, entry, ids),
        fields(table = %entry.table, model = %entry.model, column, ids = ids.len(), db.system = "sqlite", db.operation = "UPDATE", db.query = "contributions.reassign_ids", db.rows = tracing::field::Empty)
    )]
    async fn reassign_ids(
        &self,
        entry: &ModelEntry,
        column: &str,
        ids: &[i64],
        from: i64,
        to: i64,
    ) -> StoreResult<WriteOutcome> {
        if ids.is_empty() {
            return Ok(WriteOutcome::Applied(0));
        }
        let mut builder = sql::reassign_ids::<Sqlite>(entry, column, ids, from, to)?;
        let result = builder
            .build()
            .execute(self.pool)
            .await;
        Ok(write_outcome(result, |done| {
            Span::current().record("db.rows", done.rows_affected() as i64);
            done.rows_affected()
        })?)
    }

    #[instrument(
        level = "debug",
        skip(self, entry, key),
        fields(table = %entry.table, model = %entry.model, db.system = "sqlite", db.operation = "DELETE", db.query = "contributions.delete_row", db.rows = tracing::field::Empty)
    )]
    async fn delete_row(
        &self,
        entry: &ModelEntry,
        column: &str,
        key: &RowKey,
        owner: i64,
    ) -> StoreResult<u64> {
        let mut builder = sql::delete_row::<Sqlite>(entry, column, key, owner)?;
        let result = builder
            .build()
            .execute(self.pool)
            .await?;
        Span::current().record("db.rows", result.rows_affected() as i64);
        Ok(result.rows_affected())
    }

    #[instrument(
        level = "debug",
        skip(self, entry),
        fields(table = %entry.table, model = %entry.model, db.system = "sqlite", db.operation = "SELECT", db.query = "contributions.owned_row_keys", db.rows = tracing::field::Empty)
    )]
    async fn owned_row_keys(
        &self,
        entry: &ModelEntry,
        column: &str,
        owner: i64,
        limit: i64,
    ) -> StoreResult<Vec<RowKey>> {
        let mut builder = sql::owned_row_keys::<Sqlite>(entry, column, owner, limit)?;
        let rows = builder
            .build()
            .fetch_all(self.pool)
            .await?;
        let mut keys = Vec::with_capacity(rows.len());
        for row in &rows {
            keys.push(decode_row_key(entry, row)?);
        }
        Span::current().record("db.rows", keys.len() as i64);
        Ok(keys)
    }
}
