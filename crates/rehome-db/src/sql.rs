//! Statements against registered domain tables.
//!
//! Table and column names come from the model registry, which only admits
//! plain identifiers; they are still quoted here. Values are always bound.
#![cfg_attr(not(any(feature = "postgres", feature = "sqlite")), allow(dead_code))]

use rehome_core::{KeyValue, ModelEntry, RowKey, StoreError, StoreResult};
use sqlx_core::database::Database;
use sqlx_core::encode::Encode;
use sqlx_core::query_builder::QueryBuilder;
use sqlx_core::types::Type;

fn quoted(name: &str) -> String {
    format!("\"{name}\"")
}

fn check_column(entry: &ModelEntry, column: &str) -> StoreResult<()> {
    if entry.has_column(column) {
        Ok(())
    } else {
        Err(StoreError::Backend(format!(
            "{column} is not a registered user reference column of {}",
            entry.model
        )))
    }
}

fn check_key(entry: &ModelEntry, key: &RowKey) -> StoreResult<()> {
    if let RowKey::Composite(composite) = key {
        if composite.is_empty() {
            return Err(StoreError::InvalidKey("composite key is empty".to_string()));
        }
    }
    entry.check_key(key).map_err(StoreError::InvalidKey)
}

fn push_key<'args, DB>(builder: &mut QueryBuilder<'args, DB>, entry: &ModelEntry, key: &RowKey)
where
    DB: Database,
    i64: Encode<'args, DB> + Type<DB>,
    String: Encode<'args, DB> + Type<DB>,
{
    match key {
        RowKey::Id(id) => {
            let primary_key = entry.primary_key.as_deref().unwrap_or("id");
            builder.push(quoted(primary_key)).push(" = ").push_bind(*id);
        }
        RowKey::Composite(key) => {
            let mut predicate = builder.separated(" AND ");
            for (column, value) in key.iter() {
                predicate.push(quoted(column));
                predicate.push_unseparated(" = ");
                match value {
                    KeyValue::Int(value) => predicate.push_bind_unseparated(*value),
                    KeyValue::Text(value) => predicate.push_bind_unseparated(value.clone()),
                };
            }
        }
    }
}

pub(crate) fn reassign_row<'args, DB>(
    entry: &ModelEntry,
    column: &str,
    key: &RowKey,
    from: i64,
    to: i64,
) -> StoreResult<QueryBuilder<'args, DB>>
where
    DB: Database,
    DB::Arguments<'args>: Default,
    i64: Encode<'args, DB> + Type<DB>,
    String: Encode<'args, DB> + Type<DB>,
{
    check_column(entry, column)?;
    check_key(entry, key)?;
    let mut builder = QueryBuilder::new("UPDATE ");
    builder
        .push(quoted(&entry.table))
        .push(" SET ")
        .push(quoted(column))
        .push(" = ")
        .push_bind(to)
        .push(" WHERE ")
        .push(quoted(column))
        .push(" = ")
        .push_bind(from)
        .push(" AND ");
    push_key(&mut builder, entry, key);
    Ok(builder)
}

pub(crate) fn reassign_ids<'args, DB>(
    entry: &ModelEntry,
    column: &str,
    ids: &[i64],
    from: i64,
    to: i64,
) -> StoreResult<QueryBuilder<'args, DB>>
where
    DB: Database,
    DB::Arguments<'args>: Default,
    i64: Encode<'args, DB> + Type<DB>,
{
    check_column(entry, column)?;
    let Some(primary_key) = entry.primary_key.as_deref() else {
        return Err(StoreError::InvalidKey(format!(
            "{} has no primary key, rows cannot be updated by id",
            entry.model
        )));
    };
    if ids.is_empty() {
        return Err(StoreError::InvalidKey("no ids given".to_string()));
    }
    let mut builder = QueryBuilder::new("UPDATE ");
    builder
        .push(quoted(&entry.table))
        .push(" SET ")
        .push(quoted(column))
        .push(" = ")
        .push_bind(to)
        .push(" WHERE ")
        .push(quoted(column))
        .push(" = ")
        .push_bind(from)
        .push(" AND ")
        .push(quoted(primary_key))
        .push(" IN (");
    {
        let mut list = builder.separated(", ");
        for id in ids {
            list.push_bind(*id);
        }
    }
    builder.push(")");
    Ok(builder)
}

pub(crate) fn delete_row<'args, DB>(
    entry: &ModelEntry,
    column: &str,
    key: &RowKey,
    owner: i64,
) -> StoreResult<QueryBuilder<'args, DB>>
where
    DB: Database,
    DB::Arguments<'args>: Default,
    i64: Encode<'args, DB> + Type<DB>,
    String: Encode<'args, DB> + Type<DB>,
{
    check_column(entry, column)?;
    check_key(entry, key)?;
    let mut builder = QueryBuilder::new("DELETE FROM ");
    builder
        .push(quoted(&entry.table))
        .push(" WHERE ")
        .push(quoted(column))
        .push(" = ")
        .push_bind(owner)
        .push(" AND ");
    push_key(&mut builder, entry, key);
    Ok(builder)
}

/// Selects the key columns of rows whose `column` equals `owner`. The selected
/// columns are the primary key alone, or the composite key columns in order.
pub(crate) fn owned_row_keys<'args, DB>(
    entry: &ModelEntry,
    column: &str,
    owner: i64,
    limit: i64,
) -> StoreResult<QueryBuilder<'args, DB>>
where
    DB: Database,
    DB::Arguments<'args>: Default,
    i64: Encode<'args, DB> + Type<DB>,
{
    check_column(entry, column)?;
    let key_columns = key_columns(entry);
    if key_columns.is_empty() {
        return Err(StoreError::InvalidKey(format!(
            "{} has no key columns",
            entry.model
        )));
    }
    let ordering = key_columns
        .iter()
        .map(|name| quoted(name))
        .collect::<Vec<_>>()
        .join(", ");
    let mut builder = QueryBuilder::new("SELECT ");
    builder
        .push(&ordering)
        .push(" FROM ")
        .push(quoted(&entry.table))
        .push(" WHERE ")
        .push(quoted(column))
        .push(" = ")
        .push_bind(owner)
        .push(" ORDER BY ")
        .push(&ordering)
        .push(" LIMIT ")
        .push_bind(limit.max(1));
    Ok(builder)
}

/// Names of the columns `owned_row_keys` selects, in select order.
pub(crate) fn key_columns(entry: &ModelEntry) -> Vec<&str> {
    match entry.primary_key.as_deref() {
        Some(primary_key) => vec![primary_key],
        None => entry
            .composite_key_columns
            .iter()
            .map(String::as_str)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rehome_core::CompositeKey;

    fn merge_requests() -> ModelEntry {
        ModelEntry::new("MergeRequest", "merge_requests", &["author_id", "merge_user_id"])
    }

    fn issue_assignees() -> ModelEntry {
        ModelEntry::new("IssueAssignee", "issue_assignees", &["user_id"])
            .without_primary_key(&["issue_id", "user_id"])
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn reassign_row_is_conditional_on_current_owner() {
        let builder = reassign_row::<sqlx_postgres::Postgres>(
            &merge_requests(),
            "author_id",
            &RowKey::Id(7),
            100,
            200,
        )
        .expect("statement");
        assert_eq!(
            builder.sql(),
            r#"UPDATE "merge_requests" SET "author_id" = $1 WHERE "author_id" = $2 AND "id" = $3"#
        );
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn composite_keys_bind_every_column_in_name_order() {
        let key = CompositeKey::new().with("user_id", 100).with("issue_id", 3);
        let builder = delete_row::<sqlx_postgres::Postgres>(
            &issue_assignees(),
            "user_id",
            &RowKey::Composite(key),
            100,
        )
        .expect("statement");
        assert_eq!(
            builder.sql(),
            r#"DELETE FROM "issue_assignees" WHERE "user_id" = $1 AND "issue_id" = $2 AND "user_id" = $3"#
        );
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn owned_row_keys_selects_key_columns() {
        let builder =
            owned_row_keys::<sqlx_postgres::Postgres>(&issue_assignees(), "user_id", 100, 50)
                .expect("statement");
        assert_eq!(
            builder.sql(),
            r#"SELECT "issue_id", "user_id" FROM "issue_assignees" WHERE "user_id" = $1 ORDER BY "issue_id", "user_id" LIMIT $2"#
        );
        assert_eq!(key_columns(&issue_assignees()), vec!["issue_id", "user_id"]);
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn reassign_ids_lists_every_id() {
        let builder = reassign_ids::<sqlx_sqlite::Sqlite>(
            &merge_requests(),
            "merge_user_id",
            &[4, 5, 6],
            100,
            200,
        )
        .expect("statement");
        assert_eq!(
            builder.sql(),
            r#"UPDATE "merge_requests" SET "merge_user_id" = ? WHERE "merge_user_id" = ? AND "id" IN (?, ?, ?)"#
        );
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn reassign_ids_requires_primary_key_and_ids() {
        assert!(
            reassign_ids::<sqlx_sqlite::Sqlite>(&issue_assignees(), "user_id", &[1], 1, 2).is_err()
        );
        assert!(
            reassign_ids::<sqlx_sqlite::Sqlite>(&merge_requests(), "author_id", &[], 1, 2).is_err()
        );
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn numeric_key_rejected_without_primary_key() {
        let err = reassign_row::<sqlx_sqlite::Sqlite>(
            &issue_assignees(),
            "user_id",
            &RowKey::Id(1),
            1,
            2,
        )
        .err()
        .expect("no primary key");
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn composite_key_with_unknown_column_rejected() {
        let key = CompositeKey::new().with("issue_id; DROP TABLE users", 1);
        let err = delete_row::<sqlx_sqlite::Sqlite>(
            &issue_assignees(),
            "user_id",
            &RowKey::Composite(key),
            1,
        )
        .err()
        .expect("unknown column");
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn unregistered_column_rejected() {
        let err = reassign_row::<sqlx_sqlite::Sqlite>(
            &merge_requests(),
            "title",
            &RowKey::Id(1),
            1,
            2,
        )
        .err()
        .expect("unregistered column");
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
