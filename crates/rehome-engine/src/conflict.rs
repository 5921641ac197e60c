//! Uniqueness collisions turn into deletion of the placeholder-owned row.

use rehome_core::{ContributionStore, ModelEntry, RowKey, StoreResult, WriteOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowResult {
    Reassigned,
    /// The row is gone or no longer held by the placeholder.
    AlreadyConsumed,
    Destroyed,
}

/// Moves one row from `from` to `to`. On a unique index collision the row
/// still owned by `from` is deleted; the row already owned by `to` stays.
pub(crate) async fn reassign_or_destroy(
    store: &dyn ContributionStore,
    entry: &ModelEntry,
    column: &str,
    key: &RowKey,
    from: i64,
    to: i64,
    source_user_id: Option<i64>,
) -> StoreResult<RowResult> {
    match store.reassign_row(entry, column, key, from, to).await? {
        WriteOutcome::Applied(0) => Ok(RowResult::AlreadyConsumed),
        WriteOutcome::Applied(_) => Ok(RowResult::Reassigned),
        WriteOutcome::UniqueViolation => {
            destroy(store, entry, column, key, from, source_user_id).await
        }
    }
}

pub(crate) async fn destroy(
    store: &dyn ContributionStore,
    entry: &ModelEntry,
    column: &str,
    key: &RowKey,
    owner: i64,
    source_user_id: Option<i64>,
) -> StoreResult<RowResult> {
    tracing::warn!(
        event = "contribution_destroyed",
        source_user_id,
        model = %entry.model,
        column,
        key = %key,
        "Destroying contribution due to uniqueness constraint"
    );
    let deleted = store.delete_row(entry, column, key, owner).await?;
    Ok(if deleted > 0 {
        RowResult::Destroyed
    } else {
        RowResult::AlreadyConsumed
    })
}
