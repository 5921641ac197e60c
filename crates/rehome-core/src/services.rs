use async_trait::async_trait;

use crate::models::{
    ExistingMembership, MembershipTarget, NewMember, PlaceholderMembership, PlaceholderReference,
    RowKey, SourceUser, UserSummary,
};
use crate::registry::ModelEntry;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx_core::Error),
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("{0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a write that may collide with a unique index. Collisions are a
/// value so callers branch on them instead of matching error variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied(u64),
    UniqueViolation,
}

impl WriteOutcome {
    #[must_use]
    pub const fn rows_affected(&self) -> u64 {
        match self {
            Self::Applied(rows) => *rows,
            Self::UniqueViolation => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthSignal {
    Healthy,
    Unhealthy(String),
}

impl HealthSignal {
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

#[async_trait]
pub trait SourceUserStore: Send + Sync {
    async fn find_source_user(&self, id: i64) -> StoreResult<Option<SourceUser>>;
    /// Moves an in-progress source user to completed. Returns false when the
    /// row was not in progress.
    async fn complete_reassignment(&self, id: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait PlaceholderReferenceStore: Send + Sync {
    /// References of one source user with `id > after_id`, ordered by id.
    async fn list_for_source_user(
        &self,
        source_user_id: i64,
        after_id: i64,
        limit: i64,
    ) -> StoreResult<Vec<PlaceholderReference>>;
    async fn delete_reference(&self, id: i64) -> StoreResult<u64>;
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn list_placeholder_memberships(
        &self,
        source_user_id: i64,
        after_id: i64,
        limit: i64,
    ) -> StoreResult<Vec<PlaceholderMembership>>;
    /// Namespace ids from the target (or the project's namespace) up to its root.
    /// Empty when the target no longer exists.
    async fn target_ancestry(&self, target: MembershipTarget) -> StoreResult<Vec<i64>>;
    /// Memberships of the user on the target itself or on any ancestor namespace.
    async fn existing_memberships(
        &self,
        user_id: i64,
        target: MembershipTarget,
    ) -> StoreResult<Vec<ExistingMembership>>;
    async fn create_member(&self, member: &NewMember) -> StoreResult<WriteOutcome>;
    async fn delete_placeholder_membership(&self, id: i64) -> StoreResult<u64>;
}

/// Registry-driven access to domain tables.
#[async_trait]
pub trait ContributionStore: Send + Sync {
    /// Sets `column` from `from` to `to` on the keyed row, only while the row
    /// still holds `from`.
    async fn reassign_row(
        &self,
        entry: &ModelEntry,
        column: &str,
        key: &RowKey,
        from: i64,
        to: i64,
    ) -> StoreResult<WriteOutcome>;
    /// Bulk form of `reassign_row` for tables with a primary key.
    async fn reassign_ids(
        &self,
        entry: &ModelEntry,
        column: &str,
        ids: &[i64],
        from: i64,
        to: i64,
    ) -> StoreResult<WriteOutcome>;
    /// Deletes the keyed row only while `column` still equals `owner`.
    async fn delete_row(
        &self,
        entry: &ModelEntry,
        column: &str,
        key: &RowKey,
        owner: i64,
    ) -> StoreResult<u64>;
    async fn owned_row_keys(
        &self,
        entry: &ModelEntry,
        column: &str,
        owner: i64,
        limit: i64,
    ) -> StoreResult<Vec<RowKey>>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: i64) -> StoreResult<Option<UserSummary>>;
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> StoreResult<HealthSignal>;
    async fn table_unavailable(&self, table: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait IndexCatalog: Send + Sync {
    /// Columns that lead at least one index on the table.
    async fn leading_index_columns(&self, table: &str) -> StoreResult<Vec<String>>;
}

/// The collaborators an engine reads and writes through.
#[derive(Clone, Copy)]
pub struct Stores<'a> {
    pub source_users: &'a dyn SourceUserStore,
    pub references: &'a dyn PlaceholderReferenceStore,
    pub memberships: &'a dyn MembershipStore,
    pub contributions: &'a dyn ContributionStore,
    pub users: &'a dyn UserDirectory,
}
