macro_rules! query {
    ($sql:expr $(, $arg:expr)* $(,)?) => {{
        #[allow(unused_mut)]
        let mut q = sqlx_core::query::query::<sqlx_postgres::Postgres>($sql);
        $(q = q.bind($arg);)*
        q
    }};
}

macro_rules! query_as {
    ($ty:ty, $sql:expr $(, $arg:expr)* $(,)?) => {{
        #[allow(unused_mut)]
        let mut q = sqlx_core::query_as::query_as::<sqlx_postgres::Postgres, $ty>($sql);
        $(q = q.bind($arg);)*
        q
    }};
}

pub(crate) mod prelude {
    pub(crate) use crate::PgPool;
    pub(crate) use async_trait::async_trait;
    pub(crate) use chrono::Utc;
    pub(crate) use rehome_core::{
        ExistingMembership, MembershipTarget, NewMember, NewPlaceholderMembership,
        NewPlaceholderReference, NewSourceUser, PlaceholderMembership, PlaceholderReference,
        SourceUser, SourceUserStatus, StoreResult, UserSummary, WriteOutcome,
    };
    pub(crate) use sqlx_core::row::Row;
    pub(crate) use tracing::{instrument, Span};
}

mod catalog;
mod contributions;
mod health;
mod memberships;
mod references;
mod source_users;
mod users;

pub use catalog::PgIndexCatalog;
pub use contributions::ContributionRepo;
pub use health::PgHealthProbe;
pub use memberships::MembershipRepo;
pub use references::PlaceholderReferenceRepo;
pub use source_users::SourceUserRepo;
pub use users::UserRepo;

use rehome_core::Stores;

/// Every Postgres-backed store over one pool.
pub struct PgRepos<'a> {
    pub source_users: SourceUserRepo<'a>,
    pub references: PlaceholderReferenceRepo<'a>,
    pub memberships: MembershipRepo<'a>,
    pub contributions: ContributionRepo<'a>,
    pub users: UserRepo<'a>,
}

impl<'a> PgRepos<'a> {
    pub fn new(pool: &'a prelude::PgPool) -> Self {
        Self {
            source_users: SourceUserRepo::new(pool),
            references: PlaceholderReferenceRepo::new(pool),
            memberships: MembershipRepo::new(pool),
            contributions: ContributionRepo::new(pool),
            users: UserRepo::new(pool),
        }
    }

    pub fn stores(&self) -> Stores<'_> {
        Stores {
            source_users: &self.source_users,
            references: &self.references,
            memberships: &self.memberships,
            contributions: &self.contributions,
            users: &self.users,
        }
    }
}
