macro_rules! query {
    ($sql:expr $(, $arg:expr)* $(,)?) => {{
        #[allow(unused_mut)]
        let mut q = sqlx_core::query::query::<sqlx_sqlite::Sqlite>($sql);
        $(q = q.bind($arg);)*
        q
    }};
}

macro_rules! query_as {
    ($ty:ty, $sql:expr $(, $arg:expr)* $(,)?) => {{
        #[allow(unused_mut)]
        let mut q = sqlx_core::query_as::query_as::<sqlx_sqlite::Sqlite, $ty>($sql);
        $(q = q.bind($arg);)*
        q
    }};
}

mod catalog;
mod contribution_repo;
mod health;
mod membership_repo;
mod reference_repo;
mod source_user_repo;
mod user_repo;

pub use catalog::LocalIndexCatalog;
pub use contribution_repo::LocalContributionRepo;
pub use health::LocalHealthProbe;
pub use membership_repo::LocalMembershipRepo;
pub use reference_repo::LocalPlaceholderReferenceRepo;
pub use source_user_repo::LocalSourceUserRepo;
pub use user_repo::LocalUserRepo;

use rehome_core::Stores;

use crate::SqlitePool;

/// Every SQLite-backed store over one pool.
pub struct LocalRepos<'a> {
    pub source_users: LocalSourceUserRepo<'a>,
    pub references: LocalPlaceholderReferenceRepo<'a>,
    pub memberships: LocalMembershipRepo<'a>,
    pub contributions: LocalContributionRepo<'a>,
    pub users: LocalUserRepo<'a>,
}

impl<'a> LocalRepos<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self {
            source_users: LocalSourceUserRepo::new(pool),
            references: LocalPlaceholderReferenceRepo::new(pool),
            memberships: LocalMembershipRepo::new(pool),
            contributions: LocalContributionRepo::new(pool),
            users: LocalUserRepo::new(pool),
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
